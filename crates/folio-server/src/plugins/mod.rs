//! Extension discovery and registry.
//!
//! Extensions are directories under the extensions root containing an
//! `extension.toml` manifest. The directory name selects a compiled-in factory
//! from the [`ExtensionCatalog`]; the factory returns the extension's handlers,
//! which are mounted under the manifest's path.

mod catalog;
mod discovery;
mod manifest;
mod registry;

pub use catalog::{
    ExtensionCatalog, ExtensionContext, ExtensionError, ExtensionFactory, ExtensionServices,
    ExtensionUnit,
};
pub use discovery::{discover_extension_dirs, Candidate};
pub use manifest::{normalize_mount_path, ExtensionManifest, ManifestError, MANIFEST_FILENAME};
pub use registry::{ExtensionDescriptor, LoadFailure, PluginRegistry};
