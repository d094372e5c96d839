//! Extension registry: discovers, loads, and builds the handler stack of each
//! extension found under the extensions root.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::catalog::{
    ExtensionCatalog, ExtensionContext, ExtensionError, ExtensionServices, ExtensionUnit,
};
use super::discovery::{discover_extension_dirs, Candidate};
use super::manifest::ExtensionManifest;
use crate::pipeline::{SharedHandler, StaticFiles};

const PUBLIC_DIR: &str = "public";

/// A loaded extension ready to mount.
#[derive(Debug, Clone)]
pub struct ExtensionDescriptor {
    pub name: String,
    pub description: String,
    /// Normalised mount path, e.g. `/admin` or `/`.
    pub mount_path: String,
    pub dir: PathBuf,
    /// Template files the extension registered.
    pub templates: Vec<PathBuf>,
    unit: ExtensionUnit,
    public: SharedHandler,
}

impl ExtensionDescriptor {
    /// `before` hooks, `main` handlers, `after` hooks, then the extension's
    /// `public/` directory.
    pub fn build_stack(&self) -> Vec<SharedHandler> {
        self.unit
            .before
            .iter()
            .chain(&self.unit.main)
            .chain(&self.unit.after)
            .cloned()
            .chain(std::iter::once(Arc::clone(&self.public)))
            .collect()
    }

    pub fn unit(&self) -> &ExtensionUnit {
        &self.unit
    }
}

/// An extension that was found but not loaded.
#[derive(Debug)]
pub struct LoadFailure {
    pub name: String,
    pub dir: PathBuf,
    pub error: ExtensionError,
}

/// Registry of loaded extensions, in discovery order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    extensions: Vec<ExtensionDescriptor>,
    failures: Vec<LoadFailure>,
    skipped: Vec<String>,
}

impl PluginRegistry {
    /// Scan `root`, keep the candidates allowed by `enabled` (all when `None`), and
    /// load each one. A failing extension is logged and left out; the others load.
    pub fn discover(
        root: &Path,
        enabled: Option<&[String]>,
        catalog: &ExtensionCatalog,
        services: ExtensionServices<'_>,
    ) -> Self {
        let mut registry = Self::default();

        for candidate in discover_extension_dirs(root) {
            let allowed = enabled.is_none_or(|names| names.iter().any(|n| *n == candidate.name));
            if !allowed {
                tracing::debug!(name = %candidate.name, "Extension not enabled, skipping");
                registry.skipped.push(candidate.name);
                continue;
            }

            match load_extension(&candidate, catalog, services) {
                Ok(descriptor) => {
                    tracing::info!(
                        name = %descriptor.name,
                        mount = %descriptor.mount_path,
                        "Loaded extension"
                    );
                    registry.extensions.push(descriptor);
                }
                Err(error) => {
                    tracing::error!(name = %candidate.name, dir = ?candidate.dir, error = %error, "Skipping extension");
                    registry.failures.push(LoadFailure {
                        name: candidate.name,
                        dir: candidate.dir,
                        error,
                    });
                }
            }
        }

        registry
    }

    pub fn extensions(&self) -> &[ExtensionDescriptor] {
        &self.extensions
    }

    pub fn into_extensions(self) -> Vec<ExtensionDescriptor> {
        self.extensions
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    /// Names left out by the allow-list.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn find(&self, name: &str) -> Option<&ExtensionDescriptor> {
        self.extensions.iter().find(|e| e.name == name)
    }
}

fn load_extension(
    candidate: &Candidate,
    catalog: &ExtensionCatalog,
    services: ExtensionServices<'_>,
) -> Result<ExtensionDescriptor, ExtensionError> {
    let manifest = ExtensionManifest::load(&candidate.dir)?;
    let problems = manifest.validate();
    if !problems.is_empty() {
        return Err(ExtensionError::InvalidManifest(problems));
    }

    let factory = catalog
        .get(&candidate.name)
        .ok_or(ExtensionError::UnknownExtension)?;

    let mut config = manifest.config.clone();
    if let Some(overrides) = services.settings.extensions.config.get(&candidate.name) {
        for (key, value) in overrides {
            config.insert(key.clone(), value.clone());
        }
    }

    let ctx = ExtensionContext::new(
        &candidate.name,
        &candidate.dir,
        &manifest.extension.description,
        config,
        services,
    );
    let unit = catch_unwind(AssertUnwindSafe(|| factory(&ctx)))
        .map_err(|payload| ExtensionError::Panicked(panic_message(payload.as_ref())))??;
    if unit.main.is_empty() {
        return Err(ExtensionError::EmptyStack);
    }
    ctx.commit_listeners();

    let public = StaticFiles::new(
        candidate.dir.join(PUBLIC_DIR),
        services.settings.server.static_max_age(),
    );
    Ok(ExtensionDescriptor {
        name: candidate.name.clone(),
        description: manifest.extension.description.clone(),
        mount_path: manifest.mount_path(&candidate.name),
        dir: candidate.dir.clone(),
        templates: ctx.into_templates(),
        unit,
        public: Arc::new(public),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
