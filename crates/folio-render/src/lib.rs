//! Rendering core for the folio publishing engine.
//!
//! Resolves a logical template key plus a JSON data payload into a finished
//! response body, and offers registered listeners a chance to answer with an
//! alternate representation first.
//!
//! # Modules
//!
//! - [`template`]: Template engines, the compiled-template cache and its hot-reload watcher
//! - [`render`]: Layout decoration, code-block highlighting and escape repair
//! - [`negotiation`]: Ordered content-negotiation listeners keyed on the `Accept` header
//! - [`error`]: Error types shared by the modules above

pub mod error;
pub mod negotiation;
pub mod render;
pub mod template;

pub use error::{RenderError, TemplateError};
pub use negotiation::NegotiationBus;
pub use render::{ContentKind, RenderContext, RenderEngine, RenderedPage};
pub use template::{
    EngineSet, TemplateCache, TemplateEngine, TemplateEntry, TemplateWatcher, TeraEngine,
    WarmupReport,
};
