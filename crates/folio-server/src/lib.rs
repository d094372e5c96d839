//! # folio server
//!
//! Request pipeline of the folio publishing engine. Each request walks, in order:
//!
//! 1. the core route table (index, category, tag, article, revision, search,
//!    archives, feed), whose controllers ask the content store for data and set a
//!    [`folio_render::RenderContext`];
//! 2. every mounted extension stack whose mount path matches, in registration order;
//! 3. content negotiation, then the render engine, when a render context was set;
//! 4. the theme's static files;
//! 5. the 404 page, or the error page when any stage failed.
//!
//! Everything a request needs hangs off one [`AppContext`], built once at startup.

pub mod config;
pub mod content;
pub mod context;
pub mod controllers;
pub mod error;
pub mod extensions;
pub mod logging;
pub mod pipeline;
pub mod plugins;

pub use config::Settings;
pub use context::AppContext;
pub use error::{BootstrapError, PipelineError};
pub use pipeline::router;
