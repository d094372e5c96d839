//! Compiled-template cache with multi-engine fallback and hot reload.
//!
//! Theme templates live under `<theme>/templates/**`. Each file is compiled by the
//! first engine (in precedence order) that claims its extension and cached under a
//! logical key: `tmpl.<file name>`, or `tmpl.page.<file name>` for files inside a
//! `pages/` directory. Lookups walk the engine precedence list, so a theme can
//! override `index.html` by shipping an `index.tera`.

mod cache;
mod engine;
mod watcher;

pub use cache::{template_key, TemplateCache, TemplateEntry, WarmupReport, KEY_NAMESPACE};
pub use engine::{CompiledTemplate, EngineSet, TemplateEngine, TeraEngine};
pub use watcher::TemplateWatcher;
