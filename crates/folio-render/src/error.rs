//! Error types for template compilation and page rendering.

use std::path::PathBuf;

/// Errors raised while loading, compiling or invoking a single template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no template engine claims {path}")]
    UnsupportedSource { path: PathBuf },
    #[error("unknown template engine '{0}'")]
    UnknownEngine(String),
    #[error("failed to compile '{key}': {source}")]
    Compile { key: String, source: tera::Error },
    #[error("render error for '{key}': {source}")]
    Render { key: String, source: tera::Error },
}

/// Errors raised by [`crate::RenderEngine`].
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template missing: {key}")]
    TemplateMissing { key: String },
    #[error(transparent)]
    Template(#[from] TemplateError),
}
