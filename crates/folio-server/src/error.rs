//! Pipeline and startup error types.

use folio_render::{RenderError, TemplateError};

use crate::config::ConfigError;
use crate::content::ContentError;

/// Errors raised while a request moves through the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("invalid route pattern '{pattern}': {source}")]
    Route {
        pattern: String,
        source: regex::Error,
    },

    #[error("handler failed: {0}")]
    Handler(String),
}

impl PipelineError {
    /// Errors that should end in the 404 page rather than the error page: missing
    /// content, and request paths the content store refuses to resolve.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Content(ContentError::NotFound { .. } | ContentError::InvalidPath(_))
        )
    }
}

/// Errors that prevent the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("template setup failed: {0}")]
    Templates(#[from] TemplateError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
