use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Method, StatusCode};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use super::exchange::Exchange;
use super::handler::{Flow, Handler};
use crate::error::PipelineError;

/// Serves files below `root` for `GET`/`HEAD` requests; calls through when
/// nothing matches.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    max_age: Duration,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            root: root.into(),
            max_age,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Handler for StaticFiles {
    async fn handle(&self, exchange: &mut Exchange) -> Result<Flow, PipelineError> {
        if !matches!(*exchange.method(), Method::GET | Method::HEAD) || !self.root.is_dir() {
            return Ok(Flow::Next);
        }

        let service = ServeDir::new(&self.root).append_index_html_on_directories(false);
        let response = match service.oneshot(exchange.to_request()).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED {
            return Ok(Flow::Next);
        }

        let mut response = response.map(Body::new);
        if status.is_success() {
            let value = format!("public, max-age={}", self.max_age.as_secs());
            if let Ok(value) = HeaderValue::from_str(&value) {
                response.headers_mut().insert(header::CACHE_CONTROL, value);
            }
        }
        tracing::debug!(path = %exchange.path(), root = ?self.root, %status, "Served static file");
        Ok(Flow::Respond(response))
    }
}
