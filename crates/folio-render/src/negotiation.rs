//! Content negotiation listeners.
//!
//! Fired once per request right before default rendering. Listeners are evaluated in
//! registration order against the client's requested representation (the `Accept`
//! header); the first whose predicate matches answers the request and default
//! rendering is skipped.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

/// Representation assumed when the client sends no `Accept` header.
pub const DEFAULT_REPRESENTATION: &str = "text/html";

type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;
type Responder = Arc<dyn Fn(&Value) -> Response + Send + Sync>;

#[derive(Clone)]
struct Listener {
    label: String,
    predicate: Predicate,
    responder: Responder,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Ordered `(predicate, handler)` pairs. Registration happens while extensions load;
/// there is no removal.
#[derive(Debug, Default)]
pub struct NegotiationBus {
    listeners: RwLock<Vec<Listener>>,
}

impl NegotiationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `responder` for requests whose representation contains `token`.
    pub fn on<F>(&self, token: impl Into<String>, responder: F)
    where
        F: Fn(&Value) -> Response + Send + Sync + 'static,
    {
        let token = token.into();
        let needle = token.clone();
        self.on_match(token, move |accept| accept.contains(needle.as_str()), responder);
    }

    /// Register `responder` behind an arbitrary predicate over the representation string.
    pub fn on_match<P, F>(&self, label: impl Into<String>, predicate: P, responder: F)
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
        F: Fn(&Value) -> Response + Send + Sync + 'static,
    {
        let label = label.into();
        tracing::debug!(%label, "Registered negotiation listener");
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Listener {
                label,
                predicate: Arc::new(predicate),
                responder: Arc::new(responder),
            });
    }

    /// Offer the request to each listener in registration order. Returns the
    /// response of the first one that claims it.
    pub fn emit(&self, accept: Option<&str>, data: &Value) -> Option<Response> {
        let accept = accept.unwrap_or(DEFAULT_REPRESENTATION);
        let claimed = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|l| (l.predicate)(accept))
            .cloned()?;

        tracing::debug!(label = %claimed.label, accept, "Negotiation listener claimed request");
        Some((claimed.responder)(data))
    }

    /// Labels of registered listeners, in evaluation order.
    pub fn labels(&self) -> Vec<String> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|l| l.label.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serialize `data` as `application/json` with an exact byte-length header.
pub fn json_response(data: &Value) -> Response {
    match serde_json::to_vec(data) {
        Ok(body) => sized_response("application/json", body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize negotiation payload");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Pretty-printed `text/plain` dump of `data`, for debugging.
pub fn plain_response(data: &Value) -> Response {
    match serde_json::to_string_pretty(data) {
        Ok(body) => sized_response("text/plain; charset=utf-8", body.into_bytes()),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize negotiation payload");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn sized_response(content_type: &'static str, body: Vec<u8>) -> Response {
    let length = HeaderValue::from(body.len());
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, length);
    response
}
