//! Ordered, anchored regex routes mapping a method and path to a route id.

use axum::http::Method;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::error::PipelineError;

#[derive(Debug, Clone)]
struct Route<R> {
    method: Method,
    pattern: Regex,
    id: R,
}

/// A matched route and its percent-decoded capture groups (`None` for groups that
/// did not take part).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<R> {
    pub id: R,
    pub params: Vec<Option<String>>,
}

impl<R> RouteMatch<R> {
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).and_then(|p| p.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable<R> {
    routes: Vec<Route<R>>,
}

impl<R> Default for RouteTable<R> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<R: Copy> RouteTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. `pattern` is anchored at both ends.
    pub fn route(mut self, method: Method, pattern: &str, id: R) -> Result<Self, PipelineError> {
        let anchored = format!("^(?:{pattern})$");
        let pattern = Regex::new(&anchored).map_err(|e| PipelineError::Route {
            pattern: pattern.to_string(),
            source: e,
        })?;
        self.routes.push(Route {
            method,
            pattern,
            id,
        });
        Ok(self)
    }

    pub fn get(self, pattern: &str, id: R) -> Result<Self, PipelineError> {
        self.route(Method::GET, pattern, id)
    }

    pub fn post(self, pattern: &str, id: R) -> Result<Self, PipelineError> {
        self.route(Method::POST, pattern, id)
    }

    /// First route, in registration order, matching `method` and `path`.
    /// `HEAD` requests match `GET` routes.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch<R>> {
        let wanted = if *method == Method::HEAD {
            Method::GET
        } else {
            method.clone()
        };
        self.routes
            .iter()
            .filter(|r| r.method == wanted)
            .find_map(|r| {
                let caps = r.pattern.captures(path)?;
                let params = caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| decode_param(m.as_str())))
                    .collect();
                Some(RouteMatch { id: r.id, params })
            })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn decode_param(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
