//! Per-request state threaded through every pipeline stage.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, Method, Uri};
use bytes::Bytes;
use folio_render::RenderContext;

use crate::error::PipelineError;

/// A buffered request plus what the stages have decided so far.
///
/// `path` starts as the request path and is rewritten to the mount-relative
/// path while an extension stack runs.
#[derive(Debug)]
pub struct Exchange {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    path: String,
    render: Option<RenderContext>,
}

impl Exchange {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let path = uri.path().to_string();
        Self {
            method,
            uri,
            headers,
            body,
            path,
            render: None,
        }
    }

    /// Buffer the body of an incoming request, up to `limit` bytes.
    pub async fn from_request(request: Request, limit: usize) -> Result<Self, PipelineError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| PipelineError::Body(e.to_string()))?;
        Ok(Self::new(parts.method, parts.uri, parts.headers, body))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Path as seen by the current stage.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of the request as received.
    pub fn original_path(&self) -> &str {
        self.uri.path()
    }

    /// Requested representation, the raw `Accept` header.
    pub fn accept(&self) -> Option<&str> {
        self.headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a query string parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// First value of an `application/x-www-form-urlencoded` body field.
    pub fn form_param(&self, name: &str) -> Option<String> {
        let is_form = self
            .header(header::CONTENT_TYPE)
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if !is_form {
            return None;
        }
        url::form_urlencoded::parse(&self.body)
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn render_context(&self) -> Option<&RenderContext> {
        self.render.as_ref()
    }

    /// Ask for default rendering. A later call replaces an earlier context.
    pub fn set_render(&mut self, ctx: RenderContext) {
        self.render = Some(ctx);
    }

    pub fn take_render(&mut self) -> Option<RenderContext> {
        self.render.take()
    }

    /// Swap in a mount-relative path, returning the previous one.
    pub(crate) fn replace_path(&mut self, path: String) -> String {
        std::mem::replace(&mut self.path, path)
    }

    /// A body-less copy of the request addressed to the current path, for
    /// services such as the static file server.
    pub(crate) fn to_request(&self) -> Request {
        let mut target = self.path.clone();
        if let Some(query) = self.uri.query() {
            target.push('?');
            target.push_str(query);
        }
        let uri = target.parse::<Uri>().unwrap_or_else(|_| self.uri.clone());

        let mut request = Request::new(Body::empty());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = uri;
        *request.headers_mut() = self.headers.clone();
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn exchange(method: Method, uri: &str, headers: HeaderMap, body: &str) -> Exchange {
        Exchange::new(
            method,
            uri.parse().unwrap(),
            headers,
            Bytes::from(body.to_string()),
        )
    }

    #[test]
    fn test_query_param_decoding() {
        let ex = exchange(Method::GET, "/search/?q=hello+world&x=1", HeaderMap::new(), "");
        assert_eq!(ex.query_param("q").as_deref(), Some("hello world"));
        assert_eq!(ex.query_param("missing"), None);
        assert_eq!(ex.path(), "/search/");
    }

    #[test]
    fn test_form_param_requires_form_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let ex = exchange(Method::POST, "/search/", headers, "q=rust%20lang");
        assert_eq!(ex.form_param("q").as_deref(), Some("rust lang"));

        let ex = exchange(Method::POST, "/search/", HeaderMap::new(), "q=rust");
        assert_eq!(ex.form_param("q"), None);
    }

    #[test]
    fn test_path_replacement_and_rebuilt_request() {
        let mut ex = exchange(Method::GET, "/admin/css/site.css?v=2", HeaderMap::new(), "");
        let previous = ex.replace_path("/css/site.css".to_string());
        assert_eq!(previous, "/admin/css/site.css");
        assert_eq!(ex.original_path(), "/admin/css/site.css");

        let request = ex.to_request();
        assert_eq!(request.uri().path(), "/css/site.css");
        assert_eq!(request.uri().query(), Some("v=2"));
    }

    #[test]
    fn test_render_context_replaced() {
        let mut ex = exchange(Method::GET, "/", HeaderMap::new(), "");
        ex.set_render(RenderContext::new("index.html", json!({})));
        ex.set_render(RenderContext::new("admin.html", json!({})).bypass_layout());
        let ctx = ex.take_render().unwrap();
        assert_eq!(ctx.template, "admin.html");
        assert!(ex.render_context().is_none());
    }
}
