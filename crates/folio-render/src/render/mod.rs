//! Turns a [`RenderContext`] into a finished response body.
//!
//! Rendering runs in a fixed order: resolve the template (with engine fallback),
//! render the partial, wrap it in `layout.html` unless bypassed, highlight code
//! blocks, then repair escaped apostrophes.

mod highlight;

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::{json, Map, Value};

use crate::error::RenderError;
use crate::template::{TemplateCache, TemplateEntry, KEY_NAMESPACE};

pub use highlight::{highlight, highlight_code_blocks, repair_apostrophes};

/// Logical key of the layout that decorates every non-bypassed page.
pub const LAYOUT_KEY: &str = "tmpl.layout.html";

/// Response flavour derived from the template name's suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Feed,
}

impl ContentKind {
    pub fn from_template(name: &str) -> Self {
        let is_xml = name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("xml"));
        if is_xml {
            Self::Feed
        } else {
            Self::Html
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Feed => "application/rss+xml; charset=utf-8",
        }
    }
}

/// What a route or extension asks the renderer to produce for this request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    /// Template file name as seen by routes, e.g. `index.html` or `page.404.html`.
    pub template: String,
    /// JSON object handed to the template.
    pub data: Value,
    /// Skip layout decoration (feeds, admin screens).
    pub layout_bypass: bool,
}

impl RenderContext {
    pub fn new(template: impl Into<String>, data: Value) -> Self {
        Self {
            template: template.into(),
            data,
            layout_bypass: false,
        }
    }

    pub fn bypass_layout(mut self) -> Self {
        self.layout_bypass = true;
        self
    }

    /// Logical cache key for the template.
    pub fn key(&self) -> String {
        format!("{KEY_NAMESPACE}{}", self.template)
    }

    pub fn content_kind(&self) -> ContentKind {
        ContentKind::from_template(&self.template)
    }

    /// Insert a top-level value into the data object, turning non-object data
    /// into an object first.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        if !self.data.is_object() {
            self.data = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.data {
            map.insert(key.into(), value);
        }
    }
}

/// Encoded page body plus the headers it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub status: StatusCode,
    pub kind: ContentKind,
    pub body: Bytes,
}

impl RenderedPage {
    pub fn new(markup: String, kind: ContentKind) -> Self {
        Self {
            status: StatusCode::OK,
            kind,
            body: Bytes::from(markup),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn content_type(&self) -> &'static str {
        self.kind.mime()
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

impl IntoResponse for RenderedPage {
    fn into_response(self) -> Response {
        let length = HeaderValue::from(self.body.len());
        let mut response = (self.status, self.body).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.kind.mime()),
        );
        headers.insert(header::CONTENT_LENGTH, length);
        response
    }
}

/// Renders templates held in a shared [`TemplateCache`].
#[derive(Debug, Clone)]
pub struct RenderEngine {
    cache: Arc<TemplateCache>,
}

impl RenderEngine {
    pub fn new(cache: Arc<TemplateCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    /// Render a request's context into a page.
    pub async fn render(&self, ctx: &RenderContext) -> Result<RenderedPage, RenderError> {
        let markup = self
            .render_markup(&ctx.key(), &ctx.data, ctx.layout_bypass)
            .await?;
        Ok(RenderedPage::new(markup, ctx.content_kind()))
    }

    /// Render `key` with `data`, decorate with the layout unless `layout_bypass`,
    /// then apply the post-processing passes.
    pub async fn render_markup(
        &self,
        key: &str,
        data: &Value,
        layout_bypass: bool,
    ) -> Result<String, RenderError> {
        let entry = self.entry(key).await?;
        let partial = entry.render(data)?;

        let output = if layout_bypass {
            partial
        } else {
            self.decorate(data, partial).await?
        };

        let output = highlight_code_blocks(&output);
        Ok(repair_apostrophes(&output))
    }

    /// Wrap already rendered content in the layout. The layout sees the page data
    /// as `context` and the partial as `content`.
    pub async fn decorate(&self, data: &Value, content: String) -> Result<String, RenderError> {
        let layout = self.entry(LAYOUT_KEY).await?;
        let wrapped = layout.render(&json!({ "context": data, "content": content }))?;
        Ok(wrapped)
    }

    async fn entry(&self, key: &str) -> Result<Arc<TemplateEntry>, RenderError> {
        self.cache
            .resolve_or_compile(key)
            .await
            .ok_or_else(|| RenderError::TemplateMissing {
                key: key.to_string(),
            })
    }
}
