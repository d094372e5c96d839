//! Final stages: the 404 page and the error page.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use folio_render::{ContentKind, RenderEngine, RenderedPage};
use serde_json::{json, Value};

use crate::error::PipelineError;

pub const NOT_FOUND_KEY: &str = "tmpl.page.404.html";
const NOT_FOUND_MESSAGE: &str = "404 :(";

/// `pages/404.html` decorated with the layout, status 404. Falls back to plain
/// text when the templates cannot render.
pub async fn not_found(renderer: &RenderEngine, site: Value) -> Response {
    let data = json!({ "error": NOT_FOUND_MESSAGE, "config": site });
    match renderer.render_markup(NOT_FOUND_KEY, &data, false).await {
        Ok(markup) => RenderedPage::new(markup, ContentKind::Html)
            .with_status(StatusCode::NOT_FOUND)
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot render 404 page, sending plain text");
            let mut response = (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE).into_response();
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            response
        }
    }
}

/// Status 500. The error text is included only when `show_details` is set.
pub fn error_page(error: &PipelineError, show_details: bool) -> Response {
    tracing::error!(error = %error, "Request failed");
    let body = if show_details {
        format!(
            "<h1>Internal Server Error</h1>\n<pre>{}</pre>",
            escape_html(&error.to_string())
        )
    } else {
        "<h1>Internal Server Error</h1>".to_string()
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Html(body)).into_response()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_render::TemplateCache;
    use std::sync::Arc;

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_uses_page_template_in_layout() {
        let cache = Arc::new(TemplateCache::default());
        cache
            .compile_str("tmpl.layout.html", "<main>{{ content | safe }}</main>")
            .unwrap();
        cache
            .compile_str(NOT_FOUND_KEY, "<p>{{ error }} on {{ config.title }}</p>")
            .unwrap();
        let renderer = RenderEngine::new(cache);

        let response = not_found(&renderer, json!({"title": "Site"})).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await, "<main><p>404 :( on Site</p></main>");
    }

    #[tokio::test]
    async fn test_not_found_without_templates() {
        let renderer = RenderEngine::new(Arc::new(TemplateCache::default()));
        let response = not_found(&renderer, json!({})).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await, "404 :(");
    }

    #[tokio::test]
    async fn test_error_page_details() {
        let error = PipelineError::Handler("<boom>".to_string());

        let response = error_page(&error, false);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body_of(response).await.contains("boom"));

        let body = body_of(error_page(&error, true)).await;
        assert!(body.contains("&lt;boom&gt;"));
    }
}
