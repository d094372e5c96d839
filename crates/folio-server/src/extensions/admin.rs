//! Password-protected article listing and editor screens.

use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use base64::Engine;
use chrono::Utc;
use folio_render::RenderContext;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::controllers::Controllers;
use crate::error::PipelineError;
use crate::pipeline::{Exchange, Flow, Handler, RouteTable};
use crate::plugins::{ExtensionContext, ExtensionError, ExtensionUnit};

pub const NAME: &str = "admin";

const EDITOR_TEMPLATE: &str = "admin.html";
const LISTING_TEMPLATE: &str = "admin.index.html";
const DEFAULT_REALM: &str = "folio admin";

pub fn factory(ctx: &ExtensionContext<'_>) -> Result<ExtensionUnit, ExtensionError> {
    tracing::info!(description = %ctx.description(), "Initialising admin");

    let auth = BasicAuth::new(
        ctx.require_str("user")?,
        ctx.require_str("pass")?,
        ctx.config_str("realm").unwrap_or(DEFAULT_REALM),
    );
    ctx.add_template(EDITOR_TEMPLATE);
    ctx.add_template(LISTING_TEMPLATE);

    Ok(ExtensionUnit::new(AdminRouter::new(ctx.controllers().clone())?)
        .with_before(auth)
        .with_after(RequestTrace))
}

/// HTTP Basic credential check against the configured user and password.
pub struct BasicAuth {
    user: String,
    pass: String,
    challenge: HeaderValue,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl BasicAuth {
    pub fn new(user: &str, pass: &str, realm: &str) -> Self {
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
        Self {
            user: user.to_string(),
            pass: pass.to_string(),
            challenge,
        }
    }

    fn accepts(&self, authorization: Option<&str>) -> bool {
        let Some(encoded) = authorization.and_then(|v| v.strip_prefix("Basic ")) else {
            return false;
        };
        let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(credentials) = String::from_utf8(decoded) else {
            return false;
        };
        let Some((user, pass)) = credentials.split_once(':') else {
            return false;
        };
        // Both halves are compared in constant time, without short-circuiting.
        let matched = user.as_bytes().ct_eq(self.user.as_bytes())
            & pass.as_bytes().ct_eq(self.pass.as_bytes());
        matched.into()
    }
}

#[async_trait]
impl Handler for BasicAuth {
    async fn handle(&self, exchange: &mut Exchange) -> Result<Flow, PipelineError> {
        if self.accepts(exchange.header(header::AUTHORIZATION)) {
            return Ok(Flow::Next);
        }
        tracing::warn!(path = %exchange.original_path(), "Admin authentication failed");
        let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, self.challenge.clone());
        Ok(Flow::Respond(response))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdminRoute {
    Listing,
    Edit,
    Create,
    Search,
}

/// Admin screens. All of them skip the site layout.
#[derive(Debug)]
pub struct AdminRouter {
    table: RouteTable<AdminRoute>,
    controllers: Controllers,
}

impl AdminRouter {
    pub fn new(controllers: Controllers) -> Result<Self, PipelineError> {
        let table = RouteTable::new()
            .get("/", AdminRoute::Listing)?
            .get("/edit/?", AdminRoute::Listing)?
            .get("/edit/(.+?)/?", AdminRoute::Edit)?
            .get("/create/(.+?)/?", AdminRoute::Create)?
            .post("/search(?:/(.*?))?/?", AdminRoute::Search)?;
        Ok(Self { table, controllers })
    }
}

#[async_trait]
impl Handler for AdminRouter {
    async fn handle(&self, exchange: &mut Exchange) -> Result<Flow, PipelineError> {
        let Some(matched) = self.table.resolve(exchange.method(), exchange.path()) else {
            return Ok(Flow::Next);
        };
        let param = matched.param(0).unwrap_or_default();

        let ctx = match matched.id {
            AdminRoute::Listing => {
                let listing = self.controllers.index().await?;
                RenderContext::new(LISTING_TEMPLATE, listing.data).bypass_layout()
            }
            AdminRoute::Edit => {
                let article = self.controllers.store().find(param).await?;
                RenderContext::new(EDITOR_TEMPLATE, json!({ "article": article })).bypass_layout()
            }
            AdminRoute::Create => new_article(param),
            AdminRoute::Search => {
                let term = exchange.form_param("q").unwrap_or_default();
                self.controllers.search(&term, param).await?.bypass_layout()
            }
        };

        exchange.set_render(ctx);
        Ok(Flow::Next)
    }
}

fn new_article(name: &str) -> RenderContext {
    let markdown = [
        format!("Title: {name}"),
        "Author: Your name".to_string(),
        format!("Date: {}", Utc::now().format("%Y-%m-%d %H:%M")),
    ]
    .join("\n");
    RenderContext::new(
        EDITOR_TEMPLATE,
        json!({
            "article": { "name": name, "title": name, "markdown": markdown },
            "mode": "create",
        }),
    )
    .bypass_layout()
}

/// Logs each admin request after the main handler ran.
#[derive(Debug, Clone, Copy)]
pub struct RequestTrace;

#[async_trait]
impl Handler for RequestTrace {
    async fn handle(&self, exchange: &mut Exchange) -> Result<Flow, PipelineError> {
        tracing::debug!(
            method = %exchange.method(),
            path = %exchange.original_path(),
            template = exchange.render_context().map(|c| c.template.as_str()),
            "Admin request"
        );
        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FsContentStore;
    use axum::http::{HeaderMap, Method};
    use bytes::Bytes;
    use std::sync::Arc;

    fn basic(user: &str, pass: &str) -> String {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
        format!("Basic {token}")
    }

    fn exchange(method: Method, uri: &str, authorization: Option<String>) -> Exchange {
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        }
        Exchange::new(method, uri.parse().unwrap(), headers, Bytes::new())
    }

    #[test]
    fn test_credentials_check() {
        let auth = BasicAuth::new("admin", "s3cret:x", DEFAULT_REALM);
        assert!(auth.accepts(Some(&basic("admin", "s3cret:x"))));
        assert!(!auth.accepts(Some(&basic("admin", "wrong"))));
        assert!(!auth.accepts(Some("Bearer abc")));
        assert!(!auth.accepts(Some("Basic !!!")));
        assert!(!auth.accepts(None));
    }

    #[test]
    fn test_credentials_must_match_exactly() {
        let auth = BasicAuth::new("admin", "secret", DEFAULT_REALM);
        assert!(auth.accepts(Some(&basic("admin", "secret"))));
        assert!(!auth.accepts(Some(&basic("admin", "secre"))));
        assert!(!auth.accepts(Some(&basic("admin", "secrets"))));
        assert!(!auth.accepts(Some(&basic("Admin", "secret"))));
        assert!(!auth.accepts(Some(&basic("", ""))));
        let no_separator = base64::engine::general_purpose::STANDARD.encode("adminsecret");
        assert!(!auth.accepts(Some(&format!("Basic {no_separator}"))));
    }

    #[tokio::test]
    async fn test_challenge_on_failure() {
        let auth = BasicAuth::new("admin", "pw", "site");
        let mut ex = exchange(Method::GET, "/admin/", None);
        let Flow::Respond(response) = auth.handle(&mut ex).await.unwrap() else {
            panic!("expected a challenge");
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"site\""
        );

        let mut ex = exchange(Method::GET, "/admin/", Some(basic("admin", "pw")));
        assert!(matches!(auth.handle(&mut ex).await.unwrap(), Flow::Next));
    }

    #[tokio::test]
    async fn test_create_screen_bypasses_layout() {
        let store = Arc::new(FsContentStore::new("/nonexistent/articles"));
        let router = AdminRouter::new(Controllers::new(store)).unwrap();

        let mut ex = exchange(Method::GET, "/create/notes/new-post", None);
        assert!(matches!(router.handle(&mut ex).await.unwrap(), Flow::Next));

        let ctx = ex.take_render().unwrap();
        assert_eq!(ctx.template, EDITOR_TEMPLATE);
        assert!(ctx.layout_bypass);
        assert_eq!(ctx.data["mode"], "create");
        assert_eq!(ctx.data["article"]["name"], "notes/new-post");
        assert!(ctx.data["article"]["markdown"]
            .as_str()
            .unwrap()
            .starts_with("Title: notes/new-post\nAuthor: Your name\nDate: "));
    }

    #[tokio::test]
    async fn test_unknown_admin_path_calls_through() {
        let store = Arc::new(FsContentStore::new("/nonexistent/articles"));
        let router = AdminRouter::new(Controllers::new(store)).unwrap();
        let mut ex = exchange(Method::GET, "/css/admin.css", None);
        assert!(matches!(router.handle(&mut ex).await.unwrap(), Flow::Next));
        assert!(ex.render_context().is_none());
    }
}
