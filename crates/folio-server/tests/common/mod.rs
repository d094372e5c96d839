//! Shared fixtures: a throwaway site on disk plus helpers to drive the router.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use folio_server::config::Settings;
use folio_server::plugins::ExtensionCatalog;
use folio_server::{router, AppContext};

pub const LAYOUT: &str = "<html><head><title>{{ context.config.title }}</title></head>\
<body>{{ content | safe }}</body></html>";

pub const INDEX: &str = "<ul>{% for a in articles %}<li>{{ a.title }}</li>{% endfor %}</ul>";

pub const ARTICLE: &str = "<article><h1>{{ article.title }}</h1>{{ content | safe }}</article>";

pub const SEARCH: &str =
    "<h2>{{ term }}</h2><ul>{% for a in articles %}<li>{{ a.title }}</li>{% endfor %}</ul>";

pub const ARCHIVES: &str = "<ol>{% for y in years %}<li>{{ y }}</li>{% endfor %}</ol>";

pub const FEED: &str = "<rss><channel><title>{{ config.title }}</title>\
{% for a in articles %}<item><title>{{ a.title }}</title></item>{% endfor %}</channel></rss>";

pub const NOT_FOUND: &str = "<p class=\"error\">{{ error }}</p>";

/// A site directory with a theme, articles and extensions.
pub struct SiteFixture {
    pub dir: TempDir,
    pub settings: Settings,
}

impl SiteFixture {
    /// A site with the default theme templates and no articles or extensions.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::default().rooted_at(dir.path());
        settings.site.title = "Test Site".to_string();
        settings.templates.watch = false;

        let fixture = Self { dir, settings };
        fixture.template("layout.html", LAYOUT);
        fixture.template("index.html", INDEX);
        fixture.template("article.html", ARTICLE);
        fixture.template("search.html", SEARCH);
        fixture.template("archives.html", ARCHIVES);
        fixture.template("feed.xml", FEED);
        fixture.template("pages/404.html", NOT_FOUND);
        fixture
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.settings.theme.templates_dir()
    }

    pub fn write(&self, relative: impl AsRef<Path>, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn template(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.templates_dir().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn theme_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.settings.theme.public_dir().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn article(&self, name: &str, contents: &str) -> PathBuf {
        let path = self
            .settings
            .content
            .article_dir
            .join(format!("{name}.markdown"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Create `<extensions>/<name>/extension.toml`.
    pub fn extension(&self, name: &str, manifest: &str) -> PathBuf {
        let dir = self.settings.extensions.root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("extension.toml"), manifest).unwrap();
        dir
    }

    /// Bootstrap with the built-in extensions and wait for templates.
    pub async fn app(&self) -> (Arc<AppContext>, Router) {
        let ctx = AppContext::bootstrap(self.settings.clone()).await.unwrap();
        ctx.wait_for_templates().await;
        let app = router(Arc::clone(&ctx));
        (ctx, app)
    }

    /// Bootstrap with a custom extension catalog.
    pub async fn app_with(&self, catalog: &ExtensionCatalog) -> (Arc<AppContext>, Router) {
        let store = Arc::new(folio_server::content::FsContentStore::new(
            self.settings.content.article_dir.clone(),
        ));
        let ctx = AppContext::with_parts(self.settings.clone(), store, catalog)
            .await
            .unwrap();
        ctx.wait_for_templates().await;
        let app = router(Arc::clone(&ctx));
        (ctx, app)
    }
}

/// A finished response, body collected.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_with(app: &Router, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn post_form(app: &Router, uri: &str, form: &str, headers: &[(&str, &str)]) -> TestResponse {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(app, builder.body(Body::from(form.to_string())).unwrap()).await
}
