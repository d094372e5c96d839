//! Content negotiation through the `content-negotiation` extension.

mod common;

use axum::http::StatusCode;
use common::{get, get_with, SiteFixture};

fn site(enable_negotiation: bool) -> SiteFixture {
    let mut site = SiteFixture::new();
    site.article("hello", "Title: It's here\nDate: 2011-03-14\n\nHi.\n");
    site.extension(
        "content-negotiation",
        "[extension]\ndescription = \"Alternate representations\"\n",
    );
    if !enable_negotiation {
        site.settings.extensions.enabled = Some(Vec::new());
    }
    site
}

#[tokio::test]
async fn test_json_accept_gets_page_data() {
    let site = site(true);
    let (ctx, app) = site.app().await;
    assert_eq!(ctx.negotiation.labels(), vec!["json", "plain"]);

    let response = get_with(&app, "/", &[("accept", "application/json")]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(
        response.header("content-length"),
        Some(response.body.len().to_string().as_str())
    );

    let data: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(data["articles"][0]["title"], "It's here");
    assert_eq!(data["config"]["title"], "Test Site");
}

#[tokio::test]
async fn test_plain_accept_gets_pretty_dump() {
    let site = site(true);
    let (_ctx, app) = site.app().await;

    let response = get_with(&app, "/article/hello", &[("accept", "text/plain")]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("content-type"),
        Some("text/plain; charset=utf-8")
    );
    assert!(response.body.contains("\n  \"article\": {"));
}

#[tokio::test]
async fn test_browser_accept_renders_html() {
    let site = site(true);
    let (_ctx, app) = site.app().await;

    let response = get_with(
        &app,
        "/",
        &[("accept", "text/html,application/xhtml+xml;q=0.9")],
    )
    .await;
    assert_eq!(
        response.header("content-type"),
        Some("text/html; charset=utf-8")
    );

    let response = get(&app, "/").await;
    assert!(response.body.starts_with("<html>"));
}

#[tokio::test]
async fn test_disabled_extension_registers_no_listener() {
    let site = site(false);
    let (ctx, app) = site.app().await;
    assert!(ctx.negotiation.is_empty());

    let response = get_with(&app, "/", &[("accept", "application/json")]).await;
    assert_eq!(
        response.header("content-type"),
        Some("text/html; charset=utf-8")
    );
}

#[tokio::test]
async fn test_requests_without_render_context_are_not_negotiated() {
    let site = site(true);
    let (_ctx, app) = site.app().await;

    let response = get_with(&app, "/missing/page", &[("accept", "application/json")]).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.contains("404 :("));
}
