//! Built-in page routes.

use async_trait::async_trait;

use super::exchange::Exchange;
use super::handler::{Flow, Handler};
use super::routes::{RouteMatch, RouteTable};
use crate::controllers::Controllers;
use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreRoute {
    Index,
    Category,
    Tag,
    Article,
    Revision,
    Search,
    SearchForm,
    Archives,
    ArchivePeriod,
    Feed,
}

/// Matches the request against the page routes and sets the render context;
/// never answers by itself.
#[derive(Debug)]
pub struct CoreRoutes {
    table: RouteTable<CoreRoute>,
    controllers: Controllers,
}

impl CoreRoutes {
    pub fn new(controllers: Controllers) -> Result<Self, PipelineError> {
        let table = RouteTable::new()
            .get("/", CoreRoute::Index)?
            .get("/category/(.+?)/?", CoreRoute::Category)?
            .get("/tag/([^/]+)/?", CoreRoute::Tag)?
            .get("/article/(.+?)/?", CoreRoute::Article)?
            .get("/([0-9a-f]{40})/(.+?)/?", CoreRoute::Revision)?
            .get("/search(?:/(.*?))?/?", CoreRoute::Search)?
            .post("/search(?:/(.*?))?/?", CoreRoute::SearchForm)?
            .get("/archives/?", CoreRoute::Archives)?
            .get("/archives/([0-9]{4})(?:/([0-9]{1,2}))?/?", CoreRoute::ArchivePeriod)?
            .get("/feed\\.xml", CoreRoute::Feed)?;
        Ok(Self { table, controllers })
    }

    pub fn resolve(&self, exchange: &Exchange) -> Option<RouteMatch<CoreRoute>> {
        self.table.resolve(exchange.method(), exchange.path())
    }
}

#[async_trait]
impl Handler for CoreRoutes {
    async fn handle(&self, exchange: &mut Exchange) -> Result<Flow, PipelineError> {
        let Some(matched) = self.resolve(exchange) else {
            return Ok(Flow::Next);
        };
        let c = &self.controllers;
        let param = |i| matched.param(i).unwrap_or_default();

        let ctx = match matched.id {
            CoreRoute::Index => c.index().await?,
            CoreRoute::Category => c.category(param(0)).await?,
            CoreRoute::Tag => c.tag(param(0)).await?,
            CoreRoute::Article => c.article(param(0)).await?,
            CoreRoute::Revision => c.revision(param(0), param(1)).await?,
            CoreRoute::Search => {
                let term = exchange.query_param("q").unwrap_or_default();
                c.search(&term, param(0)).await?
            }
            CoreRoute::SearchForm => {
                let term = exchange.form_param("q").unwrap_or_default();
                c.search(&term, param(0)).await?
            }
            CoreRoute::Archives => c.archives().await?,
            CoreRoute::ArchivePeriod => {
                let year = param(0).parse().unwrap_or_default();
                let month = matched.param(1).and_then(|m| m.parse().ok());
                c.archive_period(year, month).await?
            }
            CoreRoute::Feed => c.feed().await?,
        };

        tracing::debug!(route = ?matched.id, template = %ctx.template, "Core route matched");
        exchange.set_render(ctx);
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

    fn routes() -> CoreRoutes {
        let store = Arc::new(FsContentStore::new("/nonexistent/articles"));
        CoreRoutes::new(Controllers::new(store)).unwrap()
    }

    fn resolve(method: Method, path: &str) -> Option<(CoreRoute, Vec<Option<String>>)> {
        let ex = Exchange::new(method, path.parse().unwrap(), HeaderMap::new(), Bytes::new());
        routes().resolve(&ex).map(|m| (m.id, m.params))
    }

    #[test]
    fn test_route_table() {
        assert_eq!(resolve(Method::GET, "/").unwrap().0, CoreRoute::Index);
        assert_eq!(
            resolve(Method::GET, "/category/notes/rust/").unwrap(),
            (CoreRoute::Category, vec![Some("notes/rust".to_string())])
        );
        assert_eq!(resolve(Method::GET, "/tag/async").unwrap().0, CoreRoute::Tag);
        assert_eq!(resolve(Method::GET, "/feed.xml").unwrap().0, CoreRoute::Feed);
        assert_eq!(resolve(Method::GET, "/archives").unwrap().0, CoreRoute::Archives);
        assert_eq!(
            resolve(Method::GET, "/archives/2011/03").unwrap(),
            (
                CoreRoute::ArchivePeriod,
                vec![Some("2011".to_string()), Some("03".to_string())]
            )
        );
        assert_eq!(resolve(Method::POST, "/search/notes").unwrap().0, CoreRoute::SearchForm);
        assert!(resolve(Method::GET, "/feedxxml").is_none());
        assert!(resolve(Method::GET, "/unknown").is_none());
    }

    #[test]
    fn test_revision_route() {
        let sha = "e3e43764c7854f5ce4c16d527ec6244a3c2a0f7d";
        let (id, params) = resolve(Method::GET, &format!("/{sha}/notes/hello")).unwrap();
        assert_eq!(id, CoreRoute::Revision);
        assert_eq!(params[0].as_deref(), Some(sha));
        assert_eq!(params[1].as_deref(), Some("notes/hello"));
    }

    #[tokio::test]
    async fn test_unmatched_request_calls_through_without_render() {
        let mut ex = Exchange::new(
            Method::GET,
            "/admin/".parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        );
        assert!(matches!(routes().handle(&mut ex).await.unwrap(), Flow::Next));
        assert!(ex.render_context().is_none());
    }

    #[tokio::test]
    async fn test_matched_request_sets_render_context() {
        let mut ex = Exchange::new(
            Method::GET,
            "/feed.xml".parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        );
        assert!(matches!(routes().handle(&mut ex).await.unwrap(), Flow::Next));
        let ctx = ex.render_context().unwrap();
        assert_eq!(ctx.template, "feed.xml");
        assert!(ctx.layout_bypass);
    }
}
