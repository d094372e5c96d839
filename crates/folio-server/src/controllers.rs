//! Page actions: each asks the content store for data and says which template
//! renders it. Shared by the core routes and by extensions that reuse them.

use std::sync::Arc;

use chrono::Month;
use folio_render::RenderContext;
use serde_json::json;

use crate::content::{Article, ContentError, ContentStore};

#[derive(Debug, Clone)]
pub struct Controllers {
    store: Arc<dyn ContentStore>,
}

impl Controllers {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Every article, most recent first.
    pub async fn index(&self) -> Result<RenderContext, ContentError> {
        let articles = self.store.all("").await?;
        Ok(RenderContext::new("index.html", json!({ "articles": articles })))
    }

    pub async fn category(&self, category: &str) -> Result<RenderContext, ContentError> {
        let articles = self.store.categories("", category).await?;
        Ok(RenderContext::new(
            "index.html",
            json!({ "articles": articles, "category": category.trim_matches('/') }),
        ))
    }

    pub async fn tag(&self, tag: &str) -> Result<RenderContext, ContentError> {
        let articles = self.store.tags("", tag).await?;
        Ok(RenderContext::new(
            "index.html",
            json!({ "articles": articles, "tag": tag }),
        ))
    }

    pub async fn article(&self, name: &str) -> Result<RenderContext, ContentError> {
        let article = self.store.find(name).await?;
        Ok(article_page(article))
    }

    pub async fn revision(&self, commit: &str, name: &str) -> Result<RenderContext, ContentError> {
        let article = self.store.revision(commit, name).await?;
        let mut ctx = article_page(article);
        ctx.insert("revision", json!(commit));
        Ok(ctx)
    }

    /// Full-text search under `scope` (empty for everything).
    pub async fn search(&self, term: &str, scope: &str) -> Result<RenderContext, ContentError> {
        let articles = self.store.search(term, scope).await?;
        Ok(RenderContext::new(
            "search.html",
            json!({ "articles": articles, "term": format!("Search for {term}") }),
        ))
    }

    pub async fn archives(&self) -> Result<RenderContext, ContentError> {
        let articles = self.store.all("").await?;
        let mut years: Vec<i32> = Vec::new();
        for year in articles.iter().filter_map(Article::year) {
            if !years.contains(&year) {
                years.push(year);
            }
        }
        Ok(RenderContext::new(
            "archives.html",
            json!({ "articles": articles, "years": years }),
        ))
    }

    /// Articles published in `year`, optionally narrowed to `month` (1-12).
    pub async fn archive_period(
        &self,
        year: i32,
        month: Option<u32>,
    ) -> Result<RenderContext, ContentError> {
        let mut articles = self.store.all("").await?;
        articles.retain(|a| {
            a.year() == Some(year) && month.is_none_or(|m| a.month() == Some(m))
        });

        let month_name = month
            .and_then(|m| u8::try_from(m).ok())
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name());
        let term = match month_name {
            Some(name) => format!("Archives for {name} {year}"),
            None => format!("Archives for {year}"),
        };
        Ok(RenderContext::new(
            "search.html",
            json!({ "articles": articles, "term": term }),
        ))
    }

    /// RSS feed, never decorated with the layout.
    pub async fn feed(&self) -> Result<RenderContext, ContentError> {
        let articles = self.store.all("").await?;
        Ok(RenderContext::new("feed.xml", json!({ "articles": articles })).bypass_layout())
    }
}

fn article_page(article: Article) -> RenderContext {
    let author = article.author.clone();
    let content = article.body.clone();
    RenderContext::new(
        "article.html",
        json!({
            "article": article,
            "author": { "name": author },
            "content": content,
        }),
    )
}
