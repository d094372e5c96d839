//! Article storage consulted by the route controllers.
//!
//! The pipeline only depends on the [`ContentStore`] trait; [`FsContentStore`]
//! reads markdown files from a directory (optionally a git checkout).

mod fs_store;
mod props;

pub use fs_store::FsContentStore;
pub use props::{parse_date, parse_props, ArticleProps};

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;

/// Errors raised by a content store.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("article not found: {path}")]
    NotFound { path: String },

    #[error("invalid article path: {0}")]
    InvalidPath(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("git lookup failed: {0}")]
    Git(String),
}

/// One article as seen by templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    /// Path below the article directory, without extension, `/`-separated.
    pub name: String,
    pub title: String,
    pub author: String,
    /// Date exactly as written in the article header.
    pub date: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    /// Markdown source without the header block.
    pub markdown: String,
    /// Rendered HTML.
    pub body: String,
    #[serde(skip)]
    pub published: Option<NaiveDateTime>,
}

impl Article {
    /// Four-digit year mentioned by the date, if any.
    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.published.map(|d| d.year()).or_else(|| {
            props::YEAR_RE
                .find(&self.date)
                .and_then(|m| m.as_str().parse().ok())
        })
    }

    pub fn month(&self) -> Option<u32> {
        use chrono::Datelike;
        self.published.map(|d| d.month())
    }
}

/// Read access to published articles. Scopes are directory prefixes relative to
/// the store root; an empty scope means everything.
#[async_trait]
pub trait ContentStore: Send + Sync + fmt::Debug {
    /// Every article under `scope`, most recent first.
    async fn all(&self, scope: &str) -> Result<Vec<Article>, ContentError>;

    /// Articles filed under the `category` directory, or declaring it in their header.
    async fn categories(&self, scope: &str, category: &str) -> Result<Vec<Article>, ContentError>;

    /// Articles whose header lists `tag`.
    async fn tags(&self, scope: &str, tag: &str) -> Result<Vec<Article>, ContentError>;

    /// A single article by name (no extension).
    async fn find(&self, name: &str) -> Result<Article, ContentError>;

    /// An article as it was at `commit`.
    async fn revision(&self, commit: &str, name: &str) -> Result<Article, ContentError>;

    /// Articles under `scope` whose source matches `term` (case-insensitive pattern).
    async fn search(&self, term: &str, scope: &str) -> Result<Vec<Article>, ContentError>;
}

/// Newest first; undated articles last, then by name.
pub(crate) fn sort_recent_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| {
        b.published
            .cmp(&a.published)
            .then_with(|| a.name.cmp(&b.name))
    });
}
