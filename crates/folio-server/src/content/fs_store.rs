use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};
use regex::{Regex, RegexBuilder};
use tokio::process::Command;
use walkdir::WalkDir;

use super::props::{parse_date, parse_props};
use super::{sort_recent_first, Article, ContentError, ContentStore};

/// Recognised article file extensions, in lookup order.
const ARTICLE_EXTENSIONS: &[&str] = &["markdown", "md"];

static COMMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{7,40}$").expect("valid commit regex"));

/// Markdown articles stored under one directory.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a request-supplied relative path onto the root, refusing anything that
    /// could leave it.
    fn resolve(&self, relative: &str) -> Result<PathBuf, ContentError> {
        let relative = relative.trim_matches('/');
        let candidate = Path::new(relative);
        let escapes = candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(ContentError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(candidate))
    }

    /// Article files under `scope`, sorted by path.
    async fn collect(&self, scope: &str) -> Result<Vec<PathBuf>, ContentError> {
        let start = self.resolve(scope)?;
        let walk_root = start.clone();
        tokio::task::spawn_blocking(move || walk_articles(&walk_root))
            .await
            .map_err(|e| ContentError::Io {
                path: start,
                source: std::io::Error::other(e),
            })
    }

    async fn load(&self, path: &Path) -> Result<Article, ContentError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ContentError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(article_from(&self.article_name(path), &text))
    }

    async fn load_all(&self, scope: &str) -> Result<Vec<(Article, String)>, ContentError> {
        let mut loaded = Vec::new();
        for path in self.collect(scope).await? {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ContentError::Io {
                    path: path.clone(),
                    source: e,
                })?;
            loaded.push((article_from(&self.article_name(&path), &text), text));
        }
        Ok(loaded)
    }

    fn article_name(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .with_extension("")
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Article files below `start`. Symlinked directories are not entered.
fn walk_articles(start: &Path) -> Vec<PathBuf> {
    if !start.is_dir() {
        tracing::debug!(dir = ?start, "Article directory does not exist");
        return Vec::new();
    }
    let mut found: Vec<PathBuf> = WalkDir::new(start)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_article(e.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    found.sort();
    found
}

fn is_article(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ARTICLE_EXTENSIONS.contains(&e))
}

fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(source, options);
    let mut output = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

fn article_from(name: &str, text: &str) -> Article {
    let props = parse_props(text);
    let date = props.get("date").unwrap_or_default().to_string();
    let fallback_title = name.rsplit('/').next().unwrap_or(name).replace('-', " ");

    Article {
        name: name.to_string(),
        title: props
            .get("title")
            .map(str::to_string)
            .unwrap_or(fallback_title),
        author: props.get("author").unwrap_or_default().to_string(),
        published: parse_date(&date),
        date,
        categories: props.list("categories"),
        tags: props.list("tags"),
        body: render_markdown(&props.body),
        markdown: props.body,
    }
}

/// The term as a case-insensitive pattern, or as a literal when it is not a valid one.
fn search_pattern(term: &str) -> Option<Regex> {
    RegexBuilder::new(term)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex::escape(term))
                .case_insensitive(true)
                .build()
        })
        .ok()
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn all(&self, scope: &str) -> Result<Vec<Article>, ContentError> {
        let mut articles = Vec::new();
        for path in self.collect(scope).await? {
            articles.push(self.load(&path).await?);
        }
        sort_recent_first(&mut articles);
        Ok(articles)
    }

    async fn categories(&self, scope: &str, category: &str) -> Result<Vec<Article>, ContentError> {
        let category = category.trim_matches('/');
        let segment = format!("/{category}/");
        let mut articles = self.all(scope).await?;
        articles.retain(|a| {
            format!("/{}", a.name).contains(&segment)
                || a.categories.iter().any(|c| c.eq_ignore_ascii_case(category))
        });
        Ok(articles)
    }

    async fn tags(&self, scope: &str, tag: &str) -> Result<Vec<Article>, ContentError> {
        let mut articles = self.all(scope).await?;
        articles.retain(|a| a.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)));
        Ok(articles)
    }

    async fn find(&self, name: &str) -> Result<Article, ContentError> {
        let base = self.resolve(name)?;
        for ext in ARTICLE_EXTENSIONS {
            let mut path = base.clone().into_os_string();
            path.push(format!(".{ext}"));
            let path = PathBuf::from(path);
            if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                return self.load(&path).await;
            }
        }
        Err(ContentError::NotFound {
            path: name.to_string(),
        })
    }

    async fn revision(&self, commit: &str, name: &str) -> Result<Article, ContentError> {
        if !COMMIT_RE.is_match(commit) {
            return Err(ContentError::InvalidPath(commit.to_string()));
        }
        let name = name.trim_matches('/');
        self.resolve(name)?;

        for ext in ARTICLE_EXTENSIONS {
            let output = Command::new("git")
                .arg("show")
                .arg(format!("{commit}:./{name}.{ext}"))
                .current_dir(&self.root)
                .output()
                .await
                .map_err(|e| ContentError::Git(e.to_string()))?;
            if output.status.success() {
                let text = String::from_utf8_lossy(&output.stdout);
                return Ok(article_from(name, &text));
            }
            tracing::debug!(
                commit,
                name,
                ext,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git show found no article"
            );
        }
        Err(ContentError::NotFound {
            path: format!("{commit}/{name}"),
        })
    }

    async fn search(&self, term: &str, scope: &str) -> Result<Vec<Article>, ContentError> {
        let Some(pattern) = search_pattern(term) else {
            tracing::warn!(term, "Search term cannot be compiled, no results");
            return Ok(Vec::new());
        };
        let mut articles: Vec<Article> = self
            .load_all(scope)
            .await?
            .into_iter()
            .filter(|(_, text)| pattern.is_match(text))
            .map(|(article, _)| article)
            .collect();
        sort_recent_first(&mut articles);
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(files: &[(&str, &str)]) -> (TempDir, FsContentStore) {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }
        let store = FsContentStore::new(dir.path());
        (dir, store)
    }

    fn names(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_all_sorted_newest_first() {
        let (_dir, store) = store_with(&[
            ("old.markdown", "Title: Old\nDate: 2010-01-01\n\nold"),
            ("notes/new.md", "Title: New\nDate: 2012-05-01\n\nnew"),
            ("undated.markdown", "Title: Undated\n\nbody"),
            ("readme.txt", "ignored"),
        ]);
        let articles = store.all("").await.unwrap();
        assert_eq!(names(&articles), vec!["notes/new", "old", "undated"]);
        assert_eq!(articles[0].title, "New");
        assert!(articles[0].body.contains("<p>new</p>"));
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let store = FsContentStore::new("/nonexistent/folio-articles");
        assert!(store.all("").await.unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_directories_are_not_walked() {
        let (dir, store) = store_with(&[("notes/a.markdown", "Title: A\n\na")]);
        std::os::unix::fs::symlink("..", dir.path().join("notes/up")).unwrap();

        let articles = store.all("").await.unwrap();
        assert_eq!(names(&articles), vec!["notes/a"]);
    }

    #[tokio::test]
    async fn test_find_and_not_found() {
        let (_dir, store) = store_with(&[("notes/hello-world.markdown", "Author: Ann\n\n*hi*")]);
        let article = store.find("notes/hello-world").await.unwrap();
        assert_eq!(article.title, "hello world");
        assert_eq!(article.author, "Ann");
        assert!(article.body.contains("<em>hi</em>"));

        let err = store.find("notes/missing").await.unwrap_err();
        assert!(matches!(err, ContentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_rejects_traversal() {
        let (_dir, store) = store_with(&[]);
        let err = store.find("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_categories_by_directory_and_header() {
        let (_dir, store) = store_with(&[
            ("rust/a.markdown", "Title: A\n\na"),
            ("misc/b.markdown", "Title: B\nCategories: Rust\n\nb"),
            ("misc/c.markdown", "Title: C\n\nc"),
        ]);
        let articles = store.categories("", "rust").await.unwrap();
        assert_eq!(names(&articles), vec!["misc/b", "rust/a"]);
    }

    #[tokio::test]
    async fn test_tags() {
        let (_dir, store) = store_with(&[
            ("a.markdown", "Tags: async, tokio\n\na"),
            ("b.markdown", "Tags: sync\n\nb"),
        ]);
        let articles = store.tags("", "Tokio").await.unwrap();
        assert_eq!(names(&articles), vec!["a"]);
    }

    #[tokio::test]
    async fn test_search_regex_and_literal_fallback() {
        let (_dir, store) = store_with(&[
            ("a.markdown", "Title: A\n\nPattern matching in Rust"),
            ("b.markdown", "Title: B\n\nunbalanced ( paren"),
        ]);
        let found = store.search("pattern\\s+MATCHING", "").await.unwrap();
        assert_eq!(names(&found), vec!["a"]);

        let found = store.search("(", "").await.unwrap();
        assert_eq!(names(&found), vec!["b"]);
    }

    #[tokio::test]
    async fn test_revision_rejects_bad_commit() {
        let (_dir, store) = store_with(&[]);
        let err = store.revision("not-a-sha", "a").await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidPath(_)));
    }
}
