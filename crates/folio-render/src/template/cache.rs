//! The shared template table.
//!
//! Entries are `Arc<TemplateEntry>` values in a `DashMap`: a recompilation builds a
//! complete entry first and swaps it in with a single insert, so a reader holds
//! either the old entry or the new one, never a mix.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use serde_json::Value;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use super::engine::{CompiledTemplate, EngineSet, TemplateEngine};
use crate::error::TemplateError;

/// Namespace prefix of every logical template key.
pub const KEY_NAMESPACE: &str = "tmpl.";

const PAGES_DIR: &str = "pages";
const PAGE_SEGMENT: &str = "page.";

/// Derive the logical key for a template source file.
///
/// `<theme>/templates/index.html` → `tmpl.index.html`,
/// `<theme>/templates/pages/404.html` → `tmpl.page.404.html`.
pub fn template_key(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let nested = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|dir| dir == PAGES_DIR);
    let segment = if nested { PAGE_SEGMENT } else { "" };
    Some(format!("{KEY_NAMESPACE}{segment}{file_name}"))
}

/// A compiled template and where it came from.
#[derive(Debug)]
pub struct TemplateEntry {
    pub key: String,
    /// Source file, `None` for templates registered from a string.
    pub source: Option<PathBuf>,
    /// Modification time of the source when it was compiled.
    pub modified: Option<SystemTime>,
    /// Identifier of the engine that compiled it.
    pub engine: &'static str,
    renderer: Arc<dyn CompiledTemplate>,
}

impl TemplateEntry {
    pub fn render(&self, data: &Value) -> Result<String, TemplateError> {
        self.renderer.render(data)
    }
}

#[derive(Debug, Clone)]
struct SourceRecord {
    path: PathBuf,
    attempted: bool,
}

/// Outcome of a startup warm-up pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WarmupReport {
    pub compiled: usize,
    pub failed: usize,
}

/// Compiled templates keyed by logical name.
#[derive(Debug)]
pub struct TemplateCache {
    engines: EngineSet,
    entries: DashMap<String, Arc<TemplateEntry>>,
    sources: DashMap<String, SourceRecord>,
    watched: DashMap<PathBuf, Option<SystemTime>>,
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(EngineSet::default())
    }
}

impl TemplateCache {
    pub fn new(engines: EngineSet) -> Self {
        Self {
            engines,
            entries: DashMap::new(),
            sources: DashMap::new(),
            watched: DashMap::new(),
        }
    }

    pub fn engines(&self) -> &EngineSet {
        &self.engines
    }

    /// Recursively collect template sources under `dir` that some engine claims,
    /// sorted by path, and remember them so a cold key can be compiled on demand.
    ///
    /// A missing directory yields no sources. Symlinked directories are not entered.
    pub fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>, TemplateError> {
        let mut found = Vec::new();
        if !dir.is_dir() {
            tracing::debug!(?dir, "Template directory does not exist, skipping");
            return Ok(found);
        }

        for entry in WalkDir::new(dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(TemplateError::Io {
                        path: dir.to_path_buf(),
                        source: e.into(),
                    })
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable template path");
                    continue;
                }
            };
            if entry.file_type().is_file() && self.engines.engine_for_path(entry.path()).is_some() {
                found.push(entry.into_path());
            }
        }

        found.sort();
        for path in &found {
            self.register_source(path);
        }
        Ok(found)
    }

    /// Remember `path` as the source for its key without compiling it yet.
    pub fn register_source(&self, path: &Path) {
        if let Some(key) = template_key(path) {
            self.sources.insert(
                key,
                SourceRecord {
                    path: path.to_path_buf(),
                    attempted: false,
                },
            );
        }
    }

    /// Read, compile and cache the template at `path`.
    ///
    /// On failure the cache is left untouched: an existing entry for the same key
    /// keeps serving.
    pub async fn compile(&self, path: &Path) -> Result<Arc<TemplateEntry>, TemplateError> {
        let key = template_key(path).ok_or_else(|| TemplateError::UnsupportedSource {
            path: path.to_path_buf(),
        })?;
        if let Some(mut record) = self.sources.get_mut(&key) {
            if record.path == path {
                record.attempted = true;
            }
        }

        let engine = self
            .engines
            .engine_for_path(path)
            .cloned()
            .ok_or_else(|| TemplateError::UnsupportedSource {
                path: path.to_path_buf(),
            })?;

        let io_err = |e| TemplateError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let source = tokio::fs::read_to_string(path).await.map_err(io_err)?;
        let modified = tokio::fs::metadata(path)
            .await
            .map_err(io_err)?
            .modified()
            .ok();

        let renderer = engine.compile(&key, &source)?;
        let entry = Arc::new(TemplateEntry {
            key: key.clone(),
            source: Some(path.to_path_buf()),
            modified,
            engine: engine.id(),
            renderer,
        });
        self.install(entry.clone());
        tracing::debug!(%key, ?path, engine = engine.id(), "Compiled template");
        Ok(entry)
    }

    /// Compile a template from a string, choosing the engine from the key's suffix.
    pub fn compile_str(&self, key: &str, source: &str) -> Result<Arc<TemplateEntry>, TemplateError> {
        let engine: Arc<dyn TemplateEngine> = key
            .rsplit_once('.')
            .and_then(|(_, ext)| self.engines.engine_for_extension(ext))
            .cloned()
            .ok_or_else(|| TemplateError::UnsupportedSource {
                path: PathBuf::from(key),
            })?;

        let renderer = engine.compile(key, source)?;
        let entry = Arc::new(TemplateEntry {
            key: key.to_string(),
            source: None,
            modified: None,
            engine: engine.id(),
            renderer,
        });
        self.install(entry.clone());
        Ok(entry)
    }

    fn install(&self, entry: Arc<TemplateEntry>) {
        let key = entry.key.clone();
        let new_source = entry.source.clone();
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            if previous.source.is_some() && previous.source != new_source {
                tracing::warn!(
                    %key,
                    previous = ?previous.source,
                    current = ?new_source,
                    "Template key compiled from a different source, last write wins"
                );
            }
        }
    }

    /// Exact lookup by key, without engine fallback.
    pub fn lookup(&self, key: &str) -> Option<Arc<TemplateEntry>> {
        self.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    /// Look up `key` through the engine precedence list among compiled entries.
    pub fn resolve(&self, key: &str) -> Option<Arc<TemplateEntry>> {
        self.engines
            .candidates(key)
            .iter()
            .find_map(|candidate| self.lookup(candidate))
    }

    /// Like [`resolve`](Self::resolve), but compiles a known, not yet attempted
    /// source when a candidate is cold. Compile failures fall through to the next
    /// candidate.
    pub async fn resolve_or_compile(&self, key: &str) -> Option<Arc<TemplateEntry>> {
        for candidate in self.engines.candidates(key) {
            if let Some(entry) = self.lookup(&candidate) {
                return Some(entry);
            }

            let pending = self
                .sources
                .get(&candidate)
                .filter(|record| !record.attempted)
                .map(|record| record.path.clone());
            if let Some(path) = pending {
                match self.compile(&path).await {
                    Ok(entry) => return Some(entry),
                    Err(e) => {
                        tracing::warn!(key = %candidate, error = %e, "Template failed to compile, trying next engine");
                    }
                }
            }
        }
        None
    }

    /// Compile a template and watch it for changes.
    pub async fn add_template(&self, path: &Path) -> Result<Arc<TemplateEntry>, TemplateError> {
        self.register_source(path);
        let result = self.compile(path).await;
        self.watch(path);
        result
    }

    /// Start tracking the modification time of `path`.
    pub fn watch(&self, path: &Path) {
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        self.watched.insert(path.to_path_buf(), modified);
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched.contains_key(path)
    }

    /// Watched files whose modification time changed since the last poll.
    pub fn poll_changes(&self) -> Vec<PathBuf> {
        let mut changed = Vec::new();
        for mut item in self.watched.iter_mut() {
            let current = std::fs::metadata(item.key())
                .and_then(|m| m.modified())
                .ok();
            if current.is_some() && current != *item.value() {
                *item.value_mut() = current;
                changed.push(item.key().clone());
            }
        }
        changed.sort();
        changed
    }

    /// Recompile a changed template. Failures are logged and the previous entry kept.
    pub async fn reload(&self, path: &Path) -> bool {
        match self.compile(path).await {
            Ok(entry) => {
                tracing::info!(key = %entry.key, ?path, "Reloaded template");
                true
            }
            Err(e) => {
                tracing::warn!(?path, error = %e, "Template reload failed, keeping previous version");
                false
            }
        }
    }

    /// Compile every path in the background, optionally watching each one.
    ///
    /// The caller does not wait: requests may arrive before this finishes, in
    /// which case [`resolve_or_compile`](Self::resolve_or_compile) compiles on demand.
    pub fn warm_up(self: &Arc<Self>, paths: Vec<PathBuf>, watch: bool) -> JoinHandle<WarmupReport> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut report = WarmupReport::default();
            for path in paths {
                match cache.compile(&path).await {
                    Ok(_) => report.compiled += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(?path, error = %e, "Failed to compile template");
                    }
                }
                if watch {
                    cache.watch(&path);
                }
            }
            tracing::info!(
                compiled = report.compiled,
                failed = report.failed,
                "Template warm-up finished"
            );
            report
        })
    }

    /// Compiled keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::time::Duration;

    fn bump_mtime(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_template_key_plain_and_pages() {
        assert_eq!(
            template_key(Path::new("/theme/templates/index.html")).as_deref(),
            Some("tmpl.index.html")
        );
        assert_eq!(
            template_key(Path::new("/theme/templates/pages/404.html")).as_deref(),
            Some("tmpl.page.404.html")
        );
    }

    #[test]
    fn test_scan_collects_claimed_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pages")).unwrap();
        fs::write(dir.path().join("index.html"), "i").unwrap();
        fs::write(dir.path().join("feed.xml"), "f").unwrap();
        fs::write(dir.path().join("pages/404.html"), "p").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let cache = TemplateCache::default();
        let found = cache.scan(dir.path()).unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|p| p.extension().unwrap() != "txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_does_not_follow_directory_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "i").unwrap();
        std::os::unix::fs::symlink(".", dir.path().join("loop")).unwrap();

        let cache = TemplateCache::default();
        let found = cache.scan(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("index.html")]);
    }

    #[test]
    fn test_scan_missing_dir_is_empty() {
        let cache = TemplateCache::default();
        assert!(cache.scan(Path::new("/nonexistent/templates")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compile_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        fs::write(&path, "Hello {{ name }}").unwrap();

        let cache = TemplateCache::default();
        cache.compile(&path).await.unwrap();

        let entry = cache.lookup("tmpl.index.html").unwrap();
        assert_eq!(entry.engine, "tera");
        assert_eq!(entry.source.as_deref(), Some(path.as_path()));
        assert_eq!(entry.render(&json!({"name": "folio"})).unwrap(), "Hello folio");
    }

    #[tokio::test]
    async fn test_failed_recompile_keeps_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        fs::write(&path, "v1").unwrap();

        let cache = TemplateCache::default();
        cache.compile(&path).await.unwrap();

        fs::write(&path, "{% if %}").unwrap();
        assert!(cache.compile(&path).await.is_err());

        let entry = cache.lookup("tmpl.index.html").unwrap();
        assert_eq!(entry.render(&json!({})).unwrap(), "v1");
    }

    #[tokio::test]
    async fn test_resolve_prefers_override_engine() {
        let cache = TemplateCache::default();
        cache.compile_str("tmpl.index.html", "default").unwrap();
        assert_eq!(
            cache.resolve("tmpl.index.html").unwrap().render(&json!({})).unwrap(),
            "default"
        );

        cache.compile_str("tmpl.index.tera", "override").unwrap();
        let entry = cache.resolve("tmpl.index.html").unwrap();
        assert_eq!(entry.engine, "tera-strict");
        assert_eq!(entry.render(&json!({})).unwrap(), "override");
    }

    #[tokio::test]
    async fn test_resolve_or_compile_compiles_cold_source() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("article.html"), "cold").unwrap();

        let cache = TemplateCache::default();
        cache.scan(dir.path()).unwrap();
        assert!(cache.lookup("tmpl.article.html").is_none());

        let entry = cache.resolve_or_compile("tmpl.article.html").await.unwrap();
        assert_eq!(entry.render(&json!({})).unwrap(), "cold");
        assert!(cache.resolve_or_compile("tmpl.missing.html").await.is_none());
    }

    #[tokio::test]
    async fn test_broken_override_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.tera"), "{% if %}").unwrap();
        fs::write(dir.path().join("index.html"), "fallback").unwrap();

        let cache = TemplateCache::default();
        cache.scan(dir.path()).unwrap();

        let entry = cache.resolve_or_compile("tmpl.index.html").await.unwrap();
        assert_eq!(entry.engine, "tera");
        assert_eq!(entry.render(&json!({})).unwrap(), "fallback");
    }

    #[tokio::test]
    async fn test_poll_and_reload_picks_up_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        fs::write(&path, "old").unwrap();

        let cache = TemplateCache::default();
        cache.add_template(&path).await.unwrap();
        assert!(cache.is_watched(&path));
        assert!(cache.poll_changes().is_empty());

        fs::write(&path, "new").unwrap();
        bump_mtime(&path, 5);

        let changed = cache.poll_changes();
        assert_eq!(changed, vec![path.clone()]);
        assert!(cache.reload(&path).await);
        let entry = cache.lookup("tmpl.index.html").unwrap();
        assert_eq!(entry.render(&json!({})).unwrap(), "new");

        // A second poll without further edits reports nothing.
        assert!(cache.poll_changes().is_empty());
    }

    #[tokio::test]
    async fn test_warm_up_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.html"), "ok").unwrap();
        fs::write(dir.path().join("bad.html"), "{% for %}").unwrap();

        let cache = Arc::new(TemplateCache::default());
        let paths = cache.scan(dir.path()).unwrap();
        let report = cache.warm_up(paths, true).await.unwrap();

        assert_eq!(report, WarmupReport { compiled: 1, failed: 1 });
        assert_eq!(cache.keys(), vec!["tmpl.good.html"]);
    }
}
