//! Poll-based hot reload for watched template sources.
//!
//! A poller task compares modification times on every tick and sends changed paths
//! over a channel; a single writer task drains the channel and recompiles, so cache
//! writes caused by file edits never race each other.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::cache::TemplateCache;

const RELOAD_CHANNEL_CAPACITY: usize = 64;

/// Handle to the running poller and writer tasks. Dropping it stops both.
#[derive(Debug)]
pub struct TemplateWatcher {
    poller: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl TemplateWatcher {
    pub fn spawn(cache: Arc<TemplateCache>, interval: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<PathBuf>(RELOAD_CHANNEL_CAPACITY);

        let poll_cache = Arc::clone(&cache);
        let poller = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for path in poll_cache.poll_changes() {
                    tracing::debug!(?path, "Template source changed");
                    if tx.send(path).await.is_err() {
                        return;
                    }
                }
            }
        });

        let writer = tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                cache.reload(&path).await;
            }
        });

        tracing::debug!(interval_ms = interval.as_millis() as u64, "Template watcher started");
        Self { poller, writer }
    }

    pub fn is_running(&self) -> bool {
        !self.poller.is_finished() && !self.writer.is_finished()
    }
}

impl Drop for TemplateWatcher {
    fn drop(&mut self) {
        self.poller.abort();
        self.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::time::SystemTime;

    #[tokio::test]
    async fn test_watcher_recompiles_edited_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        fs::write(&path, "before").unwrap();

        let cache = Arc::new(TemplateCache::default());
        cache.add_template(&path).await.unwrap();
        let watcher = TemplateWatcher::spawn(Arc::clone(&cache), Duration::from_millis(10));
        assert!(watcher.is_running());

        fs::write(&path, "after").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();

        let reloaded = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let out = cache
                    .lookup("tmpl.index.html")
                    .map(|e| e.render(&json!({})).unwrap());
                if out.as_deref() == Some("after") {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(reloaded.is_ok(), "watcher did not pick up the edit");
    }
}
