//! Extension directory discovery.
//!
//! Every immediate subdirectory of the extensions root is a candidate; its name is
//! the extension's identity. Hidden directories are skipped.

use std::path::{Path, PathBuf};

/// A candidate extension directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub dir: PathBuf,
}

/// Subdirectories of `root`, sorted by name.
pub fn discover_extension_dirs(root: &Path) -> Vec<Candidate> {
    if !root.is_dir() {
        tracing::debug!(?root, "Extensions root does not exist, skipping");
        return Vec::new();
    }

    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(?root, error = %e, "Cannot read extensions root");
            return Vec::new();
        }
    };

    let mut found: Vec<Candidate> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            (!name.starts_with('.')).then(|| Candidate {
                name,
                dir: entry.path(),
            })
        })
        .collect();

    found.sort_by(|a, b| a.name.cmp(&b.name));
    found
}
