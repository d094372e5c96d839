//! Extension manifest parsing (`extension.toml`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const MANIFEST_FILENAME: &str = "extension.toml";

/// Top-level extension manifest parsed from `extension.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionManifest {
    pub extension: ExtensionMetadata,

    /// Default configuration handed to the factory. `[extensions.config.<name>]`
    /// in the site config overrides individual keys.
    #[serde(default)]
    pub config: toml::Table,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionMetadata {
    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Mount path. Defaults to `/<directory name>`.
    pub path: Option<String>,
}

impl ExtensionManifest {
    /// Load a manifest from a directory containing `extension.toml`.
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let manifest_path = dir.join(MANIFEST_FILENAME);
        let contents = std::fs::read_to_string(&manifest_path).map_err(|e| ManifestError::Io {
            path: manifest_path.clone(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ManifestError::Parse {
            path: manifest_path,
            source: e,
        })
    }

    /// Problems that make the manifest unusable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(path) = &self.extension.path {
            if path.trim().is_empty() {
                errors.push("extension.path is empty".to_string());
            }
            if path.chars().any(char::is_whitespace) {
                errors.push(format!("extension.path '{path}' contains whitespace"));
            }
            if path.split('/').any(|segment| segment == "..") {
                errors.push(format!("extension.path '{path}' contains '..'"));
            }
        }
        errors
    }

    /// Mount path for an extension living in directory `name`.
    pub fn mount_path(&self, name: &str) -> String {
        normalize_mount_path(self.extension.path.as_deref().unwrap_or(name))
    }
}

/// Leading `/` added, trailing `/` removed; the root stays `/`.
pub fn normalize_mount_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Errors that can occur during manifest loading.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
