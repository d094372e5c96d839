//! Site configuration read from `folio.toml`.
//!
//! Every section and key is optional; missing values take the defaults below.
//! Relative paths are resolved against the directory of the loaded file.

mod loader;

pub use loader::{find_config_file, load_settings, LoadedSettings, CONFIG_FILENAME};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_title() -> String {
    "folio".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_static_max_age() -> u64 {
    // one month
    30 * 24 * 60 * 60
}

fn default_body_limit() -> usize {
    1024 * 1024
}

fn default_themes_dir() -> PathBuf {
    PathBuf::from("themes")
}

fn default_theme_name() -> String {
    "default".to_string()
}

fn default_engines() -> Vec<String> {
    vec!["tera-strict".to_string(), "tera".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_article_dir() -> PathBuf {
    PathBuf::from("articles")
}

fn default_extensions_root() -> PathBuf {
    PathBuf::from("extensions")
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub extensions: ExtensionsConfig,
}

/// Public site metadata, handed to every template as `config`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct SiteConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            description: String::new(),
            author: String::new(),
            base_url: String::new(),
        }
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Include the error message in 500 responses.
    #[serde(default)]
    pub show_error_details: bool,

    /// `Cache-Control` max-age for static files, in seconds.
    #[serde(default = "default_static_max_age")]
    pub static_max_age_secs: u64,

    /// Largest request body buffered for form parsing.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            show_error_details: false,
            static_max_age_secs: default_static_max_age(),
            body_limit_bytes: default_body_limit(),
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    pub fn static_max_age(&self) -> Duration {
        Duration::from_secs(self.static_max_age_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ThemeConfig {
    /// Directory holding all themes.
    #[serde(default = "default_themes_dir")]
    pub dir: PathBuf,

    /// Active theme, a subdirectory of `dir`.
    #[serde(default = "default_theme_name")]
    pub name: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            dir: default_themes_dir(),
            name: default_theme_name(),
        }
    }
}

impl ThemeConfig {
    pub fn root(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root().join("templates")
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root().join("public")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TemplatesConfig {
    /// Engine identities in lookup precedence order.
    #[serde(default = "default_engines")]
    pub engines: Vec<String>,

    /// Recompile templates when their files change.
    #[serde(default = "default_true")]
    pub watch: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            engines: default_engines(),
            watch: true,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TemplatesConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContentConfig {
    #[serde(default = "default_article_dir")]
    pub article_dir: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            article_dir: default_article_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtensionsConfig {
    /// Directory scanned for extension subdirectories.
    #[serde(default = "default_extensions_root")]
    pub root: PathBuf,

    /// When set, only these extensions load. Absent means all discovered ones.
    pub enabled: Option<Vec<String>>,

    /// Per-extension tables merged over the manifest's `[config]`.
    #[serde(default)]
    pub config: BTreeMap<String, toml::Table>,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            root: default_extensions_root(),
            enabled: None,
            config: BTreeMap::new(),
        }
    }
}

impl ExtensionsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled
            .as_ref()
            .is_none_or(|names| names.iter().any(|n| n == name))
    }
}

impl Settings {
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            source: e,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolve relative directories against `base`.
    pub fn rooted_at(mut self, base: &Path) -> Self {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        anchor(&mut self.theme.dir);
        anchor(&mut self.content.article_dir);
        anchor(&mut self.extensions.root);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.templates.engines.is_empty() {
            return Err(ConfigError::Invalid(
                "templates.engines must name at least one engine".to_string(),
            ));
        }
        if self.theme.name.is_empty() {
            return Err(ConfigError::Invalid("theme.name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Site metadata as template data.
    pub fn site_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.site).unwrap_or_default()
    }
}
