//! Tera-backed template engines and the precedence list the cache resolves keys against.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tera::{Context, Tera};

use crate::error::TemplateError;

/// A compiled, independently invokable template.
pub trait CompiledTemplate: Send + Sync + fmt::Debug {
    /// Render the template against a JSON object.
    fn render(&self, data: &Value) -> Result<String, TemplateError>;
}

/// A template language able to compile sources with the file extensions it claims.
pub trait TemplateEngine: Send + Sync + fmt::Debug {
    /// Stable identifier used in configuration (`[templates] engines`).
    fn id(&self) -> &'static str;

    /// File extensions (without the dot) this engine compiles. The first one is
    /// used when substituting a key's suffix during fallback resolution.
    fn extensions(&self) -> &[&'static str];

    /// Compile `source` into a renderer registered under `key`.
    fn compile(&self, key: &str, source: &str) -> Result<Arc<dyn CompiledTemplate>, TemplateError>;

    fn claims(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

/// Tera template engine.
///
/// `standard` compiles the theme's `.html`/`.xml` files and escapes output only for
/// those suffixes (Tera's defaults). `strict` compiles `.tera` overrides and escapes
/// every expression whatever the key's suffix.
#[derive(Debug, Clone)]
pub struct TeraEngine {
    id: &'static str,
    extensions: &'static [&'static str],
    escape_all: bool,
}

impl TeraEngine {
    pub const STANDARD_ID: &'static str = "tera";
    pub const STRICT_ID: &'static str = "tera-strict";

    pub fn standard() -> Self {
        Self {
            id: Self::STANDARD_ID,
            extensions: &["html", "xml"],
            escape_all: false,
        }
    }

    pub fn strict() -> Self {
        Self {
            id: Self::STRICT_ID,
            extensions: &["tera"],
            escape_all: true,
        }
    }
}

impl TemplateEngine for TeraEngine {
    fn id(&self) -> &'static str {
        self.id
    }

    fn extensions(&self) -> &[&'static str] {
        self.extensions
    }

    fn compile(&self, key: &str, source: &str) -> Result<Arc<dyn CompiledTemplate>, TemplateError> {
        let mut tera = Tera::default();
        if self.escape_all {
            // An empty suffix matches every template name.
            tera.autoescape_on(vec![""]);
        }
        tera.add_raw_template(key, source)
            .map_err(|e| TemplateError::Compile {
                key: key.to_string(),
                source: e,
            })?;

        Ok(Arc::new(TeraTemplate {
            key: key.to_string(),
            tera,
        }))
    }
}

#[derive(Debug)]
struct TeraTemplate {
    key: String,
    tera: Tera,
}

impl CompiledTemplate for TeraTemplate {
    fn render(&self, data: &Value) -> Result<String, TemplateError> {
        let context = Context::from_serialize(data).map_err(|e| TemplateError::Render {
            key: self.key.clone(),
            source: e,
        })?;
        self.tera
            .render(&self.key, &context)
            .map_err(|e| TemplateError::Render {
                key: self.key.clone(),
                source: e,
            })
    }
}

/// Engines in precedence order: earlier engines win when several could serve a key.
#[derive(Debug, Clone)]
pub struct EngineSet {
    engines: Vec<Arc<dyn TemplateEngine>>,
}

impl Default for EngineSet {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(TeraEngine::strict()),
            Arc::new(TeraEngine::standard()),
        ])
    }
}

impl EngineSet {
    pub fn new(engines: Vec<Arc<dyn TemplateEngine>>) -> Self {
        Self { engines }
    }

    /// Build a precedence list from configured engine identifiers.
    pub fn from_ids<S: AsRef<str>>(ids: &[S]) -> Result<Self, TemplateError> {
        let mut engines: Vec<Arc<dyn TemplateEngine>> = Vec::with_capacity(ids.len());
        for id in ids {
            let engine: Arc<dyn TemplateEngine> = match id.as_ref() {
                TeraEngine::STANDARD_ID => Arc::new(TeraEngine::standard()),
                TeraEngine::STRICT_ID => Arc::new(TeraEngine::strict()),
                other => return Err(TemplateError::UnknownEngine(other.to_string())),
            };
            engines.push(engine);
        }
        Ok(Self { engines })
    }

    pub fn engines(&self) -> &[Arc<dyn TemplateEngine>] {
        &self.engines
    }

    /// The highest-precedence engine claiming the file's extension.
    pub fn engine_for_path(&self, path: &Path) -> Option<&Arc<dyn TemplateEngine>> {
        let ext = path.extension()?.to_str()?;
        self.engine_for_extension(ext)
    }

    pub fn engine_for_extension(&self, ext: &str) -> Option<&Arc<dyn TemplateEngine>> {
        self.engines.iter().find(|e| e.claims(ext))
    }

    /// Keys to try, in order, when resolving `key`.
    ///
    /// `tmpl.index.html` becomes `["tmpl.index.tera", "tmpl.index.html"]` with the
    /// default precedence. A key without a suffix resolves only to itself.
    pub fn candidates(&self, key: &str) -> Vec<String> {
        let Some((base, ext)) = key.rsplit_once('.') else {
            return vec![key.to_string()];
        };

        let mut keys: Vec<String> = Vec::with_capacity(self.engines.len() + 1);
        for engine in &self.engines {
            let candidate = if engine.claims(ext) {
                key.to_string()
            } else {
                match engine.extensions().first() {
                    Some(own) => format!("{base}.{own}"),
                    None => continue,
                }
            };
            if !keys.contains(&candidate) {
                keys.push(candidate);
            }
        }
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
        keys
    }
}
