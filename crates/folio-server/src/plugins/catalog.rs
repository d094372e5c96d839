//! Compiled-in extension factories and what they receive and return.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use axum::response::Response;
use folio_render::NegotiationBus;
use serde_json::Value;

use super::manifest::ManifestError;
use crate::config::Settings;
use crate::controllers::Controllers;
use crate::error::PipelineError;
use crate::pipeline::{Handler, SharedHandler};

/// Builds an extension's handlers from its context. Runs once at startup.
pub type ExtensionFactory = fn(&ExtensionContext<'_>) -> Result<ExtensionUnit, ExtensionError>;

/// Errors that exclude an extension from the mount set.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("invalid manifest: {}", .0.join("; "))]
    InvalidManifest(Vec<String>),

    #[error("no factory is registered under this name")]
    UnknownExtension,

    #[error("missing configuration value '{key}'")]
    MissingConfig { key: String },

    #[error("extension provides no main handler")]
    EmptyStack,

    #[error("extension factory panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Services shared by every extension. Built once by the application context.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionServices<'a> {
    pub settings: &'a Settings,
    pub negotiation: &'a NegotiationBus,
    pub controllers: &'a Controllers,
}

type Responder = Box<dyn Fn(&Value) -> Response + Send + Sync>;

/// A negotiation listener held back until its extension has loaded.
struct StagedListener {
    token: String,
    responder: Responder,
}

impl fmt::Debug for StagedListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedListener")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// What a factory sees: its own identity and config, plus the shared services.
#[derive(Debug)]
pub struct ExtensionContext<'a> {
    name: &'a str,
    dir: &'a Path,
    description: &'a str,
    config: toml::Table,
    services: ExtensionServices<'a>,
    templates: Mutex<Vec<PathBuf>>,
    listeners: Mutex<Vec<StagedListener>>,
}

impl<'a> ExtensionContext<'a> {
    pub fn new(
        name: &'a str,
        dir: &'a Path,
        description: &'a str,
        config: toml::Table,
        services: ExtensionServices<'a>,
    ) -> Self {
        Self {
            name,
            dir,
            description,
            config,
            services,
            templates: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn dir(&self) -> &Path {
        self.dir
    }

    pub fn description(&self) -> &str {
        self.description
    }

    /// Merged manifest and site configuration for this extension.
    pub fn config(&self) -> &toml::Table {
        &self.config
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(toml::Value::as_str)
    }

    /// A string config value the extension cannot run without.
    pub fn require_str(&self, key: &str) -> Result<&str, ExtensionError> {
        self.config_str(key)
            .ok_or_else(|| ExtensionError::MissingConfig {
                key: key.to_string(),
            })
    }

    pub fn settings(&self) -> &Settings {
        self.services.settings
    }

    pub fn controllers(&self) -> &Controllers {
        self.services.controllers
    }

    /// Register a template file shipped with the extension. It is compiled
    /// and watched alongside the theme templates.
    pub fn add_template(&self, relative: impl AsRef<Path>) {
        let path = self.dir.join(relative);
        self.templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path);
    }

    /// Answer requests whose representation contains `token` with `responder`.
    /// Listeners reach the shared negotiation bus only if the extension loads.
    pub fn on_negotiate<F>(&self, token: impl Into<String>, responder: F)
    where
        F: Fn(&Value) -> Response + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StagedListener {
                token: token.into(),
                responder: Box::new(responder),
            });
    }

    /// Hand staged listeners to the negotiation bus, in registration order.
    pub(crate) fn commit_listeners(&self) {
        let staged = std::mem::take(
            &mut *self.listeners.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for listener in staged {
            self.services
                .negotiation
                .on(listener.token, listener.responder);
        }
    }

    pub(crate) fn into_templates(self) -> Vec<PathBuf> {
        self.templates
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handlers an extension contributes, each list run in order.
#[derive(Debug, Default, Clone)]
pub struct ExtensionUnit {
    pub before: Vec<SharedHandler>,
    pub main: Vec<SharedHandler>,
    pub after: Vec<SharedHandler>,
}

impl ExtensionUnit {
    pub fn new(main: impl Handler + 'static) -> Self {
        Self::default().with_main(main)
    }

    pub fn with_main(mut self, handler: impl Handler + 'static) -> Self {
        self.main.push(std::sync::Arc::new(handler));
        self
    }

    pub fn with_before(mut self, handler: impl Handler + 'static) -> Self {
        self.before.push(std::sync::Arc::new(handler));
        self
    }

    pub fn with_after(mut self, handler: impl Handler + 'static) -> Self {
        self.after.push(std::sync::Arc::new(handler));
        self
    }
}

/// Factories by extension name.
#[derive(Debug, Clone, Default)]
pub struct ExtensionCatalog {
    factories: BTreeMap<String, ExtensionFactory>,
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous one.
    pub fn register(mut self, name: impl Into<String>, factory: ExtensionFactory) -> Self {
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn get(&self, name: &str) -> Option<ExtensionFactory> {
        self.factories.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
