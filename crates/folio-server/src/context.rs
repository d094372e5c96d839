//! The application context: everything a request needs, built once at startup.

use std::sync::Arc;

use folio_render::{
    EngineSet, NegotiationBus, RenderEngine, TemplateCache, TemplateWatcher, WarmupReport,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::content::{ContentStore, FsContentStore};
use crate::controllers::Controllers;
use crate::error::BootstrapError;
use crate::extensions;
use crate::pipeline::{CoreRoutes, MountTable, StaticFiles};
use crate::plugins::{ExtensionCatalog, ExtensionDescriptor, ExtensionServices, PluginRegistry};

#[derive(Debug)]
pub struct AppContext {
    pub settings: Settings,
    pub templates: Arc<TemplateCache>,
    pub renderer: RenderEngine,
    pub negotiation: Arc<NegotiationBus>,
    pub controllers: Controllers,
    pub(crate) core_routes: CoreRoutes,
    pub(crate) mounts: MountTable,
    pub(crate) theme_files: StaticFiles,
    extensions: Vec<ExtensionDescriptor>,
    site: Value,
    warmup: Mutex<Option<JoinHandle<WarmupReport>>>,
    watcher: Option<TemplateWatcher>,
}

impl AppContext {
    /// Build a context with the filesystem content store and the built-in extensions.
    pub async fn bootstrap(settings: Settings) -> Result<Arc<Self>, BootstrapError> {
        let store = Arc::new(FsContentStore::new(settings.content.article_dir.clone()));
        Self::with_parts(settings, store, &extensions::builtin()).await
    }

    /// Build a context from explicit collaborators.
    ///
    /// Template compilation is started here but not awaited; see
    /// [`wait_for_templates`](Self::wait_for_templates).
    pub async fn with_parts(
        settings: Settings,
        store: Arc<dyn ContentStore>,
        catalog: &ExtensionCatalog,
    ) -> Result<Arc<Self>, BootstrapError> {
        let engines = EngineSet::from_ids(settings.templates.engines.as_slice())?;
        let templates = Arc::new(TemplateCache::new(engines));
        let renderer = RenderEngine::new(Arc::clone(&templates));
        let negotiation = Arc::new(NegotiationBus::new());
        let controllers = Controllers::new(store);

        let mut sources = templates.scan(&settings.theme.templates_dir())?;
        tracing::info!(
            theme = %settings.theme.name,
            templates = sources.len(),
            "Scanned theme templates"
        );

        let services = ExtensionServices {
            settings: &settings,
            negotiation: &negotiation,
            controllers: &controllers,
        };
        let registry = PluginRegistry::discover(
            &settings.extensions.root,
            settings.extensions.enabled.as_deref(),
            catalog,
            services,
        );
        let extensions = registry.into_extensions();

        let mut mounts = MountTable::new();
        for descriptor in &extensions {
            mounts.mount(descriptor);
            for path in &descriptor.templates {
                templates.register_source(path);
                sources.push(path.clone());
            }
        }

        let watch = settings.templates.watch;
        let warmup = templates.warm_up(sources, watch);
        let watcher = watch.then(|| {
            TemplateWatcher::spawn(Arc::clone(&templates), settings.templates.poll_interval())
        });

        let core_routes = CoreRoutes::new(controllers.clone())?;
        let theme_files = StaticFiles::new(
            settings.theme.public_dir(),
            settings.server.static_max_age(),
        );
        let site = settings.site_value();

        tracing::info!(
            extensions = extensions.len(),
            listeners = negotiation.len(),
            "Application context ready"
        );

        Ok(Arc::new(Self {
            settings,
            templates,
            renderer,
            negotiation,
            controllers,
            core_routes,
            mounts,
            theme_files,
            extensions,
            site,
            warmup: Mutex::new(Some(warmup)),
            watcher,
        }))
    }

    /// Wait for the startup template compilation. Returns `None` once it has
    /// already been awaited.
    pub async fn wait_for_templates(&self) -> Option<WarmupReport> {
        let handle = self.warmup.lock().await.take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Template warm-up task failed");
                None
            }
        }
    }

    /// Loaded extensions, in discovery order.
    pub fn extensions(&self) -> &[ExtensionDescriptor] {
        &self.extensions
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    /// Public site settings, as handed to templates under `config`.
    pub fn site(&self) -> &Value {
        &self.site
    }

    pub fn is_watching_templates(&self) -> bool {
        self.watcher.as_ref().is_some_and(TemplateWatcher::is_running)
    }
}
