//! The server composition root: a single owned value replacing the
//! original implementation's package-level singletons (see DESIGN.md).

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Cli;
use crate::cors;
use crate::error::StartupError;
use crate::eviction::EvictionLoop;
use crate::registry::Registry;
use crate::translator::Translator;
use crate::waiters::WaiterRegistry;

/// Everything a request needs to be served, built once at startup and
/// shared behind an `Arc` across every connection task.
pub struct Server {
    pub registry: Arc<Registry>,
    pub translator: Arc<Translator>,
    pub waiters: Option<Arc<WaiterRegistry>>,
    pub cors: cors::Config,
    pub content_path: PathBuf,
    pub ram_only: bool,
    pub url_translator_enabled: bool,
    eviction: Option<Arc<EvictionLoop>>,
}

impl Server {
    pub async fn build(cli: &Cli) -> Result<Arc<Self>, StartupError> {
        let cors = match &cli.cors_config {
            Some(path) => cors::Config::load(path).await?,
            None => cors::Config::default(),
        };

        let registry = Arc::new(Registry::new());
        let translator = Arc::new(Translator::new());

        let waiters = (!cli.no_wait_for_data).then(WaiterRegistry::start);

        let eviction = (!cli.no_ttl_cleanup).then(|| {
            EvictionLoop::start(
                registry.clone(),
                translator.clone(),
                cli.content_path.clone(),
            )
        });

        Ok(Arc::new(Self {
            registry,
            translator,
            waiters,
            cors,
            content_path: cli.content_path.clone(),
            ram_only: cli.ram_only,
            url_translator_enabled: !cli.no_url_translator,
            eviction,
        }))
    }

    /// Stops background tasks and cancels outstanding waiters. Does not
    /// wait for in-flight connections to drain; the caller's listener loop
    /// owns that.
    pub async fn shutdown(&self) {
        if let Some(eviction) = &self.eviction {
            eviction.stop().await;
        }
        if let Some(waiters) = &self.waiters {
            waiters.close().await;
        }
        tracing::info!(target: "relaycache", "{}", crate::signals::ids::SERVER_STOPPED);
    }
}
