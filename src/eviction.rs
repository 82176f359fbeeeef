//! Periodic sweep that removes completed objects past their `maxAge`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::registry::Registry;
use crate::translator::Translator;

const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Owns the background eviction task. Dropping a `Server` without calling
/// [`EvictionLoop::stop`] leaves the task running against dangling `Arc`
/// clones until the process exits; callers should always stop it.
pub struct EvictionLoop {
    stop: Mutex<Option<oneshot::Sender<oneshot::Sender<()>>>>,
}

impl EvictionLoop {
    pub fn start(registry: Arc<Registry>, translator: Arc<Translator>, content_path: PathBuf) -> Arc<Self> {
        Self::start_with_interval(registry, translator, content_path, DEFAULT_INTERVAL)
    }

    pub fn start_with_interval(
        registry: Arc<Registry>,
        translator: Arc<Translator>,
        content_path: PathBuf,
        interval: Duration,
    ) -> Arc<Self> {
        let (stop_tx, mut stop_rx) = oneshot::channel::<oneshot::Sender<()>>();
        let eviction_loop = Arc::new(Self {
            stop: Mutex::new(Some(stop_tx)),
        });

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep(&registry, &translator, &content_path).await;
                    }
                    ack = &mut stop_rx => {
                        if let Ok(ack_tx) = ack {
                            let _ = ack_tx.send(());
                        }
                        break;
                    }
                }
            }
        });

        eviction_loop
    }

    /// Signals the sweep task to stop and waits for its acknowledgement.
    pub async fn stop(&self) {
        let sender = self.stop.lock().take();
        if let Some(sender) = sender {
            let (ack_tx, ack_rx) = oneshot::channel();
            if sender.send(ack_tx).is_ok() {
                let _ = ack_rx.await;
            }
        }
    }
}

async fn sweep(registry: &Registry, translator: &Translator, content_path: &Path) {
    let now = Instant::now();
    let expired: Vec<_> = registry
        .snapshot()
        .into_iter()
        .filter(|(_, object)| object.is_expired(now))
        .collect();

    for (name, object) in expired {
        registry.remove(&name);
        translator.remove_entry(&name);

        if object.is_on_disk() {
            if let Err(error) = object.remove_from_disk(content_path).await {
                tracing::error!(name = %name, %error, "failed to unlink evicted object");
            }
        }

        tracing::debug!(name = %name, "{}", crate::signals::ids::OBJECT_EVICTED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use http::HeaderMap;

    #[tokio::test]
    async fn sweep_removes_expired_objects_from_registry_and_translator() {
        let registry = Arc::new(Registry::new());
        let translator = Arc::new(Translator::new());

        let object = Object::new("live/clip/1", HeaderMap::new(), 0);
        object.close();
        registry.insert("live/clip/1".into(), object);
        translator.add_new_entry("live/clip/1", Some(0));

        tokio::time::sleep(Duration::from_millis(5)).await;

        let dir = tempfile::tempdir().unwrap();
        sweep(&registry, &translator, dir.path()).await;

        assert!(registry.lookup("live/clip/1").is_none());
        let (_, translated) = translator.get_translated("live/clip/EDGE");
        assert!(!translated);
    }

    #[tokio::test]
    async fn sweep_leaves_open_objects_alone() {
        let registry = Arc::new(Registry::new());
        let translator = Arc::new(Translator::new());

        let object = Object::new("live.ts", HeaderMap::new(), 0);
        registry.insert("live.ts".into(), object);

        let dir = tempfile::tempdir().unwrap();
        sweep(&registry, &translator, dir.path()).await;

        assert!(registry.lookup("live.ts").is_some());
    }

    #[tokio::test]
    async fn stop_acknowledges_before_returning() {
        let registry = Arc::new(Registry::new());
        let translator = Arc::new(Translator::new());
        let dir = tempfile::tempdir().unwrap();

        let eviction = EvictionLoop::start_with_interval(
            registry,
            translator,
            dir.path().to_path_buf(),
            Duration::from_secs(60),
        );
        eviction.stop().await;
    }
}
