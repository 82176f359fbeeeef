//! The waiting-request registry: lets a GET for a not-yet-existing name
//! park briefly and be woken by the POST that creates it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::HeaderMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

const DEFAULT_WAIT: Duration = Duration::from_millis(1000);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    DataArrived,
    Cancelled,
}

struct Waiter {
    id: Uuid,
    expires_at: Instant,
    sender: Option<oneshot::Sender<WaitOutcome>>,
}

#[derive(Default)]
struct Inner {
    waiters: RwLock<HashMap<String, Vec<Waiter>>>,
}

/// Holds GETs for names with no object yet and wakes them on a matching
/// POST or on expiry. One background task sweeps expired waiters.
pub struct WaiterRegistry {
    inner: Inner,
    stop: Notify,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl WaiterRegistry {
    /// Starts the registry along with its periodic expiry sweeper.
    pub fn start() -> Arc<Self> {
        Self::start_with_interval(DEFAULT_SWEEP_INTERVAL)
    }

    pub fn start_with_interval(sweep_interval: Duration) -> Arc<Self> {
        let registry = Arc::new(Self {
            inner: Inner::default(),
            stop: Notify::new(),
            sweep_task: Mutex::new(None),
        });

        let worker = registry.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => worker.sweep_once(),
                    _ = worker.stop.notified() => break,
                }
            }
        });
        *registry.sweep_task.lock() = Some(handle);
        registry
    }

    /// Parses the `Expires: in=<seconds>` header, defaulting to 1000 ms on
    /// absence or malformed input.
    fn parse_timeout(headers: &HeaderMap) -> Duration {
        headers
            .get(http::header::EXPIRES)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("in="))
            .and_then(|secs| secs.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_WAIT)
    }

    /// Parks until a POST for `name` arrives or the `Expires: in=N` timeout
    /// (default 1000 ms) elapses. Returns whether data arrived and how long
    /// the caller actually waited.
    pub async fn await_data(&self, name: &str, headers: &HeaderMap) -> (bool, Duration) {
        let timeout = Self::parse_timeout(headers);
        let (tx, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        let expires_at = Instant::now() + timeout;

        {
            let mut waiters = self.inner.waiters.write();
            waiters.entry(name.to_string()).or_default().push(Waiter {
                id,
                expires_at,
                sender: Some(tx),
            });
        }

        let started = Instant::now();
        let outcome = rx.await.unwrap_or(WaitOutcome::Cancelled);
        self.remove_waiter(name, id);

        (outcome == WaitOutcome::DataArrived, started.elapsed())
    }

    fn remove_waiter(&self, name: &str, id: Uuid) {
        let mut waiters = self.inner.waiters.write();
        if let Some(list) = waiters.get_mut(name) {
            list.retain(|w| w.id != id);
            if list.is_empty() {
                waiters.remove(name);
            }
        }
    }

    /// Wakes every non-expired waiter on `name` with `dataArrived`. Called
    /// once a POST has inserted the object into the registry. A waiter past
    /// its `expires_at` is left for the sweep to cancel instead, per the
    /// documented "non-expired" contract.
    pub fn notify(&self, name: &str) {
        let now = Instant::now();
        let mut waiters = self.inner.waiters.write();
        if let Some(list) = waiters.remove(name) {
            let (satisfied, expired): (Vec<_>, Vec<_>) =
                list.into_iter().partition(|w| w.expires_at >= now);

            for mut waiter in satisfied {
                if let Some(sender) = waiter.sender.take() {
                    let _ = sender.send(WaitOutcome::DataArrived);
                    tracing::debug!(name, "{}", crate::signals::ids::WAITER_SATISFIED);
                }
            }
            if !expired.is_empty() {
                waiters.insert(name.to_string(), expired);
            }
        }
    }

    fn sweep_once(&self) {
        let now = Instant::now();
        let mut waiters = self.inner.waiters.write();
        waiters.retain(|name, list| {
            list.retain_mut(|waiter| {
                if waiter.expires_at < now {
                    if let Some(sender) = waiter.sender.take() {
                        let _ = sender.send(WaitOutcome::Cancelled);
                        tracing::debug!(name, "{}", crate::signals::ids::WAITER_EXPIRED);
                    }
                    false
                } else {
                    true
                }
            });
            !list.is_empty()
        });
    }

    /// Cancels every outstanding waiter, then stops the sweep task and
    /// waits for it to exit.
    pub async fn close(&self) {
        {
            let mut waiters = self.inner.waiters.write();
            for (_, list) in waiters.drain() {
                for mut waiter in list {
                    if let Some(sender) = waiter.sender.take() {
                        let _ = sender.send(WaitOutcome::Cancelled);
                    }
                }
            }
        }

        self.stop.notify_one();
        if let Some(handle) = self.sweep_task.lock().take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_wakes_a_waiter_with_data_arrived() {
        let registry = WaiterRegistry::start();
        let waiting = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.await_data("clip.ts", &HeaderMap::new()).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        registry.notify("clip.ts");

        let (found, _waited) = waiting.await.unwrap();
        assert!(found);
        registry.close().await;
    }

    #[tokio::test]
    async fn expiry_sweep_cancels_unserved_waiters() {
        let registry = WaiterRegistry::start_with_interval(Duration::from_millis(10));
        let mut headers = HeaderMap::new();
        headers.insert(http::header::EXPIRES, "in=0".parse().unwrap());

        let (found, _waited) = registry.await_data("never.ts", &headers).await;
        assert!(!found);
        registry.close().await;
    }

    #[test]
    fn parse_timeout_defaults_on_malformed_header() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::EXPIRES, "garbage".parse().unwrap());
        assert_eq!(WaiterRegistry::parse_timeout(&headers), DEFAULT_WAIT);

        assert_eq!(
            WaiterRegistry::parse_timeout(&HeaderMap::new()),
            DEFAULT_WAIT
        );
    }
}
