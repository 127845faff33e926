//! The in-memory pipeline registry and its invalidation listener.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task;
use tracing::{debug, error, info, warn};

use super::CacheError;
use super::invalidation::{InvalidationMessage, Subscription, SubscriptionEvent};
use crate::store::PipelineStore;

/// In-memory registry of named pipeline configurations.
///
/// This is the single source of truth for pipeline definitions during
/// runtime, not a performance layer: entries are bulk-loaded at startup,
/// replaced whole by [`add`](Self::add)/[`remove`](Self::remove) when this
/// process mutates the backing store, and refreshed by the invalidation
/// listener when another process does. Entries never expire on their own.
pub struct PipelineCache {
    entries: Arc<Mutex<FxHashMap<String, Value>>>,
    listener: Mutex<Option<ListenerState>>,
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(FxHashMap::default())),
            listener: Mutex::new(None),
        }
    }

    /// Bulk-load every `*.json` file in `dir`, keyed by file stem.
    ///
    /// A missing directory is a warning, not a fatal error; a malformed
    /// file is logged and skipped without aborting the load. Returns the
    /// number of entries loaded.
    pub async fn load_all(&self, dir: &Path) -> usize {
        let mut read_dir = match tokio::fs::read_dir(dir).await {
            Ok(read_dir) => read_dir,
            Err(_) => {
                warn!(dir = %dir.display(), "pipelines directory not found");
                return 0;
            }
        };

        let mut loaded = 0;
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                    Ok(config) => {
                        self.entries.lock().insert(name.to_string(), config);
                        loaded += 1;
                        info!(pipeline = name, "loaded pipeline");
                    }
                    Err(err) => {
                        error!(path = %path.display(), error = %err, "failed to parse pipeline");
                    }
                },
                Err(err) => {
                    error!(path = %path.display(), error = %err, "failed to read pipeline");
                }
            }
        }

        info!(count = loaded, "pipeline cache initialized");
        loaded
    }

    /// Get a configuration by name.
    ///
    /// There is no fetch-through on a miss: an uncached name is a hard
    /// error, because every known pipeline was loaded at startup or synced
    /// through `add`/the listener.
    pub fn get(&self, name: &str) -> Result<Value, CacheError> {
        self.entries
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(name.to_string()))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Add or replace an entry. Called by the component that owns writes
    /// against the backing store, so its own process never observes a gap
    /// between the store and this view.
    pub fn add(&self, name: impl Into<String>, config: Value) {
        let name = name.into();
        self.entries.lock().insert(name.clone(), config);
        info!(pipeline = %name, "pipeline added to registry");
    }

    /// Remove an entry. Returns `false` when the name was absent.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.entries.lock().remove(name).is_some();
        if removed {
            info!(pipeline = name, "pipeline removed from registry");
        }
        removed
    }

    /// Start the background invalidation listener.
    ///
    /// Each received message names a pipeline; the listener re-reads that
    /// entry from `store` and replaces the in-memory copy. Malformed
    /// payloads and failed lookups are logged and skipped, never crashing
    /// the loop. Idempotent: calling again while a listener runs has no
    /// effect.
    pub fn start_listener(
        &self,
        mut subscription: Box<dyn Subscription>,
        store: Arc<dyn PipelineStore>,
    ) {
        let mut guard = self.listener.lock();
        if guard.is_some() {
            return;
        }

        let entries = Arc::clone(&self.entries);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    event = subscription.next_event() => match event {
                        SubscriptionEvent::Message(payload) => {
                            refresh_entry(&entries, store.as_ref(), &payload).await;
                        }
                        SubscriptionEvent::Closed => {
                            warn!("invalidation channel closed; listener exiting");
                            break;
                        }
                        SubscriptionEvent::Error(err) => {
                            warn!(error = %err, "invalidation receive error; continuing");
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
        info!("invalidation listener started");
    }

    /// Stop the background listener.
    ///
    /// Cancellation is cooperative: a message already being handled
    /// completes before the task exits, leaving the cache valid (possibly
    /// slightly stale, never corrupt).
    pub async fn stop_listener(&self) {
        let state = self.listener.lock().take();
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
            info!("invalidation listener stopped");
        }
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        if let Some(state) = self.listener.lock().take() {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}

/// Handle one invalidation payload: parse, re-read, replace.
///
/// Every failure here is log-and-skip; a transient refresh failure
/// self-heals on the next message rather than taking down the listener.
async fn refresh_entry(
    entries: &Arc<Mutex<FxHashMap<String, Value>>>,
    store: &dyn PipelineStore,
    payload: &str,
) {
    let message: InvalidationMessage = match serde_json::from_str(payload) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "ignoring malformed invalidation payload");
            return;
        }
    };

    match store.fetch_config(&message.pipeline).await {
        Ok(Some(config)) => {
            entries.lock().insert(message.pipeline.clone(), config);
            debug!(pipeline = %message.pipeline, "pipeline refreshed from store");
        }
        Ok(None) => {
            warn!(
                pipeline = %message.pipeline,
                "invalidated pipeline not found in store; skipping"
            );
        }
        Err(err) => {
            warn!(
                pipeline = %message.pipeline,
                error = %err,
                "store lookup failed during refresh; skipping"
            );
        }
    }
}
