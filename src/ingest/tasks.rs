//! Supervision for fire-and-forget ingestion tasks.
//!
//! URL ingestions triggered by inbound messages are not awaited by the
//! caller, so an unhandled panic would otherwise vanish along with the
//! user-facing failure broadcast. Every spawn is registered in a
//! [`tokio::task::JoinSet`]; finished tasks are reaped on the next spawn
//! and on [`IngestTasks::drain`], with panics logged rather than lost.

use std::future::Future;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Registered set of in-flight background ingestions.
#[derive(Debug, Default)]
pub struct IngestTasks {
    set: Mutex<JoinSet<()>>,
}

impl IngestTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a supervised background task.
    ///
    /// Already-finished siblings are reaped first so the set stays bounded
    /// by the number of genuinely in-flight ingestions.
    pub async fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.set.lock().await;
        while let Some(result) = set.try_join_next() {
            log_outcome(result);
        }
        set.spawn(future);
        debug!(in_flight = set.len(), "ingestion task spawned");
    }

    /// Number of tasks still registered (finished-but-unreaped included).
    pub async fn len(&self) -> usize {
        self.set.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.set.lock().await.is_empty()
    }

    /// Await every registered task, logging panics.
    ///
    /// Intended for graceful shutdown and tests; normal operation never
    /// waits on background ingestions.
    pub async fn drain(&self) {
        let mut set = self.set.lock().await;
        while let Some(result) = set.join_next().await {
            log_outcome(result);
        }
    }
}

fn log_outcome(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        if err.is_panic() {
            error!(error = %err, "background ingestion task panicked");
        } else if err.is_cancelled() {
            debug!("background ingestion task cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_waits_for_spawned_tasks() {
        let tasks = IngestTasks::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tasks
            .spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                let _ = tx.send(());
            })
            .await;

        tasks.drain().await;
        assert!(rx.await.is_ok());
        assert!(tasks.is_empty().await);
    }

    #[tokio::test]
    async fn panicking_task_is_reaped_not_propagated() {
        let tasks = IngestTasks::new();
        tasks.spawn(async { panic!("boom") }).await;
        tasks.drain().await;
        assert_eq!(tasks.len().await, 0);
    }
}
