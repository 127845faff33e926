#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use docloom::registry::{ChannelConnection, ConnectionId, SessionRegistry};
use docloom::store::{SqliteDocumentStore, SqlitePipelineStore};

/// Fresh SQLite document store backed by a temp file. The directory guard
/// must outlive the store.
pub async fn temp_document_store() -> (TempDir, SqliteDocumentStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("docloom-test.db").display()
    );
    let store = SqliteDocumentStore::connect(&url).await.expect("connect");
    (dir, store)
}

/// Fresh SQLite pipeline store backed by a temp file.
pub async fn temp_pipeline_store() -> (TempDir, SqlitePipelineStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("pipelines-test.db").display()
    );
    let store = SqlitePipelineStore::connect(&url).await.expect("connect");
    (dir, store)
}

/// Register a channel connection on `registry` and return its receiver.
pub fn watch_session(
    registry: &SessionRegistry,
    session_id: &str,
) -> (ConnectionId, UnboundedReceiver<Value>) {
    let (conn, rx) = ChannelConnection::pair();
    let id = registry.connect(Arc::new(conn), session_id);
    (id, rx)
}

/// Drain every event currently buffered on a watcher receiver.
pub fn drain_events(rx: &mut UnboundedReceiver<Value>) -> Vec<Value> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Progress events as `(step, status)` pairs, other event types skipped.
pub fn progress_steps(events: &[Value]) -> Vec<(String, String)> {
    events
        .iter()
        .filter(|event| event["type"] == "pipeline_progress")
        .map(|event| {
            (
                event["data"]["step"].as_str().unwrap_or_default().to_string(),
                event["data"]["status"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}
