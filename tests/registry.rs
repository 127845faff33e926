mod common;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use common::{drain_events, watch_session};
use docloom::registry::{ClientConnection, PipelineStatus, SessionRegistry};

/// Connection that always fails to send, counting the attempts.
struct FailingConnection {
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl ClientConnection for FailingConnection {
    async fn send_json(&self, _payload: &Value) -> io::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
    }
}

#[tokio::test]
async fn broadcast_reaches_every_connection_for_the_session() {
    let registry = SessionRegistry::new();
    let (_, mut rx_a) = watch_session(&registry, "s1");
    let (_, mut rx_b) = watch_session(&registry, "s1");
    let (_, mut rx_other) = watch_session(&registry, "s2");

    registry.broadcast("s1", "ping", json!({"n": 1})).await;

    for rx in [&mut rx_a, &mut rx_b] {
        let events = drain_events(rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "ping");
        assert_eq!(events[0]["session_id"], "s1");
        assert_eq!(events[0]["data"]["n"], 1);
        assert!(events[0]["timestamp"].is_string());
    }

    // The sibling session saw nothing.
    assert!(drain_events(&mut rx_other).is_empty());
}

#[tokio::test]
async fn broadcast_to_empty_session_is_a_silent_noop() {
    let registry = SessionRegistry::new();
    registry.broadcast("nobody-home", "ping", json!({})).await;
}

#[tokio::test]
async fn failed_connection_is_pruned_without_aborting_siblings() {
    let registry = SessionRegistry::new();
    let (_, mut rx_a) = watch_session(&registry, "s1");

    let attempts = Arc::new(AtomicUsize::new(0));
    let failing = Arc::new(FailingConnection {
        attempts: Arc::clone(&attempts),
    });
    registry.connect(failing, "s1");

    let (_, mut rx_b) = watch_session(&registry, "s1");
    assert_eq!(registry.connection_count("s1"), 3);

    registry.broadcast("s1", "ping", json!({})).await;

    // Exactly two successful deliveries; the dead connection was tried
    // once and removed afterwards.
    assert_eq!(drain_events(&mut rx_a).len(), 1);
    assert_eq!(drain_events(&mut rx_b).len(), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(registry.connection_count("s1"), 2);

    // The next broadcast no longer touches the pruned connection.
    registry.broadcast("s1", "ping", json!({})).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disconnecting_last_connection_drops_the_session() {
    let registry = SessionRegistry::new();
    let (id, _rx) = watch_session(&registry, "s1");
    assert_eq!(registry.total_connections(), 1);

    registry.disconnect(id, "s1");
    assert_eq!(registry.connection_count("s1"), 0);
    assert_eq!(registry.total_connections(), 0);
}

#[tokio::test]
async fn pipeline_event_wrapper_builds_the_standard_payload() {
    let registry = SessionRegistry::new();
    let (_, mut rx) = watch_session(&registry, "s1");

    registry
        .broadcast_pipeline_event(
            "s1",
            "fetch_content",
            PipelineStatus::Started,
            "Fetching content...",
            None,
        )
        .await;

    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 1);
    let data = &events[0]["data"];
    assert_eq!(events[0]["type"], "pipeline_progress");
    assert_eq!(data["step"], "fetch_content");
    assert_eq!(data["status"], "started");
    assert_eq!(data["message"], "Fetching content...");
    assert_eq!(data["metadata"], json!({}));
    assert_eq!(data["session_id"], "s1");
}

#[tokio::test]
async fn url_detected_wrapper_carries_url_and_domain() {
    let registry = SessionRegistry::new();
    let (_, mut rx) = watch_session(&registry, "s1");

    registry
        .broadcast_url_detected("s1", "https://example.com/a", "example.com")
        .await;

    let events = drain_events(&mut rx);
    assert_eq!(events[0]["type"], "url_detected");
    assert_eq!(events[0]["data"]["url"], "https://example.com/a");
    assert_eq!(events[0]["data"]["domain"], "example.com");
}

#[tokio::test]
async fn document_event_uses_caller_chosen_type() {
    let registry = SessionRegistry::new();
    let (_, mut rx) = watch_session(&registry, "s1");

    registry
        .broadcast_document_event(
            "s1",
            "document_added",
            "doc-1",
            "notes.txt",
            "Document added",
            None,
        )
        .await;

    let events = drain_events(&mut rx);
    assert_eq!(events[0]["type"], "document_added");
    assert_eq!(events[0]["data"]["document_id"], "doc-1");
    assert_eq!(events[0]["data"]["filename"], "notes.txt");
}
