//! The per-session connection registry and its broadcast path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::connection::{ClientConnection, ConnectionId};
use super::envelope::{EVENT_PIPELINE_PROGRESS, EVENT_URL_DETECTED, Envelope, PipelineStatus};

type SessionMap = FxHashMap<String, Vec<(ConnectionId, Arc<dyn ClientConnection>)>>;

/// Tracks live client connections per session and fans events out to them.
///
/// Sessions are created lazily on first connect and removed once their last
/// connection goes away, so the map never accumulates empty entries.
/// Mutation happens under the lock; broadcast iterates over a snapshot taken
/// under the lock and released before any delivery, so connects and
/// disconnects during a broadcast never invalidate the iteration.
pub struct SessionRegistry {
    sessions: Mutex<SessionMap>,
    next_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a connection under a session and return its registry id.
    pub fn connect(
        &self,
        connection: Arc<dyn ClientConnection>,
        session_id: &str,
    ) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut sessions = self.sessions.lock();
        let entries = sessions.entry(session_id.to_string()).or_default();
        entries.push((id, connection));
        info!(
            session = session_id,
            connection = %id,
            total = entries.len(),
            "connection registered"
        );
        id
    }

    /// Remove a connection; drops the session entry when it becomes empty.
    pub fn disconnect(&self, id: ConnectionId, session_id: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(entries) = sessions.get_mut(session_id) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                sessions.remove(session_id);
            }
            info!(session = session_id, connection = %id, "connection removed");
        }
    }

    /// Number of live connections for one session.
    pub fn connection_count(&self, session_id: &str) -> usize {
        self.sessions
            .lock()
            .get(session_id)
            .map_or(0, |entries| entries.len())
    }

    /// Number of live connections across all sessions.
    pub fn total_connections(&self) -> usize {
        self.sessions
            .lock()
            .values()
            .map(|entries| entries.len())
            .sum()
    }

    /// Broadcast an event to every connection registered for `session_id`.
    ///
    /// A session with no connections is a silent no-op; there is no
    /// buffering or replay. One failed delivery never aborts the others:
    /// failures are collected during the pass and the dead connections are
    /// pruned afterwards.
    pub async fn broadcast(&self, session_id: &str, event_type: &str, data: Value) {
        let snapshot: Vec<(ConnectionId, Arc<dyn ClientConnection>)> = {
            let sessions = self.sessions.lock();
            match sessions.get(session_id) {
                Some(entries) => entries.clone(),
                None => {
                    debug!(session = session_id, "no active connections");
                    return;
                }
            }
        };

        let payload = Envelope::new(event_type, session_id, data).to_json_value();

        let mut dead = Vec::new();
        for (id, connection) in &snapshot {
            if let Err(err) = connection.send_json(&payload).await {
                warn!(session = session_id, connection = %id, error = %err, "send failed");
                dead.push(*id);
            }
        }

        for id in dead {
            self.disconnect(id, session_id);
        }
    }

    /// Broadcast one pipeline stage progress event.
    pub async fn broadcast_pipeline_event(
        &self,
        session_id: &str,
        step: &str,
        status: PipelineStatus,
        message: &str,
        metadata: Option<Value>,
    ) {
        self.broadcast(
            session_id,
            EVENT_PIPELINE_PROGRESS,
            json!({
                "step": step,
                "status": status.as_str(),
                "message": message,
                "metadata": metadata.unwrap_or_else(|| json!({})),
                "session_id": session_id,
            }),
        )
        .await;
        debug!(session = session_id, step, status = %status, "pipeline event broadcast");
    }

    /// Broadcast that a URL was detected in an inbound message.
    pub async fn broadcast_url_detected(&self, session_id: &str, url: &str, domain: &str) {
        self.broadcast(
            session_id,
            EVENT_URL_DETECTED,
            json!({
                "url": url,
                "domain": domain,
                "message": format!("Found URL: {url}"),
            }),
        )
        .await;
        info!(session = session_id, url, "url detected and broadcast");
    }

    /// Broadcast a document lifecycle event (upload progress, inclusion
    /// toggles, removal) under a caller-chosen event type.
    pub async fn broadcast_document_event(
        &self,
        session_id: &str,
        event_type: &str,
        document_id: &str,
        filename: &str,
        message: &str,
        metadata: Option<Value>,
    ) {
        self.broadcast(
            session_id,
            event_type,
            json!({
                "document_id": document_id,
                "filename": filename,
                "message": message,
                "metadata": metadata.unwrap_or_else(|| json!({})),
            }),
        )
        .await;
    }
}
