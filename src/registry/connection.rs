//! The transport seam between the registry and live client connections.

use std::fmt;
use std::io::{self, Result as IoResult};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Registry-assigned identity for one live connection.
///
/// Ids are unique per registry for its lifetime, so a connection can be
/// removed without comparing trait objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Abstraction over one live bidirectional client channel.
///
/// A failed send marks the connection dead; the registry prunes it after
/// the broadcast pass that observed the failure.
#[async_trait]
pub trait ClientConnection: Send + Sync {
    /// Deliver one JSON payload to the client.
    async fn send_json(&self, payload: &Value) -> IoResult<()>;
}

/// Channel-based connection for async consumers (WebSocket writer tasks,
/// SSE endpoints, tests).
///
/// Payloads are forwarded to a tokio mpsc channel without blocking; a
/// dropped receiver turns into a send failure, which is how the registry
/// learns the client went away.
pub struct ChannelConnection {
    tx: mpsc::UnboundedSender<Value>,
}

impl ChannelConnection {
    pub fn new(tx: mpsc::UnboundedSender<Value>) -> Self {
        Self { tx }
    }

    /// Convenience constructor returning the paired receiver.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl ClientConnection for ChannelConnection {
    async fn send_json(&self, payload: &Value) -> IoResult<()> {
        self.tx
            .send(payload.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel receiver dropped"))
    }
}
