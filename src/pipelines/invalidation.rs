//! The invalidation channel seam and its in-process implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CacheError;

/// Message published whenever a pipeline configuration is mutated.
///
/// Unknown fields (trace ids and the like) are carried by publishers but
/// ignored on receipt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvalidationMessage {
    pub pipeline: String,
}

impl InvalidationMessage {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
        }
    }
}

/// What a subscription yields next.
///
/// Modeled as a tagged variant instead of an unbounded blocking read so the
/// listener loop can react to closure and transient errors distinctly, and
/// shutdown stays deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// Raw payload of one published message.
    Message(String),
    /// The channel will produce no further messages.
    Closed,
    /// A transient receive failure; the subscription is still live.
    Error(String),
}

/// Receiving side of the invalidation channel.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next channel event. This is the listener's only
    /// unbounded suspension point and must stay cancellation-safe.
    async fn next_event(&mut self) -> SubscriptionEvent;
}

/// Publishing side of the invalidation channel.
#[async_trait]
pub trait InvalidationPublisher: Send + Sync {
    async fn publish(&self, message: &InvalidationMessage) -> Result<(), CacheError>;
}

/// In-process fan-out channel for single-process deployments and tests.
///
/// Each [`LocalChannel::subscribe`] call gets its own queue; publishing
/// delivers to every live subscriber and silently drops the dead ones.
#[derive(Default)]
pub struct LocalChannel {
    subscribers: Mutex<Vec<flume::Sender<String>>>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> LocalSubscription {
        let (tx, rx) = flume::unbounded();
        self.subscribers.lock().push(tx);
        LocalSubscription { rx }
    }
}

#[async_trait]
impl InvalidationPublisher for LocalChannel {
    async fn publish(&self, message: &InvalidationMessage) -> Result<(), CacheError> {
        let payload =
            serde_json::to_string(message).map_err(|err| CacheError::Payload(err.to_string()))?;
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(payload.clone()).is_ok());
        debug!(
            pipeline = %message.pipeline,
            subscribers = subscribers.len(),
            "invalidation published"
        );
        Ok(())
    }
}

/// One subscriber's view of a [`LocalChannel`].
pub struct LocalSubscription {
    rx: flume::Receiver<String>,
}

#[async_trait]
impl Subscription for LocalSubscription {
    async fn next_event(&mut self) -> SubscriptionEvent {
        match self.rx.recv_async().await {
            Ok(payload) => SubscriptionEvent::Message(payload),
            Err(_) => SubscriptionEvent::Closed,
        }
    }
}
