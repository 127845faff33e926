//! Redis pub/sub adapter for cross-process invalidation.
//!
//! Enabled with the `redis-invalidation` feature. Each server process
//! subscribes to one channel; any process that mutates a pipeline
//! publishes the invalidation message there.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use super::CacheError;
use super::invalidation::{
    InvalidationMessage, InvalidationPublisher, Subscription, SubscriptionEvent,
};

/// Factory for Redis-backed subscriptions and publishers on one channel.
#[derive(Clone)]
pub struct RedisInvalidationChannel {
    client: redis::Client,
    channel: String,
}

impl RedisInvalidationChannel {
    pub fn new(redis_url: &str, channel: impl Into<String>) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(redis_url).map_err(|err| CacheError::Channel(err.to_string()))?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }

    /// Open a dedicated pub/sub connection and subscribe to the channel.
    pub async fn subscribe(&self) -> Result<RedisSubscription, CacheError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|err| CacheError::Channel(err.to_string()))?;
        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(|err| CacheError::Channel(err.to_string()))?;
        debug!(channel = %self.channel, "subscribed to invalidation channel");
        Ok(RedisSubscription {
            messages: Box::pin(pubsub.into_on_message()),
        })
    }

    pub fn publisher(&self) -> RedisPublisher {
        RedisPublisher {
            client: self.client.clone(),
            channel: self.channel.clone(),
        }
    }
}

/// Live subscription over a dedicated Redis pub/sub connection.
pub struct RedisSubscription {
    messages: Pin<Box<dyn Stream<Item = redis::Msg> + Send>>,
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn next_event(&mut self) -> SubscriptionEvent {
        match self.messages.next().await {
            Some(msg) => match msg.get_payload::<String>() {
                Ok(payload) => SubscriptionEvent::Message(payload),
                Err(err) => SubscriptionEvent::Error(err.to_string()),
            },
            None => SubscriptionEvent::Closed,
        }
    }
}

/// Publishes invalidation messages to the shared channel.
#[derive(Clone)]
pub struct RedisPublisher {
    client: redis::Client,
    channel: String,
}

#[async_trait]
impl InvalidationPublisher for RedisPublisher {
    async fn publish(&self, message: &InvalidationMessage) -> Result<(), CacheError> {
        let payload =
            serde_json::to_string(message).map_err(|err| CacheError::Payload(err.to_string()))?;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| CacheError::Channel(err.to_string()))?;
        redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|err| CacheError::Channel(err.to_string()))?;
        Ok(())
    }
}
