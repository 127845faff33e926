//! Pipeline configuration registry with pub/sub invalidation.
//!
//! Every process keeps the full set of named pipeline configurations in
//! memory ([`PipelineCache`]); nothing expires on its own. A process that
//! mutates a configuration updates its own cache synchronously and
//! publishes an invalidation message; every other process's background
//! listener re-reads the named entry from the backing store. Correctness
//! therefore hinges on writers reliably publishing after every mutation.

pub mod cache;
pub mod invalidation;
#[cfg(feature = "redis-invalidation")]
pub mod redis;

use thiserror::Error;

pub use cache::PipelineCache;
pub use invalidation::{
    InvalidationMessage, InvalidationPublisher, LocalChannel, Subscription, SubscriptionEvent,
};
#[cfg(feature = "redis-invalidation")]
pub use redis::{RedisInvalidationChannel, RedisPublisher, RedisSubscription};

/// Errors surfaced by the cache and its invalidation plumbing.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A miss is a hard error by design: an uncached name indicates a
    /// programming or deployment error, not a cold cache.
    #[error("pipeline '{0}' not found in registry")]
    NotFound(String),

    #[error("invalid invalidation payload: {0}")]
    Payload(String),

    #[error("invalidation channel error: {0}")]
    Channel(String),
}
