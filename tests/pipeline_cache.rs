mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use common::temp_pipeline_store;
use docloom::pipelines::{
    InvalidationMessage, InvalidationPublisher, LocalChannel, PipelineCache, Subscription,
    SubscriptionEvent,
};
use docloom::store::PipelineStore;

/// Scripted subscription: yields the queued events, then pends forever.
struct ScriptedSubscription {
    events: Vec<SubscriptionEvent>,
}

#[async_trait]
impl Subscription for ScriptedSubscription {
    async fn next_event(&mut self) -> SubscriptionEvent {
        if self.events.is_empty() {
            // Keep the listener parked on its suspension point.
            std::future::pending::<()>().await;
            unreachable!();
        }
        tokio::task::yield_now().await;
        self.events.remove(0)
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

#[tokio::test]
async fn writer_update_converges_on_the_other_process() {
    let (_guard, store) = temp_pipeline_store().await;
    let store: Arc<dyn PipelineStore> = Arc::new(store);
    let channel = LocalChannel::new();

    // "Process B": cold cache with a running listener.
    let cache_b = PipelineCache::new();
    cache_b.start_listener(Box::new(channel.subscribe()), Arc::clone(&store));

    // "Process A": owns the write, updates store + own cache, publishes.
    let cache_a = PipelineCache::new();
    let config = json!({"name": "Simple Chat", "steps": []});
    store.upsert_config("simple_chat", &config).await.unwrap();
    cache_a.add("simple_chat", config.clone());
    channel
        .publish(&InvalidationMessage::new("simple_chat"))
        .await
        .unwrap();

    settle().await;
    cache_b.stop_listener().await;

    assert!(cache_b.exists("simple_chat"));
    assert_eq!(cache_b.get("simple_chat").unwrap(), config);
    assert_eq!(cache_b.get("simple_chat").unwrap(), cache_a.get("simple_chat").unwrap());
}

#[tokio::test]
async fn malformed_payload_and_store_miss_never_crash_the_listener() {
    let (_guard, store) = temp_pipeline_store().await;
    let store: Arc<dyn PipelineStore> = Arc::new(store);
    let config = json!({"steps": [1, 2]});
    store.upsert_config("good", &config).await.unwrap();

    let cache = PipelineCache::new();
    cache.start_listener(
        Box::new(ScriptedSubscription {
            events: vec![
                SubscriptionEvent::Message("{ not json".to_string()),
                SubscriptionEvent::Message(json!({"no_pipeline_field": true}).to_string()),
                SubscriptionEvent::Message(json!({"pipeline": "absent"}).to_string()),
                SubscriptionEvent::Error("transient receive failure".to_string()),
                // A valid message after all the garbage proves the loop survived.
                SubscriptionEvent::Message(json!({"pipeline": "good"}).to_string()),
            ],
        }),
        Arc::clone(&store),
    );

    settle().await;
    cache.stop_listener().await;

    assert_eq!(cache.get("good").unwrap(), config);
    assert!(!cache.exists("absent"));
}

#[tokio::test]
async fn closed_channel_ends_the_listener_cleanly() {
    let (_guard, store) = temp_pipeline_store().await;
    let store: Arc<dyn PipelineStore> = Arc::new(store);

    let cache = PipelineCache::new();
    cache.add("kept", json!({"v": 1}));
    cache.start_listener(
        Box::new(ScriptedSubscription {
            events: vec![SubscriptionEvent::Closed],
        }),
        store,
    );

    settle().await;
    // The cache stays valid after the channel closed underneath the task.
    assert_eq!(cache.get("kept").unwrap(), json!({"v": 1}));
    cache.stop_listener().await;
}

#[tokio::test]
async fn stop_listener_cancels_the_parked_subscription() {
    let (_guard, store) = temp_pipeline_store().await;
    let store: Arc<dyn PipelineStore> = Arc::new(store);
    let channel = LocalChannel::new();

    let cache = PipelineCache::new();
    cache.start_listener(Box::new(channel.subscribe()), Arc::clone(&store));
    // Idempotent: a second start is a no-op.
    cache.start_listener(Box::new(channel.subscribe()), Arc::clone(&store));

    cache.stop_listener().await;

    // Messages published after shutdown are not applied.
    store
        .upsert_config("late", &json!({"v": 2}))
        .await
        .unwrap();
    channel
        .publish(&InvalidationMessage::new("late"))
        .await
        .unwrap();
    settle().await;
    assert!(!cache.exists("late"));
}
