use async_trait::async_trait;
use futures_util::StreamExt;
use redis::Client;
use tokio::sync::mpsc::unbounded_channel;
use tracing::warn;

use crate::error::SubscriptionError;
use crate::live::{
    ChangeFeed, EventScope, MessageEvent, Subscription, SubscriptionGuard, CHANNEL_PATTERN,
    INSERT_CHANNEL, UPDATE_CHANNEL,
};
use crate::models::Message;

/// Change feed over Redis pub/sub. The storage layer publishes each changed
/// row on the message-change channels; every subscription gets a dedicated
/// connection that lives until its guard is dropped.
pub struct RedisChangeFeed {
    client: Client,
}

impl RedisChangeFeed {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_url(url: &str) -> Result<Self, SubscriptionError> {
        let client = Client::open(url).map_err(|e| SubscriptionError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChangeFeed for RedisChangeFeed {
    async fn subscribe(&self, scope: EventScope) -> Result<Subscription, SubscriptionError> {
        // Pub/sub needs a dedicated connection, not the multiplexed one.
        let conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| SubscriptionError::Connect(e.to_string()))?;
        let mut pubsub = conn.into_pubsub();
        pubsub
            .psubscribe(CHANNEL_PATTERN)
            .await
            .map_err(|e| SubscriptionError::Connect(e.to_string()))?;

        let (tx, rx) = unbounded_channel();
        let task = tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let channel: String = msg.get_channel_name().into();
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        let _ = tx.send(Err(SubscriptionError::Dropped(e.to_string())));
                        return;
                    }
                };
                let row: Message = match serde_json::from_str(&payload) {
                    Ok(row) => row,
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "skipping malformed change payload");
                        continue;
                    }
                };
                let event = match channel.as_str() {
                    INSERT_CHANNEL => MessageEvent::Inserted(row),
                    UPDATE_CHANNEL => MessageEvent::Updated(row),
                    _ => continue,
                };
                if !scope.matches(event.message()) {
                    continue;
                }
                if tx.send(Ok(event)).is_err() {
                    // Receiver dropped: the subscription was closed.
                    return;
                }
            }
            let _ = tx.send(Err(SubscriptionError::Dropped("change stream ended".into())));
        });

        Ok(Subscription::new(rx, SubscriptionGuard::for_task(task)))
    }
}
