//! Typed event streams over the storage service's change notifications.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::error::SubscriptionError;
use crate::models::{Message, UserId};

pub mod redis_feed;

pub use redis_feed::RedisChangeFeed;

/// Pub/sub channels carrying row changes of the message table.
pub const INSERT_CHANNEL: &str = "private_messages:insert";
pub const UPDATE_CHANNEL: &str = "private_messages:update";
pub const CHANNEL_PATTERN: &str = "private_messages:*";

/// One change notification from the message table.
#[derive(Debug, Clone)]
pub enum MessageEvent {
    Inserted(Message),
    Updated(Message),
}

impl MessageEvent {
    pub fn message(&self) -> &Message {
        match self {
            MessageEvent::Inserted(m) | MessageEvent::Updated(m) => m,
        }
    }
}

/// Scope of one subscription.
#[derive(Debug, Clone)]
pub enum EventScope {
    /// Messages exchanged between the two users, in either direction.
    Conversation { a: UserId, b: UserId },
    /// Messages addressed to the given user, any sender.
    Inbox { receiver: UserId },
}

impl EventScope {
    pub fn matches(&self, message: &Message) -> bool {
        match self {
            EventScope::Conversation { a, b } => message.involves(a, b),
            EventScope::Inbox { receiver } => message.receiver_id == *receiver,
        }
    }
}

pub type FeedItem = Result<MessageEvent, SubscriptionError>;

/// Live event stream for one subscription. Dropping it tears the
/// subscription down, exactly once.
pub struct Subscription {
    events: UnboundedReceiver<FeedItem>,
    _guard: SubscriptionGuard,
}

impl Subscription {
    pub fn new(events: UnboundedReceiver<FeedItem>, guard: SubscriptionGuard) -> Self {
        Self {
            events,
            _guard: guard,
        }
    }

    /// Next event, or None once the channel has ended.
    pub async fn next(&mut self) -> Option<FeedItem> {
        self.events.recv().await
    }
}

/// Teardown handle held by a [`Subscription`]. Aborts the transport task
/// and/or runs a close callback when dropped.
pub struct SubscriptionGuard {
    task: Option<JoinHandle<()>>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    pub fn for_task(task: JoinHandle<()>) -> Self {
        Self {
            task: Some(task),
            on_close: None,
        }
    }

    pub fn with_callback(on_close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            task: None,
            on_close: Some(Box::new(on_close)),
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

/// Change-notification seam. One call opens one stable subscription; the UI
/// must hold it for the lifetime of the open conversation and drop it on
/// close or peer change. A failed channel is reported in-stream and never
/// reconnected internally; reconnection is a fresh subscribe call.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, scope: EventScope) -> Result<Subscription, SubscriptionError>;
}
