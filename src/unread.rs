//! Session-scoped unread tracking across all peer conversations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::warn;

use crate::error::StoreError;
use crate::live::{MessageEvent, Subscription};
use crate::models::UserId;
use crate::store::MessageStore;

/// Longest content prefix carried by a new-message notification.
const PREVIEW_MAX_CHARS: usize = 30;

/// Payload for the UI's notification side effect (sound and toast stay in
/// the UI layer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadNotification {
    pub sender_id: UserId,
    pub preview: String,
}

#[derive(Default)]
struct UnreadState {
    counts: HashMap<UserId, i64>,
    active_peer: Option<UserId>,
}

/// Per-peer unread counts for one signed-in session. Seeded once from the
/// bulk aggregate, then kept current by the inbox subscription and by
/// conversation-read signals from open conversations. Only this type
/// mutates the map; controllers signal it.
pub struct UnreadAggregator {
    user_id: UserId,
    state: Mutex<UnreadState>,
}

impl UnreadAggregator {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            state: Mutex::new(UnreadState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, UnreadState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seeds the map from the store's bulk aggregate. Call once at session
    /// start, before the inbox subscription is attached.
    pub async fn seed(&self, store: &dyn MessageStore) -> Result<(), StoreError> {
        let counts = store.count_unread_by_sender(&self.user_id).await?;
        self.lock().counts = counts;
        Ok(())
    }

    /// Marks `peer` as the open conversation. Its count reads as 0 while
    /// active and incoming messages from it stop counting as unread.
    pub fn set_active_peer(&self, peer: &str) {
        self.lock().active_peer = Some(peer.to_string());
    }

    /// Inverse of [`set_active_peer`]; a no-op when another conversation
    /// already took over.
    pub fn conversation_closed(&self, peer: &str) {
        let mut state = self.lock();
        if state.active_peer.as_deref() == Some(peer) {
            state.active_peer = None;
        }
    }

    /// Signal from a conversation controller after it marked messages from
    /// `peer` as read.
    pub fn conversation_read(&self, peer: &str) {
        self.lock().counts.insert(peer.to_string(), 0);
    }

    /// Applies one inbox event. Returns a notification when the message
    /// arrived for the current user while another conversation was active.
    pub fn apply(&self, event: &MessageEvent) -> Option<UnreadNotification> {
        let message = match event {
            MessageEvent::Inserted(message) => message,
            MessageEvent::Updated(_) => return None,
        };
        if message.receiver_id != self.user_id {
            return None;
        }

        let mut state = self.lock();
        if state.active_peer.as_deref() == Some(message.sender_id.as_str()) {
            // The open conversation handles it and marks it read.
            return None;
        }
        *state.counts.entry(message.sender_id.clone()).or_insert(0) += 1;

        Some(UnreadNotification {
            sender_id: message.sender_id.clone(),
            preview: preview(&message.content),
        })
    }

    pub fn count_for(&self, peer: &str) -> i64 {
        let state = self.lock();
        if state.active_peer.as_deref() == Some(peer) {
            return 0;
        }
        state.counts.get(peer).copied().unwrap_or(0)
    }

    /// Snapshot of all per-peer counts, the active peer forced to 0.
    pub fn counts(&self) -> HashMap<UserId, i64> {
        let state = self.lock();
        let mut counts = state.counts.clone();
        if let Some(active) = &state.active_peer {
            counts.insert(active.clone(), 0);
        }
        counts
    }

    pub fn total(&self) -> i64 {
        self.counts().values().sum()
    }

    /// Pumps the session-wide inbox subscription in a background task and
    /// forwards notifications to the returned channel until either side
    /// closes.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut subscription: Subscription,
    ) -> UnboundedReceiver<UnreadNotification> {
        let (tx, rx) = unbounded_channel();
        let aggregator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(item) = subscription.next().await {
                match item {
                    Ok(event) => {
                        if let Some(notification) = aggregator.apply(&event) {
                            if tx.send(notification).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "inbox subscription failed");
                        return;
                    }
                }
            }
        });
        rx
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_MAX_CHARS {
        let head: String = content.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}
