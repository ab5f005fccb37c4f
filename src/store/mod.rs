//! Persistence seam for private messages.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::StoreError;
use crate::models::{Message, MessageId, NewMessage, UserId};

pub mod local;
pub mod postgres;

pub use local::LocalTranscriptStore;
pub use postgres::PostgresMessageStore;

/// Message persistence for one backing store: the remote storage service for
/// real peers, the device-local transcript for the bot peer.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Full transcript of the pair, ordered by created_at (ties by id).
    /// An empty conversation is an empty Vec, not an error.
    async fn list_by_pair(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError>;

    /// Persists a draft and returns the stored row with its authoritative id
    /// and created_at. A failure means the message was not sent.
    async fn append(&self, draft: NewMessage) -> Result<Message, StoreError>;

    /// Flips the read flag on each id. Idempotent: already-read ids are a
    /// no-op. Updates run in parallel, best effort; per-id failures are
    /// logged, never retried.
    async fn mark_read(&self, ids: &[MessageId]) -> Result<(), StoreError>;

    /// Unread message count per sender for the given receiver. One bulk
    /// aggregate, queried at session start.
    async fn count_unread_by_sender(&self, user: &str)
        -> Result<HashMap<UserId, i64>, StoreError>;

    /// Most recent message of each conversation the user participates in,
    /// keyed by peer id. Feeds the conversation-list ordering.
    async fn latest_by_peer(&self, user: &str) -> Result<HashMap<UserId, Message>, StoreError>;
}
