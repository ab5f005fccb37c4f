use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::fs;

use crate::error::StoreError;
use crate::models::{Message, MessageId, NewMessage, UserId};
use crate::store::MessageStore;

/// Device-local transcript for the bot conversation: one JSON document,
/// rewritten atomically on every turn. The bot peer has no server-side rows,
/// so this store never talks to the network.
///
/// Synthetic ids are `LOCAL_<stamp>` for the user's messages and
/// `BOT_<stamp>` for replies, with stamps strictly increasing per process.
pub struct LocalTranscriptStore {
    path: PathBuf,
    clock: AtomicI64,
}

impl LocalTranscriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clock: AtomicI64::new(0),
        }
    }

    async fn load(&self) -> Result<Vec<Message>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, transcript: &[Message]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(transcript)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Millisecond stamp, bumped past the previous one when two turns land
    /// in the same millisecond.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = match self.clock.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(last.max(now - 1) + 1)
        }) {
            Ok(prev) | Err(prev) => prev,
        };
        prev.max(now - 1) + 1
    }
}

#[async_trait]
impl MessageStore for LocalTranscriptStore {
    async fn list_by_pair(&self, _a: &str, _b: &str) -> Result<Vec<Message>, StoreError> {
        // One global bot history; the pair is always the fixed bot conversation.
        self.load().await
    }

    async fn append(&self, draft: NewMessage) -> Result<Message, StoreError> {
        let mut transcript = self.load().await?;
        let stamp = self.next_stamp();
        let prefix = if draft.is_bot { "BOT_" } else { "LOCAL_" };
        let created_at = DateTime::<Utc>::from_timestamp_millis(stamp)
            .unwrap_or_else(Utc::now);
        let message = Message {
            id: format!("{prefix}{stamp}"),
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            content: draft.content,
            created_at,
            // Local turns are visible immediately; there is no unread state.
            read: true,
            is_bot: draft.is_bot,
        };
        transcript.push(message.clone());
        self.persist(&transcript).await?;
        Ok(message)
    }

    async fn mark_read(&self, ids: &[MessageId]) -> Result<(), StoreError> {
        let mut transcript = self.load().await?;
        let mut changed = false;
        for message in transcript.iter_mut() {
            if !message.read && ids.contains(&message.id) {
                message.read = true;
                changed = true;
            }
        }
        if changed {
            self.persist(&transcript).await?;
        }
        Ok(())
    }

    async fn count_unread_by_sender(
        &self,
        _user: &str,
    ) -> Result<HashMap<UserId, i64>, StoreError> {
        Ok(HashMap::new())
    }

    async fn latest_by_peer(&self, _user: &str) -> Result<HashMap<UserId, Message>, StoreError> {
        Ok(HashMap::new())
    }
}
