use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ids are plain strings: server rows carry uuids, the local bot transcript
/// carries synthetic `LOCAL_*` / `BOT_*` ids.
pub type MessageId = String;
pub type UserId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    #[serde(default)]
    pub is_bot: bool,
}

impl Message {
    /// True when the message belongs to the conversation between `a` and `b`,
    /// in either direction.
    pub fn involves(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    /// Transcript order: created_at ascending, ties broken by id.
    pub fn ordering_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, self.id.as_str())
    }
}

/// A message draft. The store assigns id and created_at.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub is_bot: bool,
}
