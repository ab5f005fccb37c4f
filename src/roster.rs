//! Conversation-list assembly: peer profiles merged with each pair's most
//! recent message.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::StoreError;
use crate::models::{Message, UserId, UserProfile};
use crate::store::MessageStore;

/// One row of the conversation list.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub profile: UserProfile,
    pub last_message: Option<Message>,
}

impl RosterEntry {
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_message.as_ref().map(|m| m.created_at)
    }
}

/// Orders profiles for display: peers with history first, most recent
/// first; the bot entry leads the no-history group. The profile list comes
/// from the identity provider; this crate only contributes the message data.
pub fn build_roster(
    peers: Vec<UserProfile>,
    mut latest: HashMap<UserId, Message>,
) -> Vec<RosterEntry> {
    let mut entries = Vec::with_capacity(peers.len() + 1);
    entries.push(RosterEntry {
        profile: UserProfile::bot(),
        last_message: None,
    });
    for profile in peers {
        let last_message = latest.remove(&profile.id);
        entries.push(RosterEntry {
            profile,
            last_message,
        });
    }

    entries.sort_by(|a, b| match (&a.last_message, &b.last_message) {
        (Some(x), Some(y)) => y.created_at.cmp(&x.created_at),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        // Stable sort keeps the bot at the head of the no-history group.
        (None, None) => std::cmp::Ordering::Equal,
    });
    entries
}

/// [`build_roster`] fed from the store's latest-message query.
pub async fn load_roster(
    store: &dyn MessageStore,
    user_id: &str,
    peers: Vec<UserProfile>,
) -> Result<Vec<RosterEntry>, StoreError> {
    let latest = store.latest_by_peer(user_id).await?;
    Ok(build_roster(peers, latest))
}
