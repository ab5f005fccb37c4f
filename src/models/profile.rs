use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::message::UserId;

/// Well-known id of the synthetic bot peer. The bot has no server-side row;
/// its conversation lives only in the local transcript.
pub const BOT_PEER_ID: &str = "bot-assistant";

const BOT_AVATAR_URL: &str = "https://api.dicebear.com/9.x/bottts/svg?seed=Boovie";

static BOT_PROFILE: Lazy<UserProfile> = Lazy::new(|| UserProfile {
    id: BOT_PEER_ID.into(),
    display_name: Some("Books & Movies Assistant".into()),
    email: None,
    avatar_url: Some(BOT_AVATAR_URL.into()),
    is_bot: true,
});

/// Read-only view of a chat participant, supplied by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

impl UserProfile {
    pub fn bot() -> Self {
        BOT_PROFILE.clone()
    }

    /// Name shown in conversation lists: display name, then email, then id.
    pub fn display_label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}
