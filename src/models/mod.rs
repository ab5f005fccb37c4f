pub mod message;
pub mod profile;

pub use message::{Message, MessageId, NewMessage, UserId};
pub use profile::{UserProfile, BOT_PEER_ID};
