pub mod bot;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod filter;
pub mod live;
pub mod logging;
pub mod models;
pub mod roster;
pub mod session;
pub mod state;
pub mod store;
pub mod unread;

pub use conversation::ConversationController;
pub use error::{ChatError, ChatResult};
pub use state::ChatContext;
