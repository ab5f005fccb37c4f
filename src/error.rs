use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

/// Failures of the message persistence layer, remote or local.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("local transcript i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt local transcript: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Failures of the live change-notification channel.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("subscribe failed: {0}")]
    Connect(String),

    #[error("live channel dropped: {0}")]
    Dropped(String),
}

/// Failures of the bot round trip. Each variant is surfaced to the UI with a
/// human-readable description.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("bot request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("bot endpoint returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("bot reply was empty")]
    EmptyReply,

    #[error("malformed bot response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("configuration error: {0}")]
    Config(String),

    /// Initial transcript load failed. Terminal for that conversation open;
    /// re-opening the conversation retries.
    #[error("failed to load conversation: {0}")]
    Fetch(#[source] StoreError),

    /// Message not persisted. The caller's input stays untouched for retry.
    #[error("failed to send message: {0}")]
    Send(#[source] StoreError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error(transparent)]
    Bot(#[from] BotError),
}
