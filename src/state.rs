use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use crate::bot::{BotClient, BotResponder};
use crate::config::Config;
use crate::error::{ChatError, ChatResult, SubscriptionError};
use crate::filter::{ContentFilter, WordListFilter};
use crate::live::{ChangeFeed, EventScope, RedisChangeFeed};
use crate::session::Session;
use crate::store::{LocalTranscriptStore, MessageStore, PostgresMessageStore};
use crate::unread::{UnreadAggregator, UnreadNotification};

/// Session-lifetime handles shared by every open conversation. Built once at
/// login, dropped at logout.
#[derive(Clone)]
pub struct ChatContext {
    pub session: Session,
    /// Store backing real-peer conversations.
    pub store: Arc<dyn MessageStore>,
    /// Store backing the bot conversation.
    pub bot_store: Arc<dyn MessageStore>,
    pub feed: Arc<dyn ChangeFeed>,
    pub filter: Arc<dyn ContentFilter>,
    pub bot: Arc<dyn BotClient>,
    pub unread: Arc<UnreadAggregator>,
}

impl ChatContext {
    /// Wires the production backends from configuration and seeds the unread
    /// map. A failed seed only logs: the map fills in as events arrive.
    pub async fn connect(config: &Config, session: Session) -> ChatResult<Self> {
        let pool = crate::db::init_pool(&config.database_url)
            .await
            .map_err(|e| ChatError::Config(format!("database pool: {e}")))?;
        let redis = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| ChatError::Config(format!("redis client: {e}")))?;

        let store: Arc<dyn MessageStore> =
            Arc::new(PostgresMessageStore::new(pool, redis.clone()));
        let bot_store: Arc<dyn MessageStore> =
            Arc::new(LocalTranscriptStore::new(&config.bot_transcript_path));
        let feed: Arc<dyn ChangeFeed> = Arc::new(RedisChangeFeed::new(redis));
        let filter: Arc<dyn ContentFilter> =
            Arc::new(WordListFilter::new(config.blocked_words.clone()));
        let bot: Arc<dyn BotClient> = Arc::new(BotResponder::new(config.bot.clone())?);

        let unread = Arc::new(UnreadAggregator::new(session.user_id()));
        if let Err(e) = unread.seed(store.as_ref()).await {
            warn!(error = %e, "unread seed failed");
        }

        Ok(Self {
            session,
            store,
            bot_store,
            feed,
            filter,
            bot,
            unread,
        })
    }

    /// Opens the one session-wide inbox subscription and hands its
    /// notifications to the caller. Call once per session.
    pub async fn watch_inbox(
        &self,
    ) -> Result<UnboundedReceiver<UnreadNotification>, SubscriptionError> {
        let subscription = self
            .feed
            .subscribe(EventScope::Inbox {
                receiver: self.session.user_id().to_string(),
            })
            .await?;
        Ok(self.unread.spawn_listener(subscription))
    }
}
