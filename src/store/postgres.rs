use async_trait::async_trait;
use futures::future::join_all;
use redis::AsyncCommands;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::error::StoreError;
use crate::live::{INSERT_CHANNEL, UPDATE_CHANNEL};
use crate::models::{Message, MessageId, NewMessage, UserId};
use crate::store::MessageStore;

/// Message store over the relational storage service. After every
/// successful write the changed row is published on the change channels,
/// which is what feeds live subscriptions.
pub struct PostgresMessageStore {
    pool: PgPool,
    redis: redis::Client,
}

impl PostgresMessageStore {
    pub fn new(pool: PgPool, redis: redis::Client) -> Self {
        Self { pool, redis }
    }

    /// Best effort: a missed publication only delays the receiving side
    /// until its next fetch, so the write itself is never failed here.
    async fn publish_change(&self, channel: &str, row: &Message) {
        let payload = match serde_json::to_string(row) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(message_id = %row.id, error = %e, "change payload serialization failed");
                return;
            }
        };
        let mut conn = match self.redis.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "redis connection for change publish failed");
                return;
            }
        };
        if let Err(e) = conn.publish::<_, _, ()>(channel, payload).await {
            warn!(channel = %channel, message_id = %row.id, error = %e, "change publish failed");
        }
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn list_by_pair(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, content, created_at, read, is_bot
            FROM private_messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn append(&self, draft: NewMessage) -> Result<Message, StoreError> {
        let id = Uuid::new_v4().to_string();
        let row = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO private_messages (id, sender_id, receiver_id, content, is_bot)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, sender_id, receiver_id, content, created_at, read, is_bot
            "#,
        )
        .bind(&id)
        .bind(&draft.sender_id)
        .bind(&draft.receiver_id)
        .bind(&draft.content)
        .bind(draft.is_bot)
        .fetch_one(&self.pool)
        .await?;

        self.publish_change(INSERT_CHANNEL, &row).await;
        Ok(row)
    }

    async fn mark_read(&self, ids: &[MessageId]) -> Result<(), StoreError> {
        let updates = ids.iter().map(|id| {
            let pool = self.pool.clone();
            async move {
                let result = sqlx::query_as::<_, Message>(
                    r#"
                    UPDATE private_messages
                    SET read = TRUE
                    WHERE id = $1 AND read = FALSE
                    RETURNING id, sender_id, receiver_id, content, created_at, read, is_bot
                    "#,
                )
                .bind(id)
                .fetch_optional(&pool)
                .await;
                (id, result)
            }
        });

        for (id, result) in join_all(updates).await {
            match result {
                Ok(Some(row)) => self.publish_change(UPDATE_CHANNEL, &row).await,
                // Already read or unknown id: nothing to do.
                Ok(None) => {}
                Err(e) => warn!(message_id = %id, error = %e, "mark_read update failed"),
            }
        }

        Ok(())
    }

    async fn count_unread_by_sender(
        &self,
        user: &str,
    ) -> Result<HashMap<UserId, i64>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT sender_id, COUNT(*) AS unread
            FROM private_messages
            WHERE receiver_id = $1 AND read = FALSE
            GROUP BY sender_id
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let sender_id: String = row.get("sender_id");
            let unread: i64 = row.get("unread");
            counts.insert(sender_id, unread);
        }
        Ok(counts)
    }

    async fn latest_by_peer(&self, user: &str) -> Result<HashMap<UserId, Message>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (peer)
                   peer, id, sender_id, receiver_id, content, created_at, read, is_bot
            FROM (
                SELECT *,
                       CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS peer
                FROM private_messages
                WHERE sender_id = $1 OR receiver_id = $1
            ) m
            ORDER BY peer, created_at DESC, id DESC
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        let mut latest = HashMap::with_capacity(rows.len());
        for row in rows {
            let peer: String = row.get("peer");
            let message = Message {
                id: row.get("id"),
                sender_id: row.get("sender_id"),
                receiver_id: row.get("receiver_id"),
                content: row.get("content"),
                created_at: row.get("created_at"),
                read: row.get("read"),
                is_bot: row.get("is_bot"),
            };
            latest.insert(peer, message);
        }
        Ok(latest)
    }
}
