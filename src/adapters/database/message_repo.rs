use crate::adapters::database::DbPool;
use crate::adapters::database::records::MessageRecord;
use crate::domain::message::{Message, NewMessage};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::types::Json;

/// The message ledger.
///
/// Implementations must make `mark_read_from` a single conditional update so
/// concurrent callers never transition the same message twice.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Appends a message with status `sent`.
    async fn insert(&self, message: NewMessage) -> Result<Message>;

    async fn find(&self, message_id: i64) -> Result<Option<Message>>;

    /// Every message between the two users, oldest first.
    async fn thread(&self, user_a: i64, user_b: i64) -> Result<Vec<Message>>;

    /// Flips `sender → receiver` messages that are not yet read and returns
    /// exactly the rows that changed, in id order.
    async fn mark_read_from(&self, sender_id: i64, receiver_id: i64) -> Result<Vec<Message>>;

    /// Deletes the message only if `sender_id` sent it.
    async fn delete_sent(&self, message_id: i64, sender_id: i64) -> Result<bool>;

    /// Distinct users `user_id` has exchanged messages with.
    async fn counterparts(&self, user_id: i64) -> Result<Vec<i64>>;

    /// Most recent message between the pair, highest id on ties.
    async fn latest_between(&self, user_a: i64, user_b: i64) -> Result<Option<Message>>;

    async fn count_unread_from(&self, sender_id: i64, receiver_id: i64) -> Result<i64>;
}

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, body, attachments, shared_post_id, shared_post, status, created_at";

#[derive(Clone, Debug)]
pub struct MessageRepository {
    pool: DbPool,
}

impl MessageRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    #[tracing::instrument(level = "debug", skip(self, message), fields(receiver_id = message.receiver_id))]
    async fn insert(&self, message: NewMessage) -> Result<Message> {
        let result = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            INSERT INTO messages (sender_id, receiver_id, body, attachments, shared_post_id, shared_post, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'sent')
            RETURNING {MESSAGE_COLUMNS}
            "
        ))
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(message.body)
        .bind(Json(message.attachments))
        .bind(message.shared_post_id)
        .bind(message.shared_post.map(Json))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23503") => {
                // Foreign key violation: the receiver vanished between lookup and insert
                Err(AppError::UnknownRecipient)
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find(&self, message_id: i64) -> Result<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"))
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn thread(&self, user_a: i64, user_b: i64) -> Result<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY created_at ASC, id ASC
            "
        ))
        .bind(user_a)
        .bind(user_b)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn mark_read_from(&self, sender_id: i64, receiver_id: i64) -> Result<Vec<Message>> {
        let mut records = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            UPDATE messages
            SET status = 'read'
            WHERE sender_id = $1
              AND receiver_id = $2
              AND status <> 'read'
            RETURNING {MESSAGE_COLUMNS}
            "
        ))
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_all(&self.pool)
        .await?;

        // RETURNING carries no ordering guarantee
        records.sort_by_key(|r| r.id);
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_sent(&self, message_id: i64, sender_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1 AND sender_id = $2")
            .bind(message_id)
            .bind(sender_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn counterparts(&self, user_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r"
            SELECT DISTINCT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS partner_id
            FROM messages
            WHERE (sender_id = $1 OR receiver_id = $1)
              AND sender_id <> receiver_id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().filter(|id| *id != user_id).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn latest_between(&self, user_a: i64, user_b: i64) -> Result<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "
        ))
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn count_unread_from(&self, sender_id: i64, receiver_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE sender_id = $1 AND receiver_id = $2 AND status <> 'read'",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
