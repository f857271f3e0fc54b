use crate::domain::message::{Attachment, Message, MessageStatus};
use crate::domain::post::SharedPost;
use sqlx::types::Json;
use std::str::FromStr;
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: i64,
    pub(crate) sender_id: i64,
    pub(crate) receiver_id: i64,
    pub(crate) body: String,
    pub(crate) attachments: Json<Vec<Attachment>>,
    pub(crate) shared_post_id: Option<i64>,
    pub(crate) shared_post: Option<Json<SharedPost>>,
    pub(crate) status: String,
    pub(crate) created_at: OffsetDateTime,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            sender_id: record.sender_id,
            receiver_id: record.receiver_id,
            body: record.body,
            attachments: record.attachments.0,
            shared_post_id: record.shared_post_id,
            shared_post: record.shared_post.map(|Json(post)| post),
            // Anything unrecognised is unread; it can still be transitioned.
            status: MessageStatus::from_str(&record.status).unwrap_or(MessageStatus::Sent),
            created_at: record.created_at,
        }
    }
}
