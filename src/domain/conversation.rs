use crate::domain::message::Message;
use crate::domain::user::UserProfile;
use serde::Serialize;
use time::OffsetDateTime;

pub const SHARED_POST_PLACEHOLDER: &str = "Shared a post";

/// One row of a user's inbox, derived from the ledger on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub user: UserProfile,
    pub last_message_id: i64,
    pub last_message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_message_at: OffsetDateTime,
    pub is_read: bool,
    pub unread_count: i64,
}

impl ConversationSummary {
    /// Builds the summary for `me` from the latest message of the pair.
    #[must_use]
    pub fn from_last_message(me: i64, user: UserProfile, last: &Message, unread_count: i64) -> Self {
        let last_message = if last.has_shared_post() { SHARED_POST_PLACEHOLDER.to_string() } else { last.body.clone() };

        Self {
            user,
            last_message_id: last.id,
            last_message,
            last_message_at: last.created_at,
            is_read: last.sender_id == me && last.status.is_read(),
            unread_count,
        }
    }
}
