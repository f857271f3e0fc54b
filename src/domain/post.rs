use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Copy of a post taken when it was shared into a conversation.
///
/// Counts are frozen at share time and never refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedPost {
    pub id: i64,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub content: String,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub likes_count: i64,
    pub comments_count: i64,
}
