use crate::domain::post::SharedPost;
use sqlx::types::Json;
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct SharedPostRecord {
    pub(crate) id: i64,
    pub(crate) author_name: String,
    pub(crate) author_avatar: Option<String>,
    pub(crate) content: String,
    pub(crate) images: Option<Json<Vec<String>>>,
    pub(crate) videos: Option<Json<Vec<String>>>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) likes_count: i64,
    pub(crate) comments_count: i64,
}

impl From<SharedPostRecord> for SharedPost {
    fn from(record: SharedPostRecord) -> Self {
        Self {
            id: record.id,
            user_name: record.author_name,
            user_avatar: record.author_avatar,
            content: record.content,
            images: record.images.map(|Json(v)| v).unwrap_or_default(),
            videos: record.videos.map(|Json(v)| v).unwrap_or_default(),
            created_at: record.created_at,
            likes_count: record.likes_count,
            comments_count: record.comments_count,
        }
    }
}
