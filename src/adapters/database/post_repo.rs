use crate::adapters::database::DbPool;
use crate::adapters::database::records::SharedPostRecord;
use crate::domain::post::SharedPost;
use crate::error::Result;
use async_trait::async_trait;

/// Read-only lookup into the host application's posts.
#[async_trait]
pub trait PostStore: Send + Sync + std::fmt::Debug {
    /// Captures the post as it looks right now, or `None` if it does not exist.
    async fn snapshot(&self, post_id: i64) -> Result<Option<SharedPost>>;
}

#[derive(Clone, Debug)]
pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PostRepository {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn snapshot(&self, post_id: i64) -> Result<Option<SharedPost>> {
        let record = sqlx::query_as::<_, SharedPostRecord>(
            r"
            SELECT p.id,
                   u.name AS author_name,
                   u.avatar AS author_avatar,
                   p.content,
                   p.images,
                   p.videos,
                   p.created_at,
                   (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count,
                   (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count
            FROM posts p
            JOIN users u ON u.id = p.user_id
            WHERE p.id = $1
            ",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }
}
