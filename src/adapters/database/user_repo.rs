use crate::adapters::database::DbPool;
use crate::adapters::database::records::UserProfileRecord;
use crate::domain::user::UserProfile;
use crate::error::Result;
use async_trait::async_trait;

/// Read-only view of the host application's user table.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    async fn exists(&self, user_id: i64) -> Result<bool>;

    /// Profiles for the given ids; unknown ids are skipped.
    async fn profiles(&self, user_ids: &[i64]) -> Result<Vec<UserProfile>>;

    /// Everyone except `user_id`, ordered by name.
    async fn contacts(&self, user_id: i64) -> Result<Vec<UserProfile>>;
}

#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn exists(&self, user_id: i64) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(count = user_ids.len()))]
    async fn profiles(&self, user_ids: &[i64]) -> Result<Vec<UserProfile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = sqlx::query_as::<_, UserProfileRecord>(
            "SELECT id, name, email, avatar FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn contacts(&self, user_id: i64) -> Result<Vec<UserProfile>> {
        let records = sqlx::query_as::<_, UserProfileRecord>(
            "SELECT id, name, email, avatar FROM users WHERE id <> $1 ORDER BY name ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
