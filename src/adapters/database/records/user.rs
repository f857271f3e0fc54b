use crate::domain::user::UserProfile;

#[derive(Debug, sqlx::FromRow)]
pub struct UserProfileRecord {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) avatar: Option<String>,
}

impl From<UserProfileRecord> for UserProfile {
    fn from(record: UserProfileRecord) -> Self {
        Self { id: record.id, name: record.name, email: record.email, avatar: record.avatar }
    }
}
