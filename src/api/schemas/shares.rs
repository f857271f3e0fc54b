use crate::services::share_service::ShareRequest;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SharePostRequest {
    pub post_id: i64,
    pub user_ids: Vec<i64>,
    /// Optional note sent along with the post.
    #[serde(default)]
    pub message: Option<String>,
}

impl From<SharePostRequest> for ShareRequest {
    fn from(request: SharePostRequest) -> Self {
        Self { post_id: request.post_id, target_ids: request.user_ids, note: request.message }
    }
}
