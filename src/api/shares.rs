use crate::api::AppState;
use crate::api::middleware::{AuthUser, SocketId};
use crate::api::schemas::shares::SharePostRequest;
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};

/// Shares a post with several users as chat messages.
///
/// # Errors
/// Returns `AppError::BadRequest` for a malformed payload or target list.
/// Returns `AppError::NotFound` if the post does not exist.
pub async fn share_post(
    auth_user: AuthUser,
    socket_id: SocketId,
    State(state): State<AppState>,
    payload: std::result::Result<Json<SharePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let outcome = state.share_service.share_post(auth_user.user_id, request.into(), socket_id.as_deref()).await?;
    Ok(Json(outcome))
}
