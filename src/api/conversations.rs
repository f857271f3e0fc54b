use crate::api::AppState;
use crate::api::middleware::{AuthUser, SocketId};
use crate::api::schemas::messaging::MarkReadResponse;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

/// Lists the caller's conversations, most recent first.
///
/// # Errors
/// Returns `AppError::Database` if the inbox cannot be computed.
pub async fn list_conversations(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let conversations = state.conversation_service.list(auth_user.user_id).await?;
    Ok(Json(conversations))
}

/// Returns the thread with `userId` and marks their messages to the caller as read.
///
/// # Errors
/// Returns `AppError::SelfAction` for the caller's own id.
/// Returns `AppError::NotFound` if the partner does not exist.
pub async fn fetch_thread(
    auth_user: AuthUser,
    socket_id: SocketId,
    State(state): State<AppState>,
    Path(partner_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let thread = state.message_service.fetch_thread(auth_user.user_id, partner_id, socket_id.as_deref()).await?;
    Ok(Json(thread))
}

/// Marks everything `userId` sent to the caller as read.
///
/// # Errors
/// Returns `AppError::SelfAction` for the caller's own id.
pub async fn mark_read(
    auth_user: AuthUser,
    socket_id: SocketId,
    State(state): State<AppState>,
    Path(partner_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let updated = state.read_state_service.mark_read(auth_user.user_id, partner_id, socket_id.as_deref()).await?;
    Ok(Json(MarkReadResponse { updated }))
}
