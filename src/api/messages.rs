use crate::api::AppState;
use crate::api::middleware::{AuthUser, SocketId};
use crate::api::schemas::messaging::{DeleteMessageResponse, SendMessageRequest};
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

/// Sends one message to another user.
///
/// # Errors
/// Returns `AppError::BadRequest` if the payload is malformed or breaks the limits.
/// Returns `AppError::SelfAction` when addressed to the caller.
/// Returns `AppError::UnknownRecipient` if the receiver does not exist.
pub async fn send_message(
    auth_user: AuthUser,
    socket_id: SocketId,
    State(state): State<AppState>,
    payload: std::result::Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let message = state.message_service.send(auth_user.user_id, request.into(), socket_id.as_deref()).await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Deletes a message the caller sent.
///
/// # Errors
/// Returns `AppError::NotFound` if the message does not exist.
/// Returns `AppError::Forbidden` if the caller is not its sender.
pub async fn delete_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let deleted = state.message_service.delete_message(message_id, auth_user.user_id).await?;
    Ok(Json(DeleteMessageResponse { deleted }))
}
