use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::error::Result;
use axum::{Json, extract::State, response::IntoResponse};

/// Lists every other user as a potential conversation partner.
///
/// # Errors
/// Returns `AppError::Database` if the directory cannot be read.
pub async fn list_contacts(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let contacts = state.conversation_service.contacts(auth_user.user_id).await?;
    Ok(Json(contacts))
}
