// libs/assistant-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::error::AssistantError;
use crate::models::{SendMessageRequest, SendMessageResponse, SessionView};
use crate::router::AssistantState;

pub async fn create_session(
    State(state): State<AssistantState>,
    Extension(user): Extension<User>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    if !state.config.is_assistant_configured() {
        return Err(AssistantError::NotConfigured.into());
    }

    let view = state.registry.create(&user).await;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(state): State<AssistantState>,
    Extension(user): Extension<User>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let view = state.registry.get(&user, session_id).await?;
    Ok(Json(view))
}

pub async fn send_message(
    State(state): State<AssistantState>,
    Extension(user): Extension<User>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    debug!("User {} sending message to session {}", user.id, session_id);

    let response = state
        .registry
        .send(&user, session_id, &request.message)
        .await?;
    Ok(Json(response))
}

pub async fn delete_session(
    State(state): State<AssistantState>,
    Extension(user): Extension<User>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.registry.remove(&user, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
