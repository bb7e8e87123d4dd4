// libs/auth-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::jwt::issue_token;

use crate::models::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    ResetPasswordRequest,
};
use crate::services::AuthServiceClient;

pub async fn register(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    debug!("Registering {} as {}", request.username, request.role);

    let client = AuthServiceClient::new(&config);
    let user = client.register(&request).await?;

    info!("Registered user {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let client = AuthServiceClient::new(&config);
    let user = client.login(&request).await?;

    let issued = issue_token(&user, &config.session_secret, config.session_ttl_hours).map_err(|e| {
        error!("Failed to issue session token: {}", e);
        AppError::Internal("Failed to start session".to_string())
    })?;

    info!("User {} logged in", user.id);
    Ok(Json(LoginResponse {
        user,
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

pub async fn forgot_password(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let client = AuthServiceClient::new(&config);
    client.forgot_password(&request).await?;

    Ok(Json(MessageResponse {
        message: "A one-time code has been sent.".to_string(),
    }))
}

pub async fn reset_password(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let client = AuthServiceClient::new(&config);
    client.reset_password(&request).await?;

    Ok(Json(MessageResponse {
        message: "Password has been reset.".to_string(),
    }))
}

pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}
