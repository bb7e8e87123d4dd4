// libs/auth-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub identifier: String,
    pub otp: String,
    #[serde(rename = "newPassword", alias = "new_password")]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AuthServiceError {
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Could not reach the auth service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid auth service response: {0}")]
    InvalidResponse(String),
}

impl From<AuthServiceError> for AppError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::Rejected { status, message } => match status {
                400 => AppError::BadRequest(message),
                401 => AppError::Auth(message),
                404 => AppError::NotFound(message),
                409 => AppError::Conflict(message),
                _ => AppError::ExternalService(message),
            },
            AuthServiceError::Transport(_) => {
                AppError::ExternalService("Connection Error: Could not reach the server.".to_string())
            }
            AuthServiceError::InvalidResponse(msg) => AppError::ExternalService(msg),
        }
    }
}
