// libs/auth-cell/src/services/directory.rs
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_models::auth::User;

use crate::models::{
    AuthServiceError, ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
};

/// Client for the external user directory that owns accounts and passwords.
pub struct AuthServiceClient {
    client: Client,
    base_url: String,
}

impl AuthServiceClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.auth_service_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, AuthServiceError> {
        self.post_json("register", request, "Registration failed").await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<User, AuthServiceError> {
        self.post_json("login", request, "Login failed").await
    }

    pub async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<(), AuthServiceError> {
        self.post("forgot-password", request, "Failed to send OTP").await?;
        Ok(())
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<(), AuthServiceError> {
        self.post("reset-password", request, "Failed to reset password").await?;
        Ok(())
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, fallback: &str) -> Result<T, AuthServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.post(path, body, fallback).await?;
        serde_json::from_str(&text).map_err(|e| AuthServiceError::InvalidResponse(e.to_string()))
    }

    async fn post<B>(&self, path: &str, body: &B, fallback: &str) -> Result<String, AuthServiceError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}/{}", self.base_url, path);
        debug!("Auth service request: POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| fallback.to_string());
            warn!("Auth service rejected {} with {}: {}", path, status, message);
            return Err(AuthServiceError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(text)
    }
}
