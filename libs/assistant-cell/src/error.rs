// libs/assistant-cell/src/error.rs
use thiserror::Error;

use shared_models::error::AppError;

const HIGH_TRAFFIC_MESSAGE: &str =
    "I'm currently experiencing high traffic. Please try again in a moment.";
const CONFIGURATION_MESSAGE: &str = "Configuration Error: Invalid Gemini API Key.";
const CONNECTIVITY_MESSAGE: &str = "Connection Error: Could not reach the server.";
const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred.";

/// Stable classification of a failed model exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// Upstream overloaded or unavailable. The only retryable kind.
    Overloaded,
    /// Rejected credentials or permissions.
    Configuration,
    /// The request never got a response.
    Connectivity,
    /// A success status with a body that could not be read.
    InvalidResponse,
    Other,
}

impl ModelErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelErrorKind::Overloaded)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn overloaded(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Overloaded, message).with_status(503)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolArgumentError {
    #[error("missing required argument '{0}'")]
    Missing(&'static str),

    #[error("invalid dateTime '{0}', expected ISO 8601")]
    InvalidDateTime(String),

    #[error("malformed arguments: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Service Unavailable after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: ModelError },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("The assistant is not configured")]
    NotConfigured,

    #[error("Session not found")]
    SessionNotFound,

    #[error("A message is already being processed for this session")]
    TurnInProgress,

    #[error("Message must not be empty")]
    EmptyMessage,
}

impl AssistantError {
    /// Sanitized text shown to the user in place of the raw failure.
    pub fn user_message(&self) -> String {
        match self {
            AssistantError::RetriesExhausted { .. } => HIGH_TRAFFIC_MESSAGE.to_string(),
            AssistantError::Model(err) => match err.kind {
                ModelErrorKind::Overloaded => HIGH_TRAFFIC_MESSAGE.to_string(),
                ModelErrorKind::Configuration => CONFIGURATION_MESSAGE.to_string(),
                ModelErrorKind::Connectivity => CONNECTIVITY_MESSAGE.to_string(),
                ModelErrorKind::InvalidResponse | ModelErrorKind::Other => {
                    if err.message.trim().is_empty() {
                        UNEXPECTED_MESSAGE.to_string()
                    } else {
                        err.message.clone()
                    }
                }
            },
            other => other.to_string(),
        }
    }
}

impl From<AssistantError> for AppError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::SessionNotFound => AppError::NotFound(err.to_string()),
            AssistantError::TurnInProgress => AppError::Conflict(err.to_string()),
            AssistantError::EmptyMessage => AppError::BadRequest(err.to_string()),
            AssistantError::NotConfigured | AssistantError::RetriesExhausted { .. } => {
                AppError::ServiceUnavailable(err.user_message())
            }
            AssistantError::Model(_) => AppError::ExternalService(err.user_message()),
        }
    }
}
