// libs/assistant-cell/src/models.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ==============================================================================
// TRANSCRIPT
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One visible line of the conversation. Intermediate tool exchanges never
/// appear here, only the user's text and the final assistant text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptTurn {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl TranscriptTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            is_error: false,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            is_error: true,
        }
    }
}

// ==============================================================================
// TOOL EXCHANGE
// ==============================================================================

/// A function call requested by the model. Lives for one resolution round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// Reply to exactly one [`ToolInvocation`], correlated by call id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub id: String,
    pub name: String,
    pub result: String,
}

/// What the model said in one exchange: optional final text and any tool
/// calls it wants resolved first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: Option<String>,
    pub tool_invocations: Vec<ToolInvocation>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_invocations: Vec::new(),
        }
    }

    pub fn tool_calls(tool_invocations: Vec<ToolInvocation>) -> Self {
        Self {
            text: None,
            tool_invocations,
        }
    }

    pub fn has_tool_invocations(&self) -> bool {
        !self.tool_invocations.is_empty()
    }

    pub fn invokes(&self, tool_name: &str) -> bool {
        self.tool_invocations
            .iter()
            .any(|invocation| invocation.name == tool_name)
    }
}

/// A single user-side turn sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnPayload {
    Text(String),
    ToolResults(Vec<ToolResult>),
}

// ==============================================================================
// HTTP DTOs
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub transcript: Vec<TranscriptTurn>,
    pub history_version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub reply: TranscriptTurn,
    pub transcript: Vec<TranscriptTurn>,
    /// Booking history changed during this message; re-fetch it.
    pub history_refresh: bool,
    pub history_version: u64,
}
