// libs/assistant-cell/src/lib.rs
//! # Assistant Cell
//!
//! Conversational booking: drives a tool-calling dialogue with the model,
//! executes the tools it asks for against the booking provider and keeps a
//! per-session transcript.
//!
//! ```text
//! +-----------------------------------------------------+
//! |                  Assistant Cell                     |
//! +-----------------------------------------------------+
//! |  handlers.rs       |  HTTP endpoint handlers        |
//! |  router.rs         |  Route definitions             |
//! |  models.rs         |  Transcript, tool exchange     |
//! |  error.rs          |  Model and assistant errors    |
//! |  services/         |                                |
//! |    gemini.rs       |  Model dialogue (Gemini)       |
//! |    retry.rs        |  Overload retry with backoff   |
//! |    tools.rs        |  Tool declarations + executor  |
//! |    orchestrator.rs |  Per-message resolution loop   |
//! |    sessions.rs     |  Session registry              |
//! +-----------------------------------------------------+
//! ```
//!
//! ## API Endpoints
//!
//! - `POST /assistant/sessions` - Start a conversation
//! - `GET /assistant/sessions/{id}` - Transcript and history version
//! - `POST /assistant/sessions/{id}/messages` - Send a message
//! - `DELETE /assistant/sessions/{id}` - Reset the conversation

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::{AssistantError, ModelError, ModelErrorKind, ToolArgumentError};
pub use router::{assistant_routes, AssistantState};
pub use services::{
    ConversationSession, Dialogue, DialogueFactory, GeminiClient, GeminiDialogue, HistoryRefresh,
    Orchestrator, RetryPolicy, SessionLimits, SessionRegistry, ToolExecutor,
};
