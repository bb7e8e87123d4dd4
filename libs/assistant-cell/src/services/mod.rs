// libs/assistant-cell/src/services/mod.rs
pub mod gemini;
pub mod orchestrator;
pub mod retry;
pub mod sessions;
pub mod tools;

pub use gemini::{Dialogue, DialogueFactory, GeminiClient, GeminiDialogue, GeminiDialogueFactory};
pub use orchestrator::{ConversationSession, HistoryRefresh, Orchestrator, SessionState, TurnOutcome};
pub use retry::RetryPolicy;
pub use sessions::{SessionLimits, SessionRegistry};
pub use tools::{ToolCall, ToolExecutor};
