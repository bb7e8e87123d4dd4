// libs/assistant-cell/src/services/orchestrator.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use appointment_cell::services::Scheduling;
use shared_config::AppConfig;

use crate::error::AssistantError;
use crate::models::{TranscriptTurn, TurnPayload};
use crate::services::gemini::Dialogue;
use crate::services::retry::RetryPolicy;
use crate::services::tools::{ToolExecutor, BOOK_APPOINTMENT};

pub const GREETING: &str =
    "Hello! I am the DentalCare AI assistant. I can help you check availability and book an appointment.";
const FALLBACK_REPLY: &str = "I've processed your request.";

/// Notified when a conversation may have changed the patient's bookings.
/// Runs detached from the conversation; it must be safe to call repeatedly.
#[async_trait]
pub trait HistoryRefresh: Send + Sync {
    async fn refresh(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingModel,
    ResolvingTools,
}

/// One conversation: the visible transcript plus the model dialogue behind it.
pub struct ConversationSession {
    transcript: Vec<TranscriptTurn>,
    dialogue: Box<dyn Dialogue>,
    refresh: Arc<dyn HistoryRefresh>,
    state: SessionState,
    tool_rounds: u32,
}

impl ConversationSession {
    pub fn new(dialogue: Box<dyn Dialogue>, refresh: Arc<dyn HistoryRefresh>) -> Self {
        Self {
            transcript: vec![TranscriptTurn::assistant(GREETING)],
            dialogue,
            refresh,
            state: SessionState::Idle,
            tool_rounds: 0,
        }
    }

    pub fn transcript(&self) -> &[TranscriptTurn] {
        &self.transcript
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Tool rounds used by the most recent message.
    pub fn tool_rounds(&self) -> u32 {
        self.tool_rounds
    }

    fn trigger_refresh(&self) {
        let refresh = self.refresh.clone();
        tokio::spawn(async move { refresh.refresh().await });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub reply: TranscriptTurn,
    pub history_refreshed: bool,
}

/// Drives one user message through the model, resolving tool calls until the
/// model answers in text or the round budget runs out.
pub struct Orchestrator {
    executor: ToolExecutor,
    retry: RetryPolicy,
    max_tool_rounds: u32,
}

impl Orchestrator {
    pub fn new(executor: ToolExecutor, retry: RetryPolicy, max_tool_rounds: u32) -> Self {
        Self {
            executor,
            retry,
            max_tool_rounds,
        }
    }

    pub fn from_config(config: &AppConfig, scheduling: Arc<dyn Scheduling>) -> Self {
        Self::new(
            ToolExecutor::new(scheduling),
            RetryPolicy::from_config(config),
            config.assistant_max_tool_rounds,
        )
    }

    #[instrument(skip_all)]
    pub async fn send_message(&self, session: &mut ConversationSession, text: &str) -> TurnOutcome {
        session.transcript.push(TranscriptTurn::user(text));
        session.state = SessionState::AwaitingModel;
        session.tool_rounds = 0;

        let mut history_refreshed = false;
        let reply = match self.resolve(session, text, &mut history_refreshed).await {
            Ok(Some(text)) if !text.trim().is_empty() => TranscriptTurn::assistant(text),
            Ok(_) => TranscriptTurn::assistant(FALLBACK_REPLY),
            Err(err) => {
                error!("Chat error: {}", err);
                TranscriptTurn::error(err.user_message())
            }
        };

        session.transcript.push(reply.clone());
        session.state = SessionState::Idle;

        TurnOutcome {
            reply,
            history_refreshed,
        }
    }

    async fn resolve(
        &self,
        session: &mut ConversationSession,
        text: &str,
        history_refreshed: &mut bool,
    ) -> Result<Option<String>, AssistantError> {
        let mut response = self
            .retry
            .send(session.dialogue.as_mut(), &TurnPayload::Text(text.to_string()))
            .await?;

        while response.has_tool_invocations() && session.tool_rounds < self.max_tool_rounds {
            session.tool_rounds += 1;
            session.state = SessionState::ResolvingTools;

            let results = self.executor.execute_all(&response.tool_invocations).await;
            if results.is_empty() {
                break;
            }
            debug!("Round {} resolved {} tool calls", session.tool_rounds, results.len());

            let booked = results.iter().any(|result| result.name == BOOK_APPOINTMENT);
            if booked {
                session.trigger_refresh();
                *history_refreshed = true;
            }

            session.state = SessionState::AwaitingModel;
            response = self
                .retry
                .send(session.dialogue.as_mut(), &TurnPayload::ToolResults(results))
                .await?;

            if !booked && response.invokes(BOOK_APPOINTMENT) {
                session.trigger_refresh();
                *history_refreshed = true;
            }
        }

        if response.has_tool_invocations() {
            warn!(
                "Tool round budget of {} exhausted with {} calls pending",
                self.max_tool_rounds,
                response.tool_invocations.len()
            );
        } else {
            info!("Message resolved after {} tool rounds", session.tool_rounds);
        }

        Ok(response.text)
    }
}
