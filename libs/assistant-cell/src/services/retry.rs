// libs/assistant-cell/src/services/retry.rs
use std::time::Duration;

use tracing::warn;

use shared_config::AppConfig;

use crate::error::AssistantError;
use crate::models::{ModelResponse, TurnPayload};
use crate::services::gemini::Dialogue;

/// Retry for overloaded model sends. Waits `attempt * backoff_step` after
/// each transient failure; any other failure is returned at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.assistant_max_attempts,
            backoff_step: Duration::from_millis(config.assistant_retry_step_ms),
        }
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }

    pub async fn send<D>(&self, dialogue: &mut D, payload: &TurnPayload) -> Result<ModelResponse, AssistantError>
    where
        D: Dialogue + ?Sized,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let err = match dialogue.send(payload).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            attempt += 1;

            if !err.kind.is_transient() {
                return Err(AssistantError::Model(err));
            }
            if attempt >= max_attempts {
                warn!("Model still overloaded after {} attempts", attempt);
                return Err(AssistantError::RetriesExhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.backoff_for(attempt);
            warn!(
                "Model overloaded. Retrying attempt {}/{} in {:?}",
                attempt, max_attempts, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
