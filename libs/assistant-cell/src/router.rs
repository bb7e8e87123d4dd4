// libs/assistant-cell/src/router.rs
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use appointment_cell::services::{Scheduling, SchedulingClient};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{GeminiDialogueFactory, Orchestrator, SessionLimits, SessionRegistry};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AssistantState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<SessionRegistry>,
}

impl AssistantState {
    /// Production wiring: Cal.com scheduling and Gemini dialogues. Must be
    /// called inside the runtime, it starts the idle-session sweeper.
    pub fn new(config: Arc<AppConfig>) -> Self {
        let scheduling: Arc<dyn Scheduling> = Arc::new(SchedulingClient::new(&config));
        let orchestrator = Orchestrator::from_config(&config, scheduling);
        let dialogues = Arc::new(GeminiDialogueFactory::new(&config));

        let registry = Arc::new(
            SessionRegistry::new(orchestrator, dialogues).with_limits(SessionLimits::from_config(&config)),
        );
        registry.spawn_eviction(SWEEP_INTERVAL);

        Self { config, registry }
    }

    pub fn with_registry(config: Arc<AppConfig>, registry: Arc<SessionRegistry>) -> Self {
        Self { config, registry }
    }
}

pub fn assistant_routes(state: AssistantState) -> Router {
    let auth_state = state.config.clone();

    Router::new()
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/{session_id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{session_id}/messages", post(handlers::send_message))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
        .with_state(state)
}
