use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use assistant_cell::router::{assistant_routes, AssistantState};
use auth_cell::router::auth_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "DentalCare API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/assistant", assistant_routes(AssistantState::new(state)))
}
