// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    Appointment, CancelAppointmentResponse, ManualBookingRequest, ManualBookingResponse,
    NewAppointment,
};
use crate::services::scheduling::{Scheduling, SchedulingClient};

const MANUAL_BOOKING_NOTES: &str = "Manual Web Booking";

// ==============================================================================
// DOCTOR DASHBOARD
// ==============================================================================

pub async fn list_appointments(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    require_role(&user, UserRole::Doctor)?;
    debug!("Doctor {} listing upcoming appointments", user.id);

    let client = SchedulingClient::new(&config);
    Ok(Json(client.list_appointments().await))
}

pub async fn cancel_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<CancelAppointmentResponse>, AppError> {
    require_role(&user, UserRole::Doctor)?;

    let client = SchedulingClient::new(&config);
    if !client.cancel_appointment(appointment_id).await {
        return Err(AppError::ExternalService("Failed to delete booking".to_string()));
    }

    info!("Doctor {} cancelled appointment {}", user.id, appointment_id);
    Ok(Json(CancelAppointmentResponse {
        id: appointment_id,
        cancelled: true,
    }))
}

// ==============================================================================
// PATIENT DASHBOARD
// ==============================================================================

pub async fn book_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<ManualBookingRequest>,
) -> Result<(StatusCode, Json<ManualBookingResponse>), AppError> {
    require_role(&user, UserRole::Patient)?;

    let email = request
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .unwrap_or_else(|| user.email.clone());
    if email.is_empty() {
        return Err(AppError::ValidationError("An email address is required".to_string()));
    }

    let name = if user.name.trim().is_empty() {
        "Patient".to_string()
    } else {
        user.name.clone()
    };

    let client = SchedulingClient::new(&config);
    let outcome = client
        .create_appointment(NewAppointment {
            start: request.start_time,
            name,
            email: email.clone(),
            notes: Some(request.notes.unwrap_or_else(|| MANUAL_BOOKING_NOTES.to_string())),
        })
        .await;

    if !outcome.success {
        let message = outcome
            .error
            .unwrap_or_else(|| "Failed to book appointment.".to_string());
        return Err(AppError::ExternalService(message));
    }

    Ok((
        StatusCode::CREATED,
        Json(ManualBookingResponse {
            message: format!(
                "Appointment booked! A confirmation email has been sent to {}.",
                email
            ),
            outcome,
        }),
    ))
}

pub async fn my_appointments(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    require_role(&user, UserRole::Patient)?;

    let client = SchedulingClient::new(&config);
    let mine: Vec<Appointment> = client
        .list_appointments()
        .await
        .into_iter()
        .filter(|appointment| appointment.has_attendee_email(&user.email))
        .collect();

    debug!("Patient {} has {} upcoming appointments", user.id, mine.len());
    Ok(Json(mine))
}
