// libs/appointment-cell/src/services/scheduling.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use shared_config::AppConfig;

use crate::models::{
    Appointment, BookingConfirmation, BookingOutcome, NewAppointment, SchedulingError,
};
use crate::services::notifier::{LogNotifier, Notifier};

const DEFAULT_BOOKING_NOTES: &str = "Booked via DentalCare App";
const CREATE_FAILED_FALLBACK: &str = "Failed to create booking";

/// Contract every caller of the booking provider relies on. None of these
/// operations fail visibly: provider and transport problems come back as
/// data (an empty list, a failed outcome, `false`).
#[async_trait]
pub trait Scheduling: Send + Sync {
    /// Upcoming appointments. Empty means "unknown or none", not "free".
    async fn list_appointments(&self) -> Vec<Appointment>;

    async fn create_appointment(&self, request: NewAppointment) -> BookingOutcome;

    async fn cancel_appointment(&self, id: i64) -> bool;
}

/// Cal.com v1 client for a single event type.
pub struct SchedulingClient {
    client: Client,
    base_url: String,
    api_key: String,
    event_type_id: i64,
    time_zone: String,
    notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingPayload<'a> {
    event_type_id: i64,
    start: String,
    responses: BookingResponses<'a>,
    metadata: Value,
    time_zone: &'a str,
    language: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingResponses<'a> {
    name: &'a str,
    email: &'a str,
    notes: &'a str,
    location: BookingLocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingLocation {
    value: &'static str,
    option_value: &'static str,
}

#[derive(Debug, Deserialize)]
struct BookingsEnvelope {
    #[serde(default)]
    bookings: Vec<Value>,
}

impl SchedulingClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.cal_base_url.trim_end_matches('/').to_string(),
            api_key: config.cal_api_key.clone(),
            event_type_id: config.cal_event_type_id,
            time_zone: config.clinic_time_zone.clone(),
            notifier: Arc::new(LogNotifier::new(config.clinic_name.clone())),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    fn ensure_configured(&self) -> Result<(), SchedulingError> {
        if self.api_key.is_empty() {
            return Err(SchedulingError::NotConfigured);
        }
        Ok(())
    }

    async fn fetch_bookings(&self) -> Result<Vec<Appointment>, SchedulingError> {
        self.ensure_configured()?;

        let url = format!("{}/bookings", self.base_url);
        let event_type = self.event_type_id.to_string();
        debug!("Fetching upcoming bookings from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("eventTypeId", event_type.as_str()),
                ("status", "upcoming"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SchedulingError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let envelope: BookingsEnvelope = serde_json::from_str(&body)?;

        // One unreadable row must not hide the rest of the schedule.
        let bookings = envelope
            .bookings
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Appointment>(raw) {
                Ok(appointment) => Some(appointment),
                Err(err) => {
                    warn!("Skipping unreadable booking: {}", err);
                    None
                }
            })
            .collect();
        Ok(bookings)
    }

    async fn post_booking(&self, request: &NewAppointment) -> Result<Value, SchedulingError> {
        self.ensure_configured()?;

        let payload = CreateBookingPayload {
            event_type_id: self.event_type_id,
            start: request.start.to_rfc3339(),
            responses: BookingResponses {
                name: &request.name,
                email: &request.email,
                notes: request
                    .notes
                    .as_deref()
                    .filter(|notes| !notes.trim().is_empty())
                    .unwrap_or(DEFAULT_BOOKING_NOTES),
                location: BookingLocation {
                    value: "inPerson",
                    option_value: "",
                },
            },
            metadata: json!({}),
            time_zone: &self.time_zone,
            language: "en",
        };

        let url = format!("{}/bookings", self.base_url);
        debug!("Creating booking at {} for {}", url, request.start);

        let response = self
            .client
            .post(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Booking provider rejected creation ({}): {}", status, body);
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| CREATE_FAILED_FALLBACK.to_string());
            return Err(SchedulingError::Rejected(message));
        }

        // The provider accepted the booking; an odd body does not undo that.
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    async fn delete_booking(&self, id: i64) -> Result<bool, SchedulingError> {
        self.ensure_configured()?;

        let url = format!("{}/bookings/{}", self.base_url, id);
        let response = self
            .client
            .delete(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl Scheduling for SchedulingClient {
    async fn list_appointments(&self) -> Vec<Appointment> {
        match self.fetch_bookings().await {
            Ok(bookings) => {
                debug!("Fetched {} upcoming bookings", bookings.len());
                bookings
            }
            Err(err) => {
                warn!("Failed to fetch bookings, treating as empty: {}", err);
                Vec::new()
            }
        }
    }

    #[instrument(skip(self, request), fields(email = %request.email, start = %request.start))]
    async fn create_appointment(&self, request: NewAppointment) -> BookingOutcome {
        let data = match self.post_booking(&request).await {
            Ok(data) => data,
            Err(err) => {
                error!("Error creating booking: {}", err);
                return BookingOutcome::failed(err.to_string());
            }
        };

        info!("Booking accepted by provider");

        let confirmation = BookingConfirmation {
            recipient: request.email.clone(),
            name: request.name.clone(),
            start: request.start,
        };
        if let Err(err) = self.notifier.send_confirmation(&confirmation).await {
            warn!("Booking confirmed but notification failed: {}", err);
        }

        BookingOutcome::booked(data)
    }

    async fn cancel_appointment(&self, id: i64) -> bool {
        match self.delete_booking(id).await {
            Ok(true) => {
                info!("Booking {} cancelled", id);
                true
            }
            Ok(false) => {
                warn!("Booking provider refused to cancel booking {}", id);
                false
            }
            Err(err) => {
                error!("Error deleting booking {}: {}", id, err);
                false
            }
        }
    }
}
