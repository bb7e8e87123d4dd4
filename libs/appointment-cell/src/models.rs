// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

// ==============================================================================
// PROVIDER-OWNED APPOINTMENT DATA
// ==============================================================================

/// The provider sends `null` for text it has no value for.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_empty_list<'de, D>(deserializer: D) -> Result<Vec<Attendee>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Attendee>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub time_zone: String,
}

/// An appointment as held by the booking provider. Never cached locally;
/// every view re-fetches the authoritative list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub uid: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_empty_list")]
    pub attendees: Vec<Attendee>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub status: String,
}

impl Appointment {
    pub fn has_attendee_email(&self, email: &str) -> bool {
        self.attendees
            .iter()
            .any(|attendee| attendee.email.eq_ignore_ascii_case(email))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusySlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl From<&Appointment> for BusySlot {
    fn from(appointment: &Appointment) -> Self {
        Self {
            start: appointment.start_time,
            end: appointment.end_time,
        }
    }
}

// ==============================================================================
// BOOKING REQUESTS AND OUTCOMES
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub start: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub notes: Option<String>,
}

/// Result of a booking attempt. Returned by every creation call, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BookingOutcome {
    pub fn booked(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingConfirmation {
    pub recipient: String,
    pub name: String,
    pub start: DateTime<Utc>,
}

// ==============================================================================
// HTTP DTOS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ManualBookingRequest {
    pub start_time: DateTime<Utc>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManualBookingResponse {
    pub message: String,
    #[serde(flatten)]
    pub outcome: BookingOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelAppointmentResponse {
    pub id: i64,
    pub cancelled: bool,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Scheduling provider not configured")]
    NotConfigured,

    #[error("{0}")]
    Rejected(String),

    #[error("Unexpected provider status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid provider payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}
