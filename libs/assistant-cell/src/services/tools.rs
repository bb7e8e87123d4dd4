// libs/assistant-cell/src/services/tools.rs
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use futures::FutureExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use appointment_cell::models::{BusySlot, NewAppointment};
use appointment_cell::services::Scheduling;

use crate::error::ToolArgumentError;
use crate::models::{ToolInvocation, ToolResult};

pub const BOOK_APPOINTMENT: &str = "bookAppointment";
pub const CHECK_AVAILABILITY: &str = "checkAvailability";

const AVAILABILITY_HINT: &str =
    "These are the currently booked slots. All other times between 9am and 5pm are available.";
const TOOL_NOT_FOUND: &str = "Error: Tool not found.";

const NAIVE_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Function declarations advertised to the model.
pub fn tool_declarations() -> Value {
    json!([
        {
            "name": BOOK_APPOINTMENT,
            "description": "Book a dental appointment for a patient. PRE-CONDITION: You must have the patients Name, Email, and Desired Date/Time.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "dateTime": {
                        "type": "STRING",
                        "description": "The start time for the appointment in ISO 8601 format (e.g., 2024-03-25T10:00:00Z). Convert user relative time (like \"tomorrow at 2pm\") to this format based on current date."
                    },
                    "name": {
                        "type": "STRING",
                        "description": "The full name of the patient."
                    },
                    "email": {
                        "type": "STRING",
                        "description": "The email address of the patient."
                    },
                    "notes": {
                        "type": "STRING",
                        "description": "Any specific reason for the visit (e.g., cleaning, toothache)."
                    }
                },
                "required": ["dateTime", "name", "email"]
            }
        },
        {
            "name": CHECK_AVAILABILITY,
            "description": "Check current existing appointments to see busy slots. Use this before booking to ensure the slot is free.",
            "parameters": {
                "type": "OBJECT",
                "properties": {}
            }
        }
    ])
}

// ==============================================================================
// TYPED TOOL CALLS
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BookAppointmentArgs {
    /// `dateTime` exactly as the model sent it, echoed back in the result.
    pub date_time: String,
    pub start: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    BookAppointment(BookAppointmentArgs),
    CheckAvailability,
    Unknown(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBookingArgs {
    date_time: Option<String>,
    name: Option<String>,
    email: Option<String>,
    notes: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ToolArgumentError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ToolArgumentError::Missing(field))
}

/// RFC 3339, or a local-looking timestamp without offset which is read as UTC.
pub fn parse_date_time(raw: &str) -> Result<DateTime<Utc>, ToolArgumentError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NAIVE_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ToolArgumentError::InvalidDateTime(raw.to_string()))
}

impl ToolCall {
    pub fn parse(invocation: &ToolInvocation) -> Result<Self, ToolArgumentError> {
        match invocation.name.as_str() {
            BOOK_APPOINTMENT => {
                let raw: RawBookingArgs = serde_json::from_value(Value::Object(invocation.args.clone()))
                    .map_err(|e| ToolArgumentError::Malformed(e.to_string()))?;

                let date_time = required(raw.date_time, "dateTime")?;
                let start = parse_date_time(&date_time)?;

                Ok(ToolCall::BookAppointment(BookAppointmentArgs {
                    date_time,
                    start,
                    name: required(raw.name, "name")?,
                    email: required(raw.email, "email")?,
                    notes: raw.notes.filter(|notes| !notes.trim().is_empty()),
                }))
            }
            CHECK_AVAILABILITY => Ok(ToolCall::CheckAvailability),
            other => Ok(ToolCall::Unknown(other.to_string())),
        }
    }
}

// ==============================================================================
// EXECUTOR
// ==============================================================================

/// Resolves model tool calls against the booking provider. Every invocation
/// gets exactly one result; nothing here returns an error or panics out.
pub struct ToolExecutor {
    scheduling: Arc<dyn Scheduling>,
}

impl ToolExecutor {
    pub fn new(scheduling: Arc<dyn Scheduling>) -> Self {
        Self { scheduling }
    }

    pub async fn execute_all(&self, invocations: &[ToolInvocation]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            results.push(self.execute(invocation).await);
        }
        results
    }

    pub async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        debug!("Tool call: {} {:?}", invocation.name, invocation.args);

        let outcome = AssertUnwindSafe(self.dispatch(invocation)).catch_unwind().await;
        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!("Tool {} rejected its arguments: {}", invocation.name, err);
                format!("Error executing tool: {}", err)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Tool {} panicked: {}", invocation.name, message);
                format!("Error executing tool: {}", message)
            }
        };

        ToolResult {
            id: invocation.id.clone(),
            name: invocation.name.clone(),
            result,
        }
    }

    async fn dispatch(&self, invocation: &ToolInvocation) -> Result<String, ToolArgumentError> {
        match ToolCall::parse(invocation)? {
            ToolCall::BookAppointment(args) => Ok(self.book(args).await),
            ToolCall::CheckAvailability => Ok(self.availability().await),
            ToolCall::Unknown(name) => {
                warn!("Unknown tool called: {}", name);
                Ok(TOOL_NOT_FOUND.to_string())
            }
        }
    }

    async fn book(&self, args: BookAppointmentArgs) -> String {
        let outcome = self
            .scheduling
            .create_appointment(NewAppointment {
                start: args.start,
                name: args.name,
                email: args.email.clone(),
                notes: args.notes,
            })
            .await;

        if outcome.success {
            format!(
                "Success: Appointment booked for {}. Confirmation email sent to {}.",
                args.date_time, args.email
            )
        } else {
            format!(
                "Error: Failed to book. {}.",
                outcome.error.as_deref().unwrap_or("Unknown error")
            )
        }
    }

    async fn availability(&self) -> String {
        let busy_slots: Vec<Value> = self
            .scheduling
            .list_appointments()
            .await
            .iter()
            .map(BusySlot::from)
            .map(|slot| {
                json!({
                    "start": slot.start.to_rfc3339_opts(SecondsFormat::Millis, true),
                    "end": slot.end.to_rfc3339_opts(SecondsFormat::Millis, true),
                })
            })
            .collect();

        json!({ "busySlots": busy_slots, "message": AVAILABILITY_HINT }).to_string()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool panicked".to_string()
    }
}
