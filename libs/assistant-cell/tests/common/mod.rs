#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use appointment_cell::models::{Appointment, Attendee, BookingOutcome, NewAppointment};
use appointment_cell::services::Scheduling;
use assistant_cell::models::{ModelResponse, ToolInvocation, TurnPayload};
use assistant_cell::services::{Dialogue, DialogueFactory, HistoryRefresh};
use assistant_cell::ModelError;

pub fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn book_call(id: &str, date_time: &str, name: &str, email: &str) -> ToolInvocation {
    ToolInvocation::new(
        id,
        "bookAppointment",
        args(json!({ "dateTime": date_time, "name": name, "email": email })),
    )
}

pub fn availability_call(id: &str) -> ToolInvocation {
    ToolInvocation::new(id, "checkAvailability", Map::new())
}

/// Model stand-in that replays a fixed script and records what it was sent.
#[derive(Clone, Default)]
pub struct ScriptedDialogue {
    script: Arc<Mutex<VecDeque<Result<ModelResponse, ModelError>>>>,
    pub sent: Arc<Mutex<Vec<TurnPayload>>>,
    /// Reply used once the script runs dry.
    pub repeat: Option<ModelResponse>,
}

impl ScriptedDialogue {
    pub fn new(script: Vec<Result<ModelResponse, ModelError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Default::default()
        }
    }

    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Default::default()
        }
    }

    pub fn sends(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn payloads(&self) -> Vec<TurnPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dialogue for ScriptedDialogue {
    async fn send(&mut self, payload: &TurnPayload) -> Result<ModelResponse, ModelError> {
        self.sent.lock().unwrap().push(payload.clone());
        let next = self.script.lock().unwrap().pop_front();
        match (next, &self.repeat) {
            (Some(step), _) => step,
            (None, Some(response)) => Ok(response.clone()),
            (None, None) => Ok(ModelResponse::text("script exhausted")),
        }
    }
}

pub struct ScriptedFactory {
    pub dialogue: ScriptedDialogue,
}

impl DialogueFactory for ScriptedFactory {
    fn open(&self) -> Box<dyn Dialogue> {
        Box::new(self.dialogue.clone())
    }
}

/// Refresh hook that reports every call on a channel.
pub struct ChannelRefresh {
    sender: mpsc::UnboundedSender<()>,
}

impl ChannelRefresh {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

#[async_trait]
impl HistoryRefresh for ChannelRefresh {
    async fn refresh(&self) {
        let _ = self.sender.send(());
    }
}

/// In-memory booking provider.
#[derive(Default)]
pub struct StubScheduling {
    pub appointments: Mutex<Vec<Appointment>>,
    pub created: Mutex<Vec<NewAppointment>>,
    pub reject_with: Option<String>,
    pub panic_on_list: bool,
    pub list_calls: AtomicUsize,
}

impl StubScheduling {
    pub fn with_appointment(start: DateTime<Utc>, email: &str) -> Self {
        let stub = Self::default();
        stub.appointments.lock().unwrap().push(appointment(1, start, email));
        stub
    }

    pub fn rejecting(error: &str) -> Self {
        Self {
            reject_with: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

pub fn appointment(id: i64, start: DateTime<Utc>, email: &str) -> Appointment {
    Appointment {
        id,
        uid: format!("uid-{}", id),
        title: "Dental Appointment".to_string(),
        description: None,
        start_time: start,
        end_time: start + Duration::minutes(30),
        attendees: vec![Attendee {
            name: "Patient".to_string(),
            email: email.to_string(),
            time_zone: "Europe/London".to_string(),
        }],
        status: "ACCEPTED".to_string(),
    }
}

#[async_trait]
impl Scheduling for StubScheduling {
    async fn list_appointments(&self) -> Vec<Appointment> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_list {
            panic!("provider client exploded");
        }
        self.appointments.lock().unwrap().clone()
    }

    async fn create_appointment(&self, request: NewAppointment) -> BookingOutcome {
        if let Some(error) = &self.reject_with {
            return BookingOutcome::failed(error.clone());
        }
        let mut appointments = self.appointments.lock().unwrap();
        let id = appointments.len() as i64 + 1;
        appointments.push(appointment(id, request.start, &request.email));
        self.created.lock().unwrap().push(request);
        BookingOutcome::booked(json!({ "id": id }))
    }

    async fn cancel_appointment(&self, id: i64) -> bool {
        let mut appointments = self.appointments.lock().unwrap();
        let before = appointments.len();
        appointments.retain(|appointment| appointment.id != id);
        appointments.len() != before
    }
}
