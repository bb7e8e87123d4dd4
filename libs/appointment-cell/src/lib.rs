// libs/appointment-cell/src/lib.rs
//! # Appointment Cell
//!
//! Wraps the external booking provider (Cal.com) behind the [`Scheduling`]
//! contract and exposes the doctor and patient appointment endpoints.
//!
//! ```text
//! +-----------------------------------------------------+
//! |                 Appointment Cell                    |
//! +-----------------------------------------------------+
//! |  handlers.rs    |  HTTP endpoint handlers           |
//! |  router.rs      |  Route definitions                |
//! |  models.rs      |  Appointments, outcomes, errors   |
//! |  services/      |                                   |
//! |    scheduling.rs|  Booking provider client          |
//! |    notifier.rs  |  Booking confirmation delivery    |
//! +-----------------------------------------------------+
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /appointments` - Upcoming schedule (doctor)
//! - `DELETE /appointments/{id}` - Cancel an appointment (doctor)
//! - `POST /appointments` - Manual booking (patient)
//! - `GET /appointments/mine` - Booking history (patient)

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    Appointment, Attendee, BookingConfirmation, BookingOutcome, BusySlot, NewAppointment,
    NotifierError, SchedulingError,
};
pub use services::{LogNotifier, Notifier, Scheduling, SchedulingClient};
pub use router::appointment_routes;
