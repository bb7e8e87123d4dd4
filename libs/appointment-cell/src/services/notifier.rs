// libs/appointment-cell/src/services/notifier.rs
use async_trait::async_trait;
use tracing::info;

use crate::models::{BookingConfirmation, NotifierError};

/// Delivers booking confirmations. Failures are reported to the caller but a
/// booking the provider accepted stays booked regardless.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_confirmation(&self, confirmation: &BookingConfirmation) -> Result<(), NotifierError>;
}

/// Renders the confirmation email into the service log instead of sending it.
pub struct LogNotifier {
    clinic_name: String,
}

impl LogNotifier {
    pub fn new(clinic_name: impl Into<String>) -> Self {
        Self {
            clinic_name: clinic_name.into(),
        }
    }

    pub fn render(&self, confirmation: &BookingConfirmation) -> String {
        format!(
            "To: {to}\n\
             Subject: Appointment Confirmation - {clinic}\n\
             \n\
             Dear {name},\n\
             \n\
             Your appointment has been successfully booked.\n\
             \n\
             Date & Time: {when}\n\
             Location: {clinic}\n\
             \n\
             Please arrive 10 minutes early.\n\
             \n\
             Regards,\n\
             {clinic} Team",
            to = confirmation.recipient,
            clinic = self.clinic_name,
            name = confirmation.name,
            when = confirmation.start.format("%a %b %-d %Y, %H:%M UTC"),
        )
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_confirmation(&self, confirmation: &BookingConfirmation) -> Result<(), NotifierError> {
        info!(
            recipient = %confirmation.recipient,
            "Confirmation email sent\n{}",
            self.render(confirmation)
        );
        Ok(())
    }
}
