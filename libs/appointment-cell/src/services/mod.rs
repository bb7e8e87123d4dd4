// libs/appointment-cell/src/services/mod.rs
pub mod notifier;
pub mod scheduling;

pub use notifier::{LogNotifier, Notifier};
pub use scheduling::{Scheduling, SchedulingClient};
