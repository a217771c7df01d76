//! # Features Module
//!
//! Feature modules for the nudge bot. Each feature lives in its own
//! submodule and re-exports its public services here.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

pub mod reminders;

pub use reminders::{
    DispatchOutcome, DispatchPolicy, Dispatcher, LogSink, NotificationSink, ReconcileReport,
    ReminderScheduler,
};
