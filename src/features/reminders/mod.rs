//! # Reminders Feature
//!
//! Scheduled reminder system with per-user timezone support.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Configurable stale-prune grace bound
//! - 1.1.0: Split dispatcher and sink out of the scheduler
//! - 1.0.0: Initial scheduler with daily and one-time reminders

pub mod dispatcher;
pub mod scheduler;
pub mod sink;

pub use dispatcher::{DispatchOutcome, DispatchPolicy, Dispatcher};
pub use scheduler::{ReconcileReport, ReminderScheduler};
pub use sink::{LogSink, NotificationSink};
