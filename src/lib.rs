// Core layer - domain types, configuration, and error handling
pub mod core;

// Features layer - all feature modules
pub mod features;

// Infrastructure - durable storage
pub mod database;

// Re-export core items for convenience
pub use crate::core::{Config, Error, Result};

// Re-export the store contract and its SQLite implementation
pub use crate::database::{Database, ReminderStore};

// Re-export feature items
pub use crate::features::{
    DispatchOutcome, DispatchPolicy, Dispatcher, LogSink, NotificationSink, ReconcileReport,
    ReminderScheduler,
};
