//! # Core Module
//!
//! Core domain types, configuration, and error handling for the nudge bot.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add reminder domain module with offset-aware time math
//! - 1.0.0: Initial creation with config and error modules

pub mod config;
pub mod error;
pub mod reminder;

// Re-export commonly used items
pub use config::Config;
pub use error::{Error, Result};
pub use reminder::{
    format_offset, format_time, next_daily_occurrence, once_delay, validate_offset, validate_text,
    validate_time_of_day, Reminder, ReminderKind, Schedule, UserProfile, MAX_UTC_OFFSET,
    MIN_UTC_OFFSET,
};
