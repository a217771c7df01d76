//! Core error types
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.0.0: Initial taxonomy (validation / not-found / store)

use thiserror::Error;

/// Result alias used throughout the scheduling core
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the scheduling core
///
/// Delivery failures are not represented here: the sink's errors are treated
/// as transient and handled with bounded retries inside the dispatcher, never
/// propagated to callers.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed reminder fields, rejected synchronously at creation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Operation referenced a reminder id with no backing record or live job
    #[error("reminder {0} not found")]
    NotFound(i64),

    /// Persistence layer failure; fatal for the operation in progress
    #[error("store error: {0}")]
    Store(#[from] sqlite::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("hour 24 out of range".to_string());
        assert_eq!(err.to_string(), "validation failed: hour 24 out of range");

        let err = Error::NotFound(42);
        assert_eq!(err.to_string(), "reminder 42 not found");
    }

    #[test]
    fn test_store_error_from_sqlite() {
        let sql_err = sqlite::Error {
            code: Some(1),
            message: Some("no such table: reminders".to_string()),
        };
        let err: Error = sql_err.into();
        assert!(matches!(err, Error::Store(_)));
    }
}
