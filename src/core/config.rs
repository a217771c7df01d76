//! Environment-backed configuration
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.0.0: Initial implementation with scheduling policy knobs

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Result};

/// Runtime configuration, read once at startup
///
/// All values have defaults so the bot runs with an empty environment;
/// a `.env` file is honored via dotenvy before this is built.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file path
    pub database_path: String,
    /// Default log filter passed to env_logger
    pub log_level: String,
    /// How far in the past a one-time reminder may be at startup before
    /// reconciliation prunes it instead of delivering it
    pub reconcile_grace_minutes: i64,
    /// Delivery attempts per fire event before giving up
    pub delivery_max_attempts: u32,
    /// Base backoff between delivery attempts, doubled each retry
    pub delivery_backoff_secs: u64,
}

impl Config {
    /// Build configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "reminders.db".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            reconcile_grace_minutes: parse_env("RECONCILE_GRACE_MINUTES", 10)?,
            delivery_max_attempts: parse_env("DELIVERY_MAX_ATTEMPTS", 3)?,
            delivery_backoff_secs: parse_env("DELIVERY_BACKOFF_SECS", 2)?,
        })
    }

    /// Stale-prune bound as a chrono duration
    pub fn reconcile_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reconcile_grace_minutes)
    }

    /// Base delivery backoff as a std duration
    pub fn delivery_backoff(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.delivery_backoff_secs)
    }
}

/// Parse an env var, falling back to `default` when unset
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_grace_conversion() {
        let config = Config {
            database_path: "reminders.db".to_string(),
            log_level: "info".to_string(),
            reconcile_grace_minutes: 10,
            delivery_max_attempts: 3,
            delivery_backoff_secs: 2,
        };
        assert_eq!(config.reconcile_grace(), chrono::Duration::minutes(10));
        assert_eq!(
            config.delivery_backoff(),
            std::time::Duration::from_secs(2)
        );
    }

    #[test]
    fn test_parse_env_default_when_unset() {
        std::env::remove_var("NUDGE_TEST_UNSET_KEY");
        let value: i64 = parse_env("NUDGE_TEST_UNSET_KEY", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("NUDGE_TEST_GARBAGE_KEY", "not-a-number");
        let result: Result<i64> = parse_env("NUDGE_TEST_GARBAGE_KEY", 0);
        assert!(result.is_err());
        std::env::remove_var("NUDGE_TEST_GARBAGE_KEY");
    }
}
