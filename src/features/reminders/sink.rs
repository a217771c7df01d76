//! Notification sink boundary
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use anyhow::Result;
use async_trait::async_trait;
use log::info;

/// Delivery contract between the scheduling core and the transport
///
/// The core only needs one call: deliver `text` to `recipient_id`. Any error
/// is treated as transient and retried by the dispatcher under its bounded
/// backoff policy; the transport itself (chat API, webhook, ...) lives
/// entirely behind this trait.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, recipient_id: i64, text: &str) -> Result<()>;
}

/// Sink that writes reminders to the process log
///
/// The daemon binary uses this when no real transport is wired in; it never
/// fails, which also makes it convenient for local runs.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, recipient_id: i64, text: &str) -> Result<()> {
        info!("⏰ Reminder for {recipient_id}: {text}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test that the trait is object-safe (the dispatcher holds a dyn sink)
    fn _assert_object_safe(_: &dyn NotificationSink) {}

    #[tokio::test]
    async fn test_log_sink_never_fails() {
        assert!(LogSink.deliver(1, "hello").await.is_ok());
    }
}
