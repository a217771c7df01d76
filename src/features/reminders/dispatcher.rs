//! Fire-time dispatch with bounded retry
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.0.0: Initial implementation with exponential backoff and request ids

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::sleep;
use uuid::Uuid;

use crate::core::reminder::Reminder;
use crate::features::reminders::sink::NotificationSink;

/// Retry policy applied to every fire event
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    /// Delivery attempts before giving up on this fire event
    pub max_attempts: u32,
    /// Delay before the first retry, doubled after each further failure
    pub backoff: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// What happened to a single fire event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The sink accepted the notification
    Delivered,
    /// Every attempt failed; the reminder record must stay persisted
    RetriesExhausted,
}

/// The fire-time callback: pushes one reminder through the sink
///
/// All sink errors are treated as transient. The dispatcher never returns an
/// error: exhausted retries are an outcome the scheduler handles (keep the
/// record, re-arm dailies), not a fault that should unwind a timer task.
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, policy: DispatchPolicy) -> Self {
        Self { sink, policy }
    }

    /// Deliver `reminder` under the retry policy
    pub async fn dispatch(&self, reminder: &Reminder) -> DispatchOutcome {
        let request_id = Uuid::new_v4();
        let attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.backoff;

        for attempt in 1..=attempts {
            match self.sink.deliver(reminder.owner_id, &reminder.text).await {
                Ok(()) => {
                    debug!(
                        "[{request_id}] Delivered reminder {} to {} (attempt {attempt}/{attempts})",
                        reminder.id, reminder.owner_id
                    );
                    return DispatchOutcome::Delivered;
                }
                Err(e) => {
                    warn!(
                        "[{request_id}] Delivery attempt {attempt}/{attempts} for reminder {} failed: {e}",
                        reminder.id
                    );
                    if attempt < attempts {
                        sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        warn!(
            "[{request_id}] Giving up on reminder {} after {attempts} attempts",
            reminder.id
        );
        DispatchOutcome::RetriesExhausted
    }
}
