//! Reminder scheduling engine
//!
//! Owns every live timer: the only component allowed to create or cancel
//! them. Daily reminders are modeled as self-reinstalling one-shot timers:
//! each firing re-derives the next occurrence from the owner's *current*
//! UTC offset, so timezone changes take effect from the next occurrence
//! onward, never retroactively.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.2.0: Configurable grace bound for pruning stale one-time reminders
//! - 1.1.0: Startup reconciliation rebuilds the schedule from the store
//! - 1.0.0: Initial arm/cancel/fire loop

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, error, info};
use tokio::task::JoinHandle;

use crate::core::error::{Error, Result};
use crate::core::reminder::{
    format_offset, format_time, next_daily_occurrence, once_delay, Reminder, ReminderKind,
    Schedule, UserProfile,
};
use crate::database::ReminderStore;
use crate::features::reminders::dispatcher::{DispatchOutcome, Dispatcher};

/// An armed timer for one reminder
///
/// In-memory only, never persisted; the map key is the reminder id. Dropped
/// when the timer fires without re-arming, when the reminder is cancelled,
/// or at shutdown.
struct ScheduledJob {
    /// Distinguishes this arming from any later re-arm of the same id, so a
    /// firing timer only ever removes its own map entry
    token: u64,
    fire_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// Counts from a startup reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub daily_armed: usize,
    pub once_armed: usize,
    pub stale_pruned: usize,
}

struct SchedulerInner {
    store: Arc<dyn ReminderStore>,
    dispatcher: Dispatcher,
    jobs: DashMap<i64, ScheduledJob>,
    next_token: AtomicU64,
    /// One-time reminders further in the past than this at reconcile are
    /// pruned unsent
    grace: Duration,
}

impl SchedulerInner {
    /// Install (or replace) the timer for one reminder
    ///
    /// The task is spawned while the map entry is locked: a zero-delay fire
    /// cannot observe the map before its own job is inserted, and any
    /// superseded timer is aborted before the entry is released, keeping at
    /// most one live timer per id.
    fn arm(inner: &Arc<Self>, reminder: Reminder, fire_at: DateTime<Utc>) {
        let id = reminder.id;
        let token = inner.next_token.fetch_add(1, Ordering::Relaxed);
        match inner.jobs.entry(id) {
            Entry::Occupied(mut occupied) => {
                let handle = tokio::spawn(run_timer(Arc::clone(inner), reminder, fire_at, token));
                let old = occupied.insert(ScheduledJob {
                    token,
                    fire_at,
                    handle,
                });
                old.handle.abort();
            }
            Entry::Vacant(vacant) => {
                let handle = tokio::spawn(run_timer(Arc::clone(inner), reminder, fire_at, token));
                vacant.insert(ScheduledJob {
                    token,
                    fire_at,
                    handle,
                });
            }
        }
    }
}

/// One-shot timer task: sleep until the fire instant, dispatch, bookkeep
///
/// Returns a boxed future because a daily firing re-arms, which spawns this
/// future again.
fn run_timer(
    inner: Arc<SchedulerInner>,
    reminder: Reminder,
    fire_at: DateTime<Utc>,
    token: u64,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        tokio::time::sleep(once_delay(Utc::now(), fire_at)).await;

        // The dispatch is now in flight: drop our map entry first so a
        // concurrent cancel reports NotFound instead of aborting mid-send.
        // Token-guarded so a concurrent re-arm's fresh entry survives.
        inner.jobs.remove_if(&reminder.id, |_, job| job.token == token);

        let outcome = inner.dispatcher.dispatch(&reminder).await;

        match reminder.kind() {
            ReminderKind::Once => match outcome {
                DispatchOutcome::Delivered => {
                    if let Err(e) = inner.store.delete(reminder.id).await {
                        error!(
                            "Failed to delete delivered one-time reminder {}: {e}",
                            reminder.id
                        );
                    }
                }
                DispatchOutcome::RetriesExhausted => {
                    // Record stays persisted; the next startup reconcile
                    // retries it within the grace bound.
                }
            },
            ReminderKind::Daily => rearm_daily(&inner, reminder).await,
        }
    })
}

/// Install tomorrow's occurrence after a daily firing
///
/// Runs regardless of the delivery outcome so one transient failure cannot
/// desynchronize the recurrence. The record's existence is re-checked first:
/// a reminder deleted while its dispatch was in flight stays cancelled, and
/// the owner's offset is re-read so timezone changes apply from here on.
async fn rearm_daily(inner: &Arc<SchedulerInner>, reminder: Reminder) {
    let Schedule::Daily { hour, minute } = reminder.schedule else {
        return;
    };

    match inner.store.exists(reminder.id).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(
                "Daily reminder {} deleted mid-dispatch; not re-arming",
                reminder.id
            );
            return;
        }
        Err(e) => {
            error!(
                "Store unreachable while re-arming daily reminder {}: {e}",
                reminder.id
            );
            return;
        }
    }

    let offset = match inner.store.get_offset(reminder.owner_id).await {
        Ok(offset) => offset,
        Err(e) => {
            error!(
                "Failed to read offset for daily reminder {}: {e}",
                reminder.id
            );
            return;
        }
    };

    match next_daily_occurrence(Utc::now(), hour, minute, offset) {
        Ok(next) => {
            debug!("Re-armed daily reminder {} for {next}", reminder.id);
            SchedulerInner::arm(inner, reminder, next);
        }
        Err(e) => error!("Failed to re-arm daily reminder {}: {e}", reminder.id),
    }
}

/// Single source of truth for what is currently armed
///
/// Cloneable handle; all clones share one schedule. The raw id→job map is
/// never exposed; arm, cancel, reconcile, and the snapshot accessors are
/// the only ways in.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<SchedulerInner>,
}

impl ReminderScheduler {
    pub fn new(store: Arc<dyn ReminderStore>, dispatcher: Dispatcher, grace: Duration) -> Self {
        ReminderScheduler {
            inner: Arc::new(SchedulerInner {
                store,
                dispatcher,
                jobs: DashMap::new(),
                next_token: AtomicU64::new(0),
                grace,
            }),
        }
    }

    /// Arm the next occurrence of a daily reminder
    ///
    /// Pure in-memory computation: derives the next occurrence of the
    /// reminder's time of day in the profile's timezone (a local time at or
    /// before now rolls to tomorrow) and installs a one-shot timer for it.
    /// Returns the computed fire instant.
    pub fn arm_daily(&self, reminder: &Reminder, profile: &UserProfile) -> Result<DateTime<Utc>> {
        let Schedule::Daily { hour, minute } = reminder.schedule else {
            return Err(Error::Validation(format!(
                "reminder {} is not daily",
                reminder.id
            )));
        };

        let fire_at = next_daily_occurrence(Utc::now(), hour, minute, profile.utc_offset)?;
        SchedulerInner::arm(&self.inner, reminder.clone(), fire_at);
        debug!(
            "Armed daily reminder {} ({} {}) for {fire_at}",
            reminder.id,
            format_time(hour, minute),
            format_offset(profile.utc_offset)
        );
        Ok(fire_at)
    }

    /// Arm a one-time reminder for its absolute target instant
    ///
    /// A `run_at` already in the past arms with zero delay instead of being
    /// dropped, so reminders that elapsed during a short outage still fire.
    pub fn arm_once(&self, reminder: &Reminder) -> Result<DateTime<Utc>> {
        let Schedule::Once { run_at } = reminder.schedule else {
            return Err(Error::Validation(format!(
                "reminder {} is not one-time",
                reminder.id
            )));
        };

        SchedulerInner::arm(&self.inner, reminder.clone(), run_at);
        debug!("Armed one-time reminder {} for {run_at}", reminder.id);
        Ok(run_at)
    }

    /// Cancel the live timer for `id`
    ///
    /// Returns `NotFound` when no timer is armed; the store is never
    /// touched. Only future firings are prevented: a dispatch already in
    /// flight has removed its own entry and completes undisturbed.
    pub fn cancel(&self, id: i64) -> Result<()> {
        match self.inner.jobs.remove(&id) {
            Some((_, job)) => {
                job.handle.abort();
                debug!("Cancelled timer for reminder {id}");
                Ok(())
            }
            None => Err(Error::NotFound(id)),
        }
    }

    /// Validate, persist, then arm a new daily reminder
    ///
    /// The store write strictly precedes arming: a failed write arms
    /// nothing, so a live timer can never exist without a durable record.
    pub async fn create_daily(
        &self,
        owner_id: i64,
        hour: u32,
        minute: u32,
        text: &str,
    ) -> Result<(i64, DateTime<Utc>)> {
        let id = self
            .inner
            .store
            .create_daily(owner_id, hour, minute, text)
            .await?;
        let offset = self.inner.store.get_offset(owner_id).await?;

        let reminder = Reminder {
            id,
            owner_id,
            schedule: Schedule::Daily { hour, minute },
            text: text.to_string(),
        };
        let fire_at = self.arm_daily(&reminder, &UserProfile::new(owner_id, offset))?;
        info!(
            "Created daily reminder {id} for {owner_id} at {} {}",
            format_time(hour, minute),
            format_offset(offset)
        );
        Ok((id, fire_at))
    }

    /// Validate, persist, then arm a new one-time reminder
    pub async fn create_once(
        &self,
        owner_id: i64,
        run_at: DateTime<Utc>,
        text: &str,
    ) -> Result<(i64, DateTime<Utc>)> {
        let id = self.inner.store.create_once(owner_id, run_at, text).await?;

        let reminder = Reminder {
            id,
            owner_id,
            schedule: Schedule::Once { run_at },
            text: text.to_string(),
        };
        let fire_at = self.arm_once(&reminder)?;
        info!("Created one-time reminder {id} for {owner_id} due {run_at}");
        Ok((id, fire_at))
    }

    /// Delete a reminder from the store and cancel its timer
    ///
    /// Returns `NotFound` when neither a record nor a live timer existed.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let existed = self.inner.store.delete(id).await?;
        let had_job = self.cancel(id).is_ok();
        if existed || had_job {
            info!("Deleted reminder {id}");
            Ok(())
        } else {
            Err(Error::NotFound(id))
        }
    }

    /// Rebuild the live schedule from the store
    ///
    /// Called exactly once at startup, before any user-facing command is
    /// accepted. Arms the next occurrence of every daily reminder (missed
    /// past occurrences are never re-delivered), arms every pending one-time
    /// reminder, and prunes one-time reminders whose fire time is further in
    /// the past than the grace bound; those are stale, not owed. Idempotent:
    /// a second pass arms the same instants. A store failure here is fatal;
    /// the service cannot start with an unknown schedule state.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let reminders = self.inner.store.list_all().await?;
        info!("Reconciling {} reminders from the store", reminders.len());

        let mut report = ReconcileReport::default();
        for reminder in reminders {
            match reminder.schedule {
                Schedule::Daily { hour, minute } => {
                    let offset = self.inner.store.get_offset(reminder.owner_id).await?;
                    let profile = UserProfile::new(reminder.owner_id, offset);
                    match self.arm_daily(&reminder, &profile) {
                        Ok(fire_at) => {
                            info!(
                                "Reloaded daily reminder {} at {} {} (next fire {fire_at})",
                                reminder.id,
                                format_time(hour, minute),
                                format_offset(offset)
                            );
                            report.daily_armed += 1;
                        }
                        Err(e) => error!("Could not arm daily reminder {}: {e}", reminder.id),
                    }
                }
                Schedule::Once { run_at } => {
                    if run_at < Utc::now() - self.inner.grace {
                        self.inner.store.delete(reminder.id).await?;
                        info!(
                            "Pruned stale one-time reminder {} (was due {run_at})",
                            reminder.id
                        );
                        report.stale_pruned += 1;
                    } else {
                        match self.arm_once(&reminder) {
                            Ok(_) => {
                                info!("Reloaded one-time reminder {} due {run_at}", reminder.id);
                                report.once_armed += 1;
                            }
                            Err(e) => {
                                error!("Could not arm one-time reminder {}: {e}", reminder.id)
                            }
                        }
                    }
                }
            }
        }
        Ok(report)
    }

    /// Abort every live timer and clear the schedule
    pub fn shutdown(&self) {
        for entry in self.inner.jobs.iter() {
            entry.handle.abort();
        }
        self.inner.jobs.clear();
        info!("Scheduler shut down; all timers cancelled");
    }

    /// Number of currently armed timers
    pub fn armed_count(&self) -> usize {
        self.inner.jobs.len()
    }

    /// Next fire instant for one reminder, if a timer is armed
    pub fn armed_fire_at(&self, id: i64) -> Option<DateTime<Utc>> {
        self.inner.jobs.get(&id).map(|job| job.fire_at)
    }

    /// Snapshot of (reminder id, fire instant) pairs for every armed timer
    pub fn armed_fire_times(&self) -> Vec<(i64, DateTime<Utc>)> {
        self.inner
            .jobs
            .iter()
            .map(|entry| (*entry.key(), entry.fire_at))
            .collect()
    }
}
