//! Reminder domain types and scheduling time math
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Tagged Schedule variant replaces separate kind/hour/minute/run_at fields
//! - 1.0.0: Initial domain types with offset-aware next-occurrence computation

use chrono::{DateTime, Duration, FixedOffset, LocalResult, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

/// Smallest accepted user UTC offset, in whole hours
pub const MIN_UTC_OFFSET: i32 = -12;
/// Largest accepted user UTC offset, in whole hours
pub const MAX_UTC_OFFSET: i32 = 14;

/// The two recurrence kinds a reminder can have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    /// Recurs every day at a fixed local time until cancelled
    Daily,
    /// Fires a single time at an absolute instant, then is deleted
    Once,
}

impl ReminderKind {
    /// String representation used in the `reminders.kind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::Daily => "daily",
            ReminderKind::Once => "once",
        }
    }

    /// Parse a `kind` column value; returns None for anything unrecognized
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(ReminderKind::Daily),
            "once" => Some(ReminderKind::Once),
            _ => None,
        }
    }
}

/// When a reminder fires
///
/// The variant is the recurrence kind: `Daily` carries the owner-local
/// wall-clock time of day, `Once` carries an absolute UTC instant. Exactly
/// one of the two exists by construction, so the kind/field invariant cannot
/// be violated in memory; only a corrupt store row can, and the database
/// layer rejects those when mapping rows back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    Daily { hour: u32, minute: u32 },
    Once { run_at: DateTime<Utc> },
}

impl Schedule {
    pub fn kind(&self) -> ReminderKind {
        match self {
            Schedule::Daily { .. } => ReminderKind::Daily,
            Schedule::Once { .. } => ReminderKind::Once,
        }
    }
}

/// A persisted reminder: who to notify, when, and with what text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Store-assigned id, stable for the reminder's lifetime
    pub id: i64,
    /// Recipient identity; also the key for the owner's UTC offset
    pub owner_id: i64,
    pub schedule: Schedule,
    /// Opaque payload delivered verbatim to the notification sink
    pub text: String,
}

impl Reminder {
    pub fn kind(&self) -> ReminderKind {
        self.schedule.kind()
    }
}

/// Per-user settings the scheduler needs at arm time
///
/// Created implicitly on first interaction: reads default the offset to 0
/// when no row exists yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub owner_id: i64,
    /// Whole-hour offset from UTC, in [-12, +14]
    pub utc_offset: i32,
}

impl UserProfile {
    pub fn new(owner_id: i64, utc_offset: i32) -> Self {
        Self {
            owner_id,
            utc_offset,
        }
    }
}

/// Reject an out-of-range wall-clock time of day
pub fn validate_time_of_day(hour: u32, minute: u32) -> Result<()> {
    if hour > 23 {
        return Err(Error::Validation(format!("hour {hour} out of range 0-23")));
    }
    if minute > 59 {
        return Err(Error::Validation(format!(
            "minute {minute} out of range 0-59"
        )));
    }
    Ok(())
}

/// Reject a UTC offset outside [-12, +14]
pub fn validate_offset(offset: i32) -> Result<()> {
    if !(MIN_UTC_OFFSET..=MAX_UTC_OFFSET).contains(&offset) {
        return Err(Error::Validation(format!(
            "utc offset {offset} out of range {MIN_UTC_OFFSET} to +{MAX_UTC_OFFSET}"
        )));
    }
    Ok(())
}

/// Reject an empty reminder payload
pub fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::Validation("reminder text is empty".to_string()));
    }
    Ok(())
}

/// Compute the next occurrence of `hour:minute` in the owner's timezone
///
/// If the local time today is already past (inclusive: "now equals target"
/// rolls over, so repeated arming within the target minute never double-fires)
/// the occurrence is tomorrow at the same local time. The returned instant is
/// strictly after `now` and at most 24 hours away.
pub fn next_daily_occurrence(
    now: DateTime<Utc>,
    hour: u32,
    minute: u32,
    utc_offset: i32,
) -> Result<DateTime<Utc>> {
    validate_time_of_day(hour, minute)?;
    validate_offset(utc_offset)?;

    let tz = FixedOffset::east_opt(utc_offset * 3600)
        .ok_or_else(|| Error::Validation(format!("utc offset {utc_offset} not representable")))?;
    let now_local = now.with_timezone(&tz);

    let naive = now_local
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| Error::Validation(format!("invalid time of day {hour:02}:{minute:02}")))?;

    // Fixed offsets have no DST, so local datetimes are never ambiguous.
    let today = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        _ => {
            return Err(Error::Validation(format!(
                "unrepresentable local time {hour:02}:{minute:02} at offset {utc_offset}"
            )))
        }
    };

    let next = if today <= now_local {
        today + Duration::days(1)
    } else {
        today
    };

    Ok(next.with_timezone(&Utc))
}

/// Delay until a one-time reminder's target instant, clamped to zero
///
/// A `run_at` that already elapsed (e.g. the process was down for a short
/// gap) yields a zero delay so the reminder is delivered as soon as possible
/// instead of being dropped.
pub fn once_delay(now: DateTime<Utc>, run_at: DateTime<Utc>) -> std::time::Duration {
    (run_at - now).to_std().unwrap_or(std::time::Duration::ZERO)
}

/// Format hour and minute as an HH:MM string
pub fn format_time(hour: u32, minute: u32) -> String {
    format!("{hour:02}:{minute:02}")
}

/// Format a UTC offset as UTC+N / UTC-N
pub fn format_offset(offset: i32) -> String {
    if offset >= 0 {
        format!("UTC+{offset}")
    } else {
        format!("UTC{offset}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_next_daily_rolls_to_tomorrow_when_passed() {
        // 08:00 at UTC-5 has already passed at 14:00Z (09:00 local),
        // so the next fire is tomorrow 08:00 local = 13:00Z.
        let now = utc(2024, 1, 1, 14, 0, 0);
        let next = next_daily_occurrence(now, 8, 0, -5).unwrap();
        assert_eq!(next, utc(2024, 1, 2, 13, 0, 0));
    }

    #[test]
    fn test_next_daily_today_when_still_ahead() {
        // 18:30 at UTC+2 is still ahead at 14:00Z (16:00 local).
        let now = utc(2024, 1, 1, 14, 0, 0);
        let next = next_daily_occurrence(now, 18, 30, 2).unwrap();
        assert_eq!(next, utc(2024, 1, 1, 16, 30, 0));
    }

    #[test]
    fn test_next_daily_exact_match_rolls_over() {
        // Now is exactly the target local time: counts as passed.
        let now = utc(2024, 1, 1, 13, 0, 0);
        let next = next_daily_occurrence(now, 8, 0, -5).unwrap();
        assert_eq!(next, utc(2024, 1, 2, 13, 0, 0));
    }

    #[test]
    fn test_next_daily_strictly_future_within_24h() {
        let now = utc(2024, 6, 15, 11, 42, 17);
        for offset in [MIN_UTC_OFFSET, -5, 0, 2, 9, MAX_UTC_OFFSET] {
            for (hour, minute) in [(0, 0), (8, 0), (11, 42), (12, 1), (23, 59)] {
                let next = next_daily_occurrence(now, hour, minute, offset).unwrap();
                assert!(next > now, "fire at {next} not after {now} ({hour}:{minute} {offset})");
                assert!(
                    next - now <= Duration::hours(24),
                    "fire at {next} more than 24h after {now} ({hour}:{minute} {offset})"
                );
            }
        }
    }

    #[test]
    fn test_next_daily_extreme_offsets() {
        let now = utc(2024, 3, 10, 0, 0, 0);
        // UTC+14: local time is 14:00 on Mar 10; 06:00 local already passed.
        let next = next_daily_occurrence(now, 6, 0, 14).unwrap();
        assert_eq!(next, utc(2024, 3, 10, 16, 0, 0));
        // UTC-12: local time is 12:00 on Mar 9; 13:00 local is still ahead.
        let next = next_daily_occurrence(now, 13, 0, -12).unwrap();
        assert_eq!(next, utc(2024, 3, 10, 1, 0, 0));
    }

    #[test]
    fn test_next_daily_rejects_bad_inputs() {
        let now = utc(2024, 1, 1, 0, 0, 0);
        assert!(matches!(
            next_daily_occurrence(now, 24, 0, 0),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            next_daily_occurrence(now, 0, 60, 0),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            next_daily_occurrence(now, 0, 0, 15),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            next_daily_occurrence(now, 0, 0, -13),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_once_delay_clamps_past_to_zero() {
        let now = utc(2024, 1, 1, 12, 0, 0);
        assert_eq!(
            once_delay(now, utc(2024, 1, 1, 11, 0, 0)),
            std::time::Duration::ZERO
        );
        assert_eq!(
            once_delay(now, utc(2024, 1, 1, 12, 0, 30)),
            std::time::Duration::from_secs(30)
        );
    }

    #[test]
    fn test_validate_offset_bounds() {
        assert!(validate_offset(0).is_ok());
        assert!(validate_offset(MIN_UTC_OFFSET).is_ok());
        assert!(validate_offset(MAX_UTC_OFFSET).is_ok());
        assert!(validate_offset(MIN_UTC_OFFSET - 1).is_err());
        assert!(validate_offset(MAX_UTC_OFFSET + 1).is_err());
    }

    #[test]
    fn test_validate_text_rejects_empty() {
        assert!(validate_text("take my medication").is_ok());
        assert!(validate_text("").is_err());
        assert!(validate_text("   ").is_err());
    }

    #[test]
    fn test_kind_round_trip() {
        assert_eq!(ReminderKind::parse("daily"), Some(ReminderKind::Daily));
        assert_eq!(ReminderKind::parse("once"), Some(ReminderKind::Once));
        assert_eq!(ReminderKind::parse("weekly"), None);
        assert_eq!(ReminderKind::Daily.as_str(), "daily");
        assert_eq!(ReminderKind::Once.as_str(), "once");
    }

    #[test]
    fn test_schedule_kind() {
        let daily = Schedule::Daily { hour: 8, minute: 0 };
        assert_eq!(daily.kind(), ReminderKind::Daily);
        let once = Schedule::Once {
            run_at: utc(2024, 1, 1, 0, 0, 0),
        };
        assert_eq!(once.kind(), ReminderKind::Once);
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_time(8, 5), "08:05");
        assert_eq!(format_time(23, 59), "23:59");
        assert_eq!(format_offset(0), "UTC+0");
        assert_eq!(format_offset(9), "UTC+9");
        assert_eq!(format_offset(-5), "UTC-5");
    }
}
