//! # Database Module
//!
//! SQLite persistence for reminders and user profiles.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Extract ReminderStore trait so the scheduler can be fault-injected
//! - 1.1.0: Store one-time fire instants as RFC 3339 UTC text
//! - 1.0.0: Initial schema with users and reminders tables

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use sqlite::{Connection, ConnectionThreadSafe, State};
use tokio::sync::Mutex;

use crate::core::error::Result;
use crate::core::reminder::{
    validate_offset, validate_text, validate_time_of_day, Reminder, ReminderKind, Schedule,
};

/// Store contract the scheduling core depends on
///
/// `Database` is the SQLite implementation; tests substitute in-memory fakes
/// to inject store faults. All writes are atomic per record; reminders are
/// independent of each other, so no cross-record transactions exist.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Persist a daily reminder, returning the store-assigned id
    async fn create_daily(&self, owner_id: i64, hour: u32, minute: u32, text: &str) -> Result<i64>;

    /// Persist a one-time reminder, returning the store-assigned id
    ///
    /// `run_at` is normalized to UTC before it is written.
    async fn create_once(&self, owner_id: i64, run_at: DateTime<Utc>, text: &str) -> Result<i64>;

    /// Delete a reminder; idempotent, returns whether a row existed
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn exists(&self, id: i64) -> Result<bool>;

    /// Every persisted reminder; used only by startup reconciliation
    async fn list_all(&self) -> Result<Vec<Reminder>>;

    /// A single user's reminders, ordered by id
    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Reminder>>;

    /// The owner's UTC offset, defaulting to 0 when never set
    async fn get_offset(&self, owner_id: i64) -> Result<i32>;

    /// Upsert the owner's UTC offset
    async fn set_offset(&self, owner_id: i64, offset: i32) -> Result<()>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    utc_offset INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS reminders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    hour INTEGER,
    minute INTEGER,
    run_at TEXT,
    text TEXT NOT NULL
);
";

/// SQLite-backed reminder store
///
/// Cloneable handle over a single serialized connection; safe to share
/// across tasks. The kind/field invariant (`hour`/`minute` non-null iff
/// daily, `run_at` non-null iff once) is enforced here when mapping rows,
/// not by the schema.
#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<ConnectionThreadSafe>>,
}

impl Database {
    /// Open (or create) the database at `path` and apply the schema
    ///
    /// Pass `:memory:` for an ephemeral store in tests.
    pub async fn new(path: &str) -> Result<Self> {
        let connection = Connection::open_thread_safe(path)?;
        connection.execute(SCHEMA)?;
        Ok(Database {
            connection: Arc::new(Mutex::new(connection)),
        })
    }
}

#[async_trait]
impl ReminderStore for Database {
    async fn create_daily(&self, owner_id: i64, hour: u32, minute: u32, text: &str) -> Result<i64> {
        validate_time_of_day(hour, minute)?;
        validate_text(text)?;

        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(
            "INSERT INTO reminders (owner_id, kind, hour, minute, text)
             VALUES (?, 'daily', ?, ?, ?)",
        )?;
        statement.bind((1, owner_id))?;
        statement.bind((2, hour as i64))?;
        statement.bind((3, minute as i64))?;
        statement.bind((4, text))?;
        statement.next()?;
        drop(statement);

        last_insert_rowid(&connection)
    }

    async fn create_once(&self, owner_id: i64, run_at: DateTime<Utc>, text: &str) -> Result<i64> {
        validate_text(text)?;

        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(
            "INSERT INTO reminders (owner_id, kind, run_at, text)
             VALUES (?, 'once', ?, ?)",
        )?;
        statement.bind((1, owner_id))?;
        statement.bind((2, run_at.to_rfc3339().as_str()))?;
        statement.bind((3, text))?;
        statement.next()?;
        drop(statement);

        last_insert_rowid(&connection)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare("DELETE FROM reminders WHERE id = ?")?;
        statement.bind((1, id))?;
        statement.next()?;
        drop(statement);
        Ok(connection.change_count() > 0)
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare("SELECT 1 FROM reminders WHERE id = ?")?;
        statement.bind((1, id))?;
        Ok(matches!(statement.next()?, State::Row))
    }

    async fn list_all(&self) -> Result<Vec<Reminder>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(
            "SELECT id, owner_id, kind, hour, minute, run_at, text
             FROM reminders ORDER BY id",
        )?;

        let mut reminders = Vec::new();
        while matches!(statement.next()?, State::Row) {
            if let Some(reminder) = read_reminder(&mut statement)? {
                reminders.push(reminder);
            }
        }
        Ok(reminders)
    }

    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Reminder>> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(
            "SELECT id, owner_id, kind, hour, minute, run_at, text
             FROM reminders WHERE owner_id = ? ORDER BY id",
        )?;
        statement.bind((1, owner_id))?;

        let mut reminders = Vec::new();
        while matches!(statement.next()?, State::Row) {
            if let Some(reminder) = read_reminder(&mut statement)? {
                reminders.push(reminder);
            }
        }
        Ok(reminders)
    }

    async fn get_offset(&self, owner_id: i64) -> Result<i32> {
        let connection = self.connection.lock().await;
        let mut statement = connection.prepare("SELECT utc_offset FROM users WHERE id = ?")?;
        statement.bind((1, owner_id))?;

        if matches!(statement.next()?, State::Row) {
            Ok(statement.read::<i64, _>(0)? as i32)
        } else {
            Ok(0)
        }
    }

    async fn set_offset(&self, owner_id: i64, offset: i32) -> Result<()> {
        validate_offset(offset)?;

        let connection = self.connection.lock().await;
        let mut statement = connection.prepare(
            "INSERT INTO users (id, utc_offset) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET utc_offset = excluded.utc_offset",
        )?;
        statement.bind((1, owner_id))?;
        statement.bind((2, offset as i64))?;
        statement.next()?;
        Ok(())
    }
}

/// Read the reminder under the statement cursor
///
/// Rows violating the kind/field invariant are skipped with a warning so a
/// single corrupt record cannot keep the whole schedule from loading.
fn read_reminder(statement: &mut sqlite::Statement<'_>) -> Result<Option<Reminder>> {
    let id = statement.read::<i64, _>("id")?;
    let owner_id = statement.read::<i64, _>("owner_id")?;
    let kind_raw = statement.read::<String, _>("kind")?;
    let hour = statement.read::<Option<i64>, _>("hour")?;
    let minute = statement.read::<Option<i64>, _>("minute")?;
    let run_at_raw = statement.read::<Option<String>, _>("run_at")?;
    let text = statement.read::<String, _>("text")?;

    let schedule = match ReminderKind::parse(&kind_raw) {
        Some(ReminderKind::Daily) => match (to_time_component(hour), to_time_component(minute)) {
            (Some(hour), Some(minute)) if validate_time_of_day(hour, minute).is_ok() => {
                Schedule::Daily { hour, minute }
            }
            _ => {
                warn!("Skipping daily reminder {id}: missing or out-of-range hour/minute");
                return Ok(None);
            }
        },
        Some(ReminderKind::Once) => match run_at_raw.as_deref().and_then(parse_run_at) {
            Some(run_at) => Schedule::Once { run_at },
            None => {
                warn!("Skipping one-time reminder {id}: missing or unparseable run_at");
                return Ok(None);
            }
        },
        None => {
            warn!("Skipping reminder {id}: unknown kind {kind_raw:?}");
            return Ok(None);
        }
    };

    Ok(Some(Reminder {
        id,
        owner_id,
        schedule,
        text,
    }))
}

fn to_time_component(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn parse_run_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn last_insert_rowid(connection: &ConnectionThreadSafe) -> Result<i64> {
    let mut statement = connection.prepare("SELECT last_insert_rowid()")?;
    statement.next()?;
    Ok(statement.read::<i64, _>(0)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    // Trait must stay object-safe: the scheduler holds an Arc<dyn ReminderStore>
    fn _assert_object_safe(_: &dyn ReminderStore) {}

    async fn memory_db() -> Database {
        Database::new(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_daily_round_trip() {
        let db = memory_db().await;
        let id = db.create_daily(100, 8, 30, "take my medication").await.unwrap();
        assert!(id > 0);
        assert!(db.exists(id).await.unwrap());

        let all = db.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].owner_id, 100);
        assert_eq!(all[0].schedule, Schedule::Daily { hour: 8, minute: 30 });
        assert_eq!(all[0].text, "take my medication");
    }

    #[tokio::test]
    async fn test_create_once_normalizes_to_utc() {
        let db = memory_db().await;
        // 10:00 at +02:00 is 08:00Z
        let local = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 10, 0, 0)
            .unwrap();
        let id = db
            .create_once(7, local.with_timezone(&Utc), "meeting")
            .await
            .unwrap();

        let all = db.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(
            all[0].schedule,
            Schedule::Once {
                run_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
            }
        );
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_increasing() {
        let db = memory_db().await;
        let a = db.create_daily(1, 8, 0, "first").await.unwrap();
        let b = db.create_daily(1, 9, 0, "second").await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let db = memory_db().await;
        let id = db.create_daily(1, 8, 0, "gone soon").await.unwrap();

        assert!(db.delete(id).await.unwrap());
        assert!(!db.exists(id).await.unwrap());
        // Second delete is a no-op, not an error
        assert!(!db.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_offset_defaults_to_zero() {
        let db = memory_db().await;
        assert_eq!(db.get_offset(999).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offset_upsert() {
        let db = memory_db().await;
        db.set_offset(5, -5).await.unwrap();
        assert_eq!(db.get_offset(5).await.unwrap(), -5);
        db.set_offset(5, 9).await.unwrap();
        assert_eq!(db.get_offset(5).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_set_offset_rejects_out_of_range() {
        let db = memory_db().await;
        assert!(db.set_offset(5, 15).await.is_err());
        assert!(db.set_offset(5, -13).await.is_err());
        assert_eq!(db.get_offset(5).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_fields() {
        let db = memory_db().await;
        assert!(db.create_daily(1, 24, 0, "bad hour").await.is_err());
        assert!(db.create_daily(1, 0, 60, "bad minute").await.is_err());
        assert!(db.create_daily(1, 8, 0, "  ").await.is_err());
        assert!(db.create_once(1, Utc::now(), "").await.is_err());
        assert!(db.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_for_owner_filters() {
        let db = memory_db().await;
        db.create_daily(1, 8, 0, "mine").await.unwrap();
        db.create_daily(2, 9, 0, "theirs").await.unwrap();
        db.create_once(1, Utc::now(), "also mine").await.unwrap();

        let mine = db.list_for_owner(1).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|r| r.owner_id == 1));
    }

    #[tokio::test]
    async fn test_list_all_skips_invariant_violations() {
        let db = memory_db().await;
        db.create_daily(1, 8, 0, "good").await.unwrap();
        {
            // A daily row without hour/minute and a row of unknown kind
            let connection = db.connection.lock().await;
            connection
                .execute(
                    "INSERT INTO reminders (owner_id, kind, text) VALUES (1, 'daily', 'broken');
                     INSERT INTO reminders (owner_id, kind, text) VALUES (1, 'weekly', 'odd');",
                )
                .unwrap();
        }

        let all = db.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "good");
    }
}
