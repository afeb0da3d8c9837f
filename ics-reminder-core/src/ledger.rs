//! Sent ledger: the durable record of which events were already notified.
//!
//! Backed by a single SQLite table `sent(uid, sent_at)`. A record exists for
//! an event id iff a notification for it was delivered at least once. Rows
//! are only ever inserted.
//!
//! Opening a file-backed ledger also takes an exclusive lock on
//! `<path>.lock`, held until the ledger is closed or dropped. Two runs can
//! therefore never check-then-record against the same file concurrently.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use fs2::FileExt;
use rusqlite::{Connection, ErrorCode, params};
use tracing::{debug, info};

use crate::error::{ReminderError, ReminderResult};

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS sent (
    uid TEXT PRIMARY KEY,
    sent_at TEXT NOT NULL
);";

/// A ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub event_id: String,
    /// None for rows whose timestamp could not be read back
    pub notified_at: Option<DateTime<Utc>>,
}

/// Releases the run lock when dropped.
struct LockGuard {
    _file: File,
}

pub struct Ledger {
    conn: Connection,
    _lock: Option<LockGuard>,
}

impl Ledger {
    /// Open (or create) the ledger file at `path`.
    ///
    /// Creates the parent directory and the `sent` table if missing, so
    /// opening the same path repeatedly is safe. Fails with `LedgerLocked`
    /// if another run holds the ledger.
    pub fn open(path: &Path) -> ReminderResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock = acquire_lock(path)?;
        let conn = Connection::open(path)?;
        bootstrap(&conn)?;

        info!(path = %path.display(), "Opened sent ledger");

        Ok(Ledger {
            conn,
            _lock: Some(lock),
        })
    }

    /// Open a throwaway ledger that lives only as long as this value.
    pub fn open_in_memory() -> ReminderResult<Self> {
        let conn = Connection::open_in_memory()?;
        bootstrap(&conn)?;

        Ok(Ledger { conn, _lock: None })
    }

    pub fn has_notified(&self, event_id: &str) -> ReminderResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sent WHERE uid = ?1)",
            params![event_id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    /// Record that `event_id` was notified at `at`.
    ///
    /// A single autocommit INSERT: the row is durable once this returns.
    /// Recording the same id twice fails with `DuplicateKey`.
    pub fn record_notified(&self, event_id: &str, at: DateTime<Utc>) -> ReminderResult<()> {
        let sent_at = at.to_rfc3339_opts(SecondsFormat::Secs, true);

        match self.conn.execute(
            "INSERT INTO sent (uid, sent_at) VALUES (?1, ?2)",
            params![event_id, sent_at],
        ) {
            Ok(_) => {
                debug!(event_id, sent_at = %sent_at, "Recorded notification");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(ReminderError::DuplicateKey(event_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// All records, oldest first.
    pub fn records(&self) -> ReminderResult<Vec<NotificationRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid, sent_at FROM sent ORDER BY sent_at, uid")?;

        let records = stmt
            .query_map([], |row| {
                let event_id: String = row.get(0)?;
                let sent_at: Option<String> = row.get(1)?;
                Ok(NotificationRecord {
                    event_id,
                    notified_at: sent_at.as_deref().and_then(parse_timestamp),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Close the connection and release the run lock.
    pub fn close(self) -> ReminderResult<()> {
        let Ledger { conn, _lock } = self;
        conn.close().map_err(|(_, err)| ReminderError::Storage(err))?;
        Ok(())
    }
}

fn bootstrap(conn: &Connection) -> ReminderResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

fn lock_path(path: &Path) -> PathBuf {
    let mut lock = path.as_os_str().to_owned();
    lock.push(".lock");
    PathBuf::from(lock)
}

fn acquire_lock(path: &Path) -> ReminderResult<LockGuard> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path(path))?;

    file.try_lock_exclusive()
        .map_err(|_| ReminderError::LedgerLocked(path.display().to_string()))?;

    Ok(LockGuard { _file: file })
}

/// Accepts RFC 3339 and the naive ISO-8601 stamps older ledgers contain.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
