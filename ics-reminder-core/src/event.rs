//! Calendar events as read from the feed.
//!
//! Events are recomputed from the feed on every run; nothing here is
//! persisted. The ledger only ever stores an event's `id`.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{ReminderError, ReminderResult};

/// Placeholder title for events without a SUMMARY.
pub const UNTITLED: &str = "(No title)";

/// A single event instance from the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    /// Dedup key (UID, plus RECURRENCE-ID for overridden instances)
    pub id: String,
    pub title: String,
    pub body: String,
    pub start: EventStart,
}

/// Start time of an event, as written in the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum EventStart {
    /// All-day event
    Date(NaiveDate),
    /// `DTSTART:20250320T150000Z`
    Utc(DateTime<Utc>),
    /// `DTSTART:20250320T150000` (no zone information)
    Floating(NaiveDateTime),
    /// `DTSTART;TZID=Europe/Berlin:20250320T150000`
    Zoned { datetime: NaiveDateTime, tzid: String },
}

impl EventStart {
    /// Normalize to an absolute instant.
    ///
    /// Floating times and all-day dates are read as UTC. A TZID that is not
    /// in the IANA database is an error rather than a silent UTC fallback.
    pub fn to_utc(&self) -> ReminderResult<DateTime<Utc>> {
        match self {
            EventStart::Utc(dt) => Ok(*dt),
            EventStart::Floating(naive) => Ok(naive.and_utc()),
            EventStart::Date(date) => Ok(date.and_time(chrono::NaiveTime::MIN).and_utc()),
            EventStart::Zoned { datetime, tzid } => {
                let tz = parse_tz(tzid)?;
                // Wall-clock times inside a DST gap are moved one hour forward.
                let shifted = *datetime + chrono::Duration::hours(1);
                let local = tz
                    .from_local_datetime(datetime)
                    .earliest()
                    .or_else(|| tz.from_local_datetime(&shifted).earliest())
                    .ok_or_else(|| ReminderError::NonexistentLocalTime {
                        datetime: datetime.to_string(),
                        tzid: tzid.clone(),
                    })?;
                Ok(local.with_timezone(&Utc))
            }
        }
    }

    /// Human-readable start, in the event's own zone when it has one.
    pub fn display(&self) -> ReminderResult<String> {
        match self {
            EventStart::Date(date) => Ok(format!("{} (all day)", date.format("%Y-%m-%d"))),
            EventStart::Zoned { tzid, .. } => {
                let tz = parse_tz(tzid)?;
                Ok(self
                    .to_utc()?
                    .with_timezone(&tz)
                    .format("%Y-%m-%d %H:%M %Z")
                    .to_string())
            }
            EventStart::Utc(_) | EventStart::Floating(_) => {
                Ok(self.to_utc()?.format("%Y-%m-%d %H:%M UTC").to_string())
            }
        }
    }
}

fn parse_tz(tzid: &str) -> ReminderResult<Tz> {
    tzid.parse::<Tz>()
        .map_err(|_| ReminderError::UnknownTimezone(tzid.to_string()))
}

impl fmt::Display for CalendarEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}
