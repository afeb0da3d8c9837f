//! Error types for ics-reminder.

use thiserror::Error;

/// Errors that can occur while running a reminder pass.
#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to fetch calendar feed: {0}")]
    Transport(String),

    #[error("Malformed calendar feed: {0}")]
    MalformedFeed(String),

    #[error("Failed to deliver notification: {0}")]
    Delivery(String),

    #[error("Ledger storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Event '{0}' is already recorded in the ledger")]
    DuplicateKey(String),

    #[error("Ledger {0} is in use by another run")]
    LedgerLocked(String),

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("Local time {datetime} does not exist in {tzid}")]
    NonexistentLocalTime { datetime: String, tzid: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReminderError {
    /// Whether this error only concerns a single event, leaving the rest of
    /// the run unaffected.
    pub fn is_per_event(&self) -> bool {
        matches!(
            self,
            ReminderError::Delivery(_)
                | ReminderError::UnknownTimezone(_)
                | ReminderError::NonexistentLocalTime { .. }
        )
    }
}

/// Result type alias for ics-reminder operations.
pub type ReminderResult<T> = Result<T, ReminderError>;
