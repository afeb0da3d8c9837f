//! Reminder window.

use chrono::{DateTime, Duration, Utc};

/// Whether an event starting at `event_start` should be reminded about now.
///
/// True iff `0 <= event_start - now <= horizon`, inclusive on both ends.
/// Past events are never due; events beyond the horizon are picked up by a
/// later run.
pub fn is_due(event_start: DateTime<Utc>, now: DateTime<Utc>, horizon: Duration) -> bool {
    let delta = event_start - now;
    delta >= Duration::zero() && delta <= horizon
}
