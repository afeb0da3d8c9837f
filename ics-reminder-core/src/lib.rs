//! Core library for ics-reminder.
//!
//! - `ics` / `event`: reading calendar feeds into events
//! - `window`: deciding whether an event is due for a reminder
//! - `ledger`: the durable record of reminders already sent
//! - `feed` / `notifier`: HTTP feed download and Telegram delivery
//! - `run`: one reminder pass composing all of the above

pub mod error;
pub mod event;
pub mod feed;
pub mod ics;
pub mod ledger;
pub mod notifier;
pub mod run;
pub mod settings;
pub mod window;

pub use error::{ReminderError, ReminderResult};
pub use event::{CalendarEvent, EventStart};
pub use ledger::{Ledger, NotificationRecord};
pub use run::{EventReport, Outcome, Reminder, RunSummary};
pub use settings::Settings;
