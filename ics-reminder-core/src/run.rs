//! One reminder pass over the feed.
//!
//! Fetch and parse failures abort the pass before the ledger is touched.
//! After that, each event is evaluated on its own: a failed send is reported
//! and left out of the ledger so the next pass retries it. Ledger errors
//! abort, since carrying on without dedup state risks duplicate reminders.
//!
//! A crash between a successful send and the ledger insert means that event
//! is reminded again on the next pass. The insert directly follows the send
//! to keep that window small.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{ReminderError, ReminderResult};
use crate::event::CalendarEvent;
use crate::feed::FeedSource;
use crate::ics::parse_feed;
use crate::ledger::Ledger;
use crate::notifier::{Notifier, format_reminder};
use crate::window::is_due;

/// What happened to one event during a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Sent,
    /// Due and novel, but this was a dry run
    Pending,
    NotDue,
    AlreadySent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventReport {
    pub event_id: String,
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub reports: Vec<EventReport>,
}

impl RunSummary {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn sent(&self) -> usize {
        self.count(|o| *o == Outcome::Sent)
    }

    pub fn pending(&self) -> usize {
        self.count(|o| *o == Outcome::Pending)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::NotDue | Outcome::AlreadySent))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }
}

pub struct Reminder<F, N> {
    feed: F,
    notifier: N,
    horizon: Duration,
    dry_run: bool,
}

impl<F: FeedSource, N: Notifier> Reminder<F, N> {
    pub fn new(feed: F, notifier: N, horizon: Duration) -> Self {
        Reminder {
            feed,
            notifier,
            horizon,
            dry_run: false,
        }
    }

    /// Evaluate everything but send and record nothing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one pass at `now` against `ledger`.
    pub async fn run(&self, ledger: &Ledger, now: DateTime<Utc>) -> ReminderResult<RunSummary> {
        let text = self.feed.fetch().await?;
        let events = parse_feed(&text)?;

        info!(
            events = events.len(),
            horizon_hours = self.horizon.num_hours(),
            "Checking feed for due events"
        );

        let mut summary = RunSummary::default();

        for event in events {
            let report = self.process(&event, ledger, now).await?;
            summary.reports.push(report);
        }

        Ok(summary)
    }

    async fn process(
        &self,
        event: &CalendarEvent,
        ledger: &Ledger,
        now: DateTime<Utc>,
    ) -> ReminderResult<EventReport> {
        let start = event.start.to_utc();

        let outcome = match &start {
            Ok(start) => self.evaluate(event, *start, ledger, now).await?,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Cannot place event start in time");
                Outcome::Failed(e.to_string())
            }
        };

        debug!(event_id = %event.id, ?outcome, "Evaluated event");

        Ok(EventReport {
            event_id: event.id.clone(),
            title: event.title.clone(),
            start: start.ok(),
            outcome,
        })
    }

    async fn evaluate(
        &self,
        event: &CalendarEvent,
        start: DateTime<Utc>,
        ledger: &Ledger,
        now: DateTime<Utc>,
    ) -> ReminderResult<Outcome> {
        if !is_due(start, now, self.horizon) {
            return Ok(Outcome::NotDue);
        }

        if ledger.has_notified(&event.id)? {
            return Ok(Outcome::AlreadySent);
        }

        if self.dry_run {
            return Ok(Outcome::Pending);
        }

        let text = match format_reminder(event) {
            Ok(text) => text,
            Err(e) if e.is_per_event() => return Ok(Outcome::Failed(e.to_string())),
            Err(e) => return Err(e),
        };

        match self.notifier.send(&text).await {
            Ok(()) => {
                ledger.record_notified(&event.id, Utc::now())?;
                info!(event_id = %event.id, title = %event.title, "Sent reminder");
                Ok(Outcome::Sent)
            }
            Err(e @ ReminderError::Delivery(_)) => {
                warn!(event_id = %event.id, error = %e, "Reminder not delivered, will retry next run");
                Ok(Outcome::Failed(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    struct StaticFeed(String);

    impl FeedSource for StaticFeed {
        async fn fetch(&self) -> ReminderResult<String> {
            Ok(self.0.clone())
        }
    }

    struct DownFeed;

    impl FeedSource for DownFeed {
        async fn fetch(&self) -> ReminderResult<String> {
            Err(ReminderError::Transport("503 Service Unavailable".into()))
        }
    }

    #[derive(Clone, Default)]
    struct FakeNotifier {
        sent: Arc<Mutex<Vec<String>>>,
        failing: bool,
    }

    impl FakeNotifier {
        fn failing() -> Self {
            FakeNotifier {
                failing: true,
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for FakeNotifier {
        async fn send(&self, text: &str) -> ReminderResult<()> {
            if self.failing {
                return Err(ReminderError::Delivery("429 Too Many Requests".into()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap()
    }

    fn vevent(uid: &str, summary: &str, dtstart: &str) -> String {
        format!("BEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:{summary}\r\nDTSTART:{dtstart}\r\nEND:VEVENT\r\n")
    }

    fn feed(vevents: &[String]) -> StaticFeed {
        StaticFeed(format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:TEST\r\n{}END:VCALENDAR\r\n",
            vevents.concat()
        ))
    }

    /// A starts in 2 hours, B in 48 hours
    fn two_events() -> Vec<String> {
        vec![
            vevent("A", "Soon", "20250320T140000Z"),
            vevent("B", "Later", "20250322T120000Z"),
        ]
    }

    fn reminder(vevents: &[String], notifier: FakeNotifier) -> Reminder<StaticFeed, FakeNotifier> {
        Reminder::new(feed(vevents), notifier, Duration::hours(24))
    }

    #[tokio::test]
    async fn first_run_sends_due_event_and_second_run_sends_nothing() {
        let ledger = Ledger::open_in_memory().unwrap();
        let notifier = FakeNotifier::default();
        let reminder = reminder(&two_events(), notifier.clone());

        let first = reminder.run(&ledger, now()).await.unwrap();
        assert_eq!((first.sent(), first.skipped(), first.failed()), (1, 1, 0));
        assert_eq!(notifier.sent().len(), 1);
        assert!(notifier.sent()[0].contains("Soon"));
        assert!(ledger.has_notified("A").unwrap());
        assert!(!ledger.has_notified("B").unwrap());

        let second = reminder.run(&ledger, now()).await.unwrap();
        assert_eq!((second.sent(), second.skipped(), second.failed()), (0, 2, 0));
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn repeated_runs_never_resend() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.record_notified("A", now()).unwrap();
        let notifier = FakeNotifier::default();
        let reminder = reminder(&two_events(), notifier.clone());

        for _ in 0..3 {
            let summary = reminder.run(&ledger, now()).await.unwrap();
            assert_eq!(summary.sent(), 0);
        }
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_is_not_recorded_and_is_retried() {
        let ledger = Ledger::open_in_memory().unwrap();

        let broken = reminder(&two_events(), FakeNotifier::failing());
        let summary = broken.run(&ledger, now()).await.unwrap();
        assert_eq!((summary.sent(), summary.failed()), (0, 1));
        assert!(!ledger.has_notified("A").unwrap());

        let notifier = FakeNotifier::default();
        let working = reminder(&two_events(), notifier.clone());
        let summary = working.run(&ledger, now()).await.unwrap();
        assert_eq!(summary.sent(), 1);
        assert!(ledger.has_notified("A").unwrap());
    }

    #[tokio::test]
    async fn event_order_does_not_change_result() {
        let mut events = two_events();
        events.push(vevent("C", "Also soon", "20250321T110000Z"));
        let mut reversed = events.clone();
        reversed.reverse();

        let mut outcomes = Vec::new();
        for vevents in [events, reversed] {
            let ledger = Ledger::open_in_memory().unwrap();
            let notifier = FakeNotifier::default();
            reminder(&vevents, notifier.clone())
                .run(&ledger, now())
                .await
                .unwrap();

            let mut ids: Vec<String> = ledger
                .records()
                .unwrap()
                .into_iter()
                .map(|r| r.event_id)
                .collect();
            ids.sort();
            outcomes.push((ids, notifier.sent().len()));
        }

        assert_eq!(outcomes[0], outcomes[1]);
        assert_eq!(outcomes[0], (vec!["A".to_string(), "C".to_string()], 2));
    }

    #[tokio::test]
    async fn floating_and_utc_starts_are_treated_alike() {
        let ledger = Ledger::open_in_memory().unwrap();
        let events = vec![
            vevent("floating", "Floating", "20250320T140000"),
            vevent("utc", "Utc", "20250320T140000Z"),
            vevent("floating-late", "Floating late", "20250322T140000"),
            vevent("utc-late", "Utc late", "20250322T140000Z"),
        ];

        let summary = reminder(&events, FakeNotifier::default())
            .run(&ledger, now())
            .await
            .unwrap();

        let outcome = |id: &str| {
            summary
                .reports
                .iter()
                .find(|r| r.event_id == id)
                .map(|r| r.outcome.clone())
                .unwrap()
        };
        assert_eq!(outcome("floating"), outcome("utc"));
        assert_eq!(outcome("floating"), Outcome::Sent);
        assert_eq!(outcome("floating-late"), outcome("utc-late"));
        assert_eq!(outcome("floating-late"), Outcome::NotDue);
    }

    #[tokio::test]
    async fn past_events_are_skipped() {
        let ledger = Ledger::open_in_memory().unwrap();
        let events = vec![vevent("past", "Yesterday", "20250319T120000Z")];

        let summary = reminder(&events, FakeNotifier::default())
            .run(&ledger, now())
            .await
            .unwrap();

        assert_eq!(summary.reports[0].outcome, Outcome::NotDue);
    }

    #[tokio::test]
    async fn unknown_timezone_fails_only_that_event() {
        let ledger = Ledger::open_in_memory().unwrap();
        let events = vec![
            "BEGIN:VEVENT\r\nUID:odd\r\nSUMMARY:Odd zone\r\nDTSTART;TZID=Custom/Zone:20250320T140000\r\nEND:VEVENT\r\n".to_string(),
            vevent("A", "Soon", "20250320T140000Z"),
        ];

        let summary = reminder(&events, FakeNotifier::default())
            .run(&ledger, now())
            .await
            .unwrap();

        assert_eq!((summary.sent(), summary.failed()), (1, 1));
        assert!(!ledger.has_notified("odd").unwrap());
    }

    #[tokio::test]
    async fn fetch_failure_aborts_without_touching_ledger() {
        let ledger = Ledger::open_in_memory().unwrap();
        let notifier = FakeNotifier::default();
        let reminder = Reminder::new(DownFeed, notifier.clone(), Duration::hours(24));

        let err = reminder.run(&ledger, now()).await.unwrap_err();

        assert!(matches!(err, ReminderError::Transport(_)));
        assert!(ledger.records().unwrap().is_empty());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn malformed_feed_aborts_the_run() {
        let ledger = Ledger::open_in_memory().unwrap();
        let reminder = Reminder::new(
            StaticFeed("<html>Sign in</html>".into()),
            FakeNotifier::default(),
            Duration::hours(24),
        );

        let err = reminder.run(&ledger, now()).await.unwrap_err();
        assert!(matches!(err, ReminderError::MalformedFeed(_)));
    }

    #[tokio::test]
    async fn dry_run_sends_and_records_nothing() {
        let ledger = Ledger::open_in_memory().unwrap();
        let notifier = FakeNotifier::default();
        let reminder = reminder(&two_events(), notifier.clone()).dry_run(true);

        let summary = reminder.run(&ledger, now()).await.unwrap();

        assert_eq!((summary.pending(), summary.skipped(), summary.sent()), (1, 1, 0));
        assert!(notifier.sent().is_empty());
        assert!(ledger.records().unwrap().is_empty());
    }
}
