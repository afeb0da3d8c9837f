//! TUI rendering traits for run results.
//!
//! Extension traits that add colored terminal rendering to
//! ics-reminder-core types using owo_colors.

use chrono::{DateTime, Utc};
use ics_reminder_core::{EventReport, NotificationRecord, Outcome, RunSummary};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

fn render_start(start: Option<DateTime<Utc>>) -> String {
    start
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default()
}

impl Render for EventReport {
    fn render(&self) -> String {
        let start = render_start(self.start);
        match &self.outcome {
            Outcome::Sent => format!("   {} {} {}", "✓".green(), self.title.green(), start.dimmed()),
            Outcome::Pending => format!(
                "   {} {} {} {}",
                "~".yellow(),
                self.title.yellow(),
                start.dimmed(),
                "(would send)".dimmed()
            ),
            Outcome::Failed(reason) => format!("   {} {} {}", "✗".red(), self.title.red(), reason.red()),
            Outcome::NotDue => format!("   {} {} {}", "-".dimmed(), self.title, start.dimmed()),
            Outcome::AlreadySent => format!(
                "   {} {} {}",
                "=".dimmed(),
                self.title,
                "(already sent)".dimmed()
            ),
        }
    }
}

impl Render for NotificationRecord {
    fn render(&self) -> String {
        let at = self
            .notified_at
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "(unknown time)".to_string());
        format!("   {} {}", at.dimmed(), self.event_id)
    }
}

/// Extended rendering for a whole pass
pub trait RunSummaryRender {
    fn render(&self, verbose: bool, dry_run: bool) -> String;
}

impl RunSummaryRender for RunSummary {
    fn render(&self, verbose: bool, dry_run: bool) -> String {
        let mut lines: Vec<String> = self
            .reports
            .iter()
            .filter(|r| {
                verbose || !matches!(r.outcome, Outcome::NotDue | Outcome::AlreadySent)
            })
            .map(|r| r.render())
            .collect();

        if lines.is_empty() {
            lines.push("   No reminders due".dimmed().to_string());
        }

        lines.push(String::new());
        if dry_run {
            lines.push(format!(
                "Would send: {}, skipped: {}, failed: {}",
                self.pending(),
                self.skipped(),
                self.failed()
            ));
        } else {
            lines.push(format!(
                "Sent: {}, skipped: {}, failed: {}",
                self.sent(),
                self.skipped(),
                self.failed()
            ));
        }

        lines.join("\n")
    }
}
