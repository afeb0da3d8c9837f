use anyhow::{Context, Result};
use chrono::Utc;
use ics_reminder_core::Settings;
use ics_reminder_core::feed::HttpFeed;
use ics_reminder_core::ledger::Ledger;
use ics_reminder_core::notifier::TelegramNotifier;
use ics_reminder_core::run::Reminder;

use crate::render::RunSummaryRender;
use crate::utils::tui;

pub async fn run(settings: &Settings, dry_run: bool, verbose: bool) -> Result<()> {
    let feed = HttpFeed::new(&settings.ics_url, settings.fetch_timeout())?;
    let notifier = TelegramNotifier::new(
        &settings.telegram_api_url,
        &settings.telegram_token,
        &settings.telegram_chat_id,
    )?;
    let reminder = Reminder::new(feed, notifier, settings.horizon()).dry_run(dry_run);

    let ledger_path = settings.ledger_path();
    tracing::debug!(?settings, ledger = %ledger_path.display(), "starting run");
    // Dry runs never create the ledger file
    let ledger = if dry_run && !ledger_path.exists() {
        Ledger::open_in_memory()?
    } else {
        Ledger::open(&ledger_path)
            .with_context(|| format!("Could not open ledger at {}", ledger_path.display()))?
    };

    println!(
        "📅 Checking events starting within {} hours...",
        settings.reminder_hours
    );

    let spinner = tui::spinner("   Fetching feed");
    let result = reminder.run(&ledger, Utc::now()).await;
    spinner.finish_and_clear();

    let summary = result?;

    println!("{}", summary.render(verbose, dry_run));

    ledger.close()?;
    Ok(())
}
