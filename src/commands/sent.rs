use std::path::Path;

use anyhow::Result;
use ics_reminder_core::ledger::Ledger;
use owo_colors::OwoColorize;

use crate::render::Render;

pub fn run(path: &Path) -> Result<()> {
    if !path.exists() {
        println!("{}", "No reminders sent yet".dimmed());
        return Ok(());
    }

    let ledger = Ledger::open(path)?;
    let records = ledger.records()?;

    println!("{}", path.display().to_string().bold());

    if records.is_empty() {
        println!("{}", "   No reminders sent yet".dimmed());
    }
    for record in &records {
        println!("{}", record.render());
    }

    ledger.close()?;
    Ok(())
}
