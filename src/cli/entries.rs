use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::core::schedule::{ShiftEntry, TimeOfDay};
use crate::core::store::{EntryUpdate, ShiftStore, StoredEntry};
use crate::core::terminal;

fn parse_time(raw: &str, what: &str) -> Result<TimeOfDay> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("{} must be HH:MM, got '{}'", what, raw))
}

fn describe(stored: &StoredEntry) -> String {
    let e = &stored.entry;
    format!(
        "{} {} {}-{} (break {}m)",
        e.staff_id, e.date, e.start_time, e.end_time, e.break_minutes
    )
}

pub async fn run_add(
    store: &ShiftStore,
    pattern_id: &str,
    staff_id: &str,
    date: &str,
    start: &str,
    end: &str,
    break_minutes: u32,
) -> Result<()> {
    let entry = ShiftEntry {
        staff_id: staff_id.to_string(),
        date: date
            .parse::<NaiveDate>()
            .with_context(|| format!("--date must be YYYY-MM-DD, got '{}'", date))?,
        start_time: parse_time(start, "--start")?,
        end_time: parse_time(end, "--end")?,
        break_minutes,
    };
    let stored = store.add_entry(pattern_id, &entry).await?;
    terminal::print_success(&format!(
        "Added entry {}: {}",
        stored.entry_id,
        describe(&stored)
    ));
    Ok(())
}

pub async fn run_update(
    store: &ShiftStore,
    entry_id: &str,
    start: Option<&str>,
    end: Option<&str>,
    break_minutes: Option<u32>,
) -> Result<()> {
    let update = EntryUpdate {
        start_time: start.map(|s| parse_time(s, "--start")).transpose()?,
        end_time: end.map(|s| parse_time(s, "--end")).transpose()?,
        break_minutes,
    };
    let stored = store.update_entry(entry_id, &update).await?;
    terminal::print_success(&format!(
        "Updated entry {}: {}",
        stored.entry_id,
        describe(&stored)
    ));
    Ok(())
}

pub async fn run_delete(store: &ShiftStore, entry_id: &str) -> Result<()> {
    store.delete_entry(entry_id).await?;
    terminal::print_success(&format!("Deleted entry {}.", entry_id));
    Ok(())
}
