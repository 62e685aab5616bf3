use anyhow::Result;
use console::style;

use crate::core::schedule::Period;
use crate::core::store::{ShiftPattern, ShiftStore};
use crate::core::terminal;

fn print_pattern_line(index: usize, pattern: &ShiftPattern) {
    println!(
        "{}. {} [{}] score {:.1}, {} violations",
        index + 1,
        style(&pattern.pattern_id).bold(),
        pattern.status.as_str(),
        pattern.score,
        pattern.violations.len()
    );
}

pub async fn run_list(store: &ShiftStore, period: &str) -> Result<()> {
    let period: Period = period.parse()?;
    let patterns = store.list_patterns(period).await?;
    if patterns.is_empty() {
        terminal::print_warn(&format!("No patterns stored for {}.", period));
        return Ok(());
    }
    terminal::print_heading(&format!("Patterns for {}", period));
    for (i, pattern) in patterns.iter().enumerate() {
        print_pattern_line(i, pattern);
        let summary = store.pattern_summary(&pattern.pattern_id).await?;
        println!("   {} entries", summary.total_entries);
        for (staff, hours) in &summary.staff_hours {
            println!("   - {}: {:.1}h", staff, hours);
        }
    }
    Ok(())
}

pub async fn run_show(store: &ShiftStore, pattern_id: &str) -> Result<()> {
    let pattern = store.get_pattern(pattern_id).await?;
    let entries = store.list_entries(pattern_id).await?;

    terminal::print_heading(&format!("Pattern {} ({})", pattern.pattern_id, pattern.period));
    terminal::print_status("Status", pattern.status.as_str());
    terminal::print_status("Score", &format!("{:.2}", pattern.score));
    terminal::print_status("Reasoning", &pattern.reasoning);

    if !pattern.violations.is_empty() {
        println!("\n{}", style("Violations").bold());
        for v in &pattern.violations {
            println!("  - [{}] {}: {}", v.kind.as_str(), v.constraint_name, v.message);
        }
    }

    println!("\n{}", style("Entries").bold());
    for stored in &entries {
        let e = &stored.entry;
        println!(
            "  {}  {:<12} {}-{}  break {}m  ({:.1}h){}  {}",
            e.date,
            e.staff_id,
            e.start_time,
            e.end_time,
            e.break_minutes,
            e.worked_hours(),
            if stored.is_manual_edit { " *" } else { "" },
            style(&stored.entry_id).dim()
        );
    }
    Ok(())
}

pub async fn run_select(store: &ShiftStore, pattern_id: &str) -> Result<()> {
    let pattern = store.select_pattern(pattern_id).await?;
    terminal::print_success(&format!(
        "Selected pattern {} for {}.",
        pattern.pattern_id, pattern.period
    ));
    Ok(())
}

pub async fn run_finalize(store: &ShiftStore, pattern_id: &str) -> Result<()> {
    let pattern = store.finalize_pattern(pattern_id).await?;
    terminal::print_success(&format!(
        "Pattern {} for {} is {}.",
        pattern.pattern_id,
        pattern.period,
        pattern.status.as_str()
    ));
    Ok(())
}
