use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::oracle::parse_candidate;
use crate::core::schedule::Period;
use crate::core::store::{CatalogImport, ShiftStore};
use crate::core::terminal;
use crate::core::validation::{CatalogValidator, ScheduleValidator};

/// Validates a candidate file against the stored catalog and prints the
/// result as JSON on stdout.
pub async fn run_check(store: Arc<ShiftStore>, period: &str, candidate: &Path) -> Result<()> {
    let period: Period = period.parse()?;
    let raw = tokio::fs::read_to_string(candidate)
        .await
        .with_context(|| format!("reading {}", candidate.display()))?;
    let candidate = parse_candidate(&raw)?;

    let validator = CatalogValidator::new(store);
    let result = validator.validate(period, &candidate).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn run_import(store: &ShiftStore, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let import: CatalogImport =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
    let written = store.import_catalog(&import).await?;
    terminal::print_success(&format!(
        "Imported {} records for {} ({} staff, {} availability marks, {} targets, {} rules).",
        written,
        import.period,
        import.staff.len(),
        import.availability.len(),
        import.targets.len(),
        import.rules.len()
    ));
    Ok(())
}
