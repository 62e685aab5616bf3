//! Deterministic validation of candidate schedules.
//!
//! Runs every check and accumulates all findings:
//! - Unavailable dates (hard)
//! - Start/end ordering and period membership (hard)
//! - One shift per staff member per date (hard)
//! - Catalog rules: consecutive days, min/max staff, rest hours (kind taken from the rule)
//! - Monthly hour targets (soft, score and warnings only)
//!
//! `is_valid` is false whenever any violation is recorded, hard or soft.
//! Retry decisions use [`ValidationResult::has_hard_violations`] instead.

mod rules;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::{ScheduleError, ScheduleResult};
use crate::core::schedule::{
    CandidateSchedule, ConstraintCatalog, Period, RuleConfig, ValidationResult,
};
use crate::core::store::CatalogSource;

pub use rules::{
    AVAILABILITY_CHECK, DATE_RANGE_CHECK, DUPLICATE_CHECK, MONTHLY_HOURS_CHECK, TIME_RANGE_CHECK,
};

/// Validates a candidate against an already-loaded catalog. Pure and deterministic.
pub fn validate(
    period: Period,
    candidate: &CandidateSchedule,
    catalog: &ConstraintCatalog,
) -> ValidationResult {
    let entries = &candidate.entries;
    let mut violations = Vec::new();

    rules::check_availability(entries, catalog, &mut violations);
    rules::check_time_consistency(period, entries, &mut violations);
    rules::check_duplicates(entries, &mut violations);

    for rule in &catalog.rules {
        match &rule.config {
            RuleConfig::MaxConsecutiveDays { max_days } => {
                rules::check_consecutive_days(entries, rule, *max_days, &mut violations)
            }
            RuleConfig::MinStaff { min_count } => {
                rules::check_min_staff(entries, rule, *min_count, &mut violations)
            }
            RuleConfig::MaxStaff { max_count } => {
                rules::check_max_staff(entries, rule, *max_count, &mut violations)
            }
            RuleConfig::RestHours { min_hours } => {
                rules::check_rest_hours(entries, rule, *min_hours, &mut violations)
            }
            RuleConfig::MonthlyHours | RuleConfig::Unrecognized { .. } => {}
        }
    }

    let (score, warnings) = rules::score_monthly_hours(entries, &catalog.targets);

    ValidationResult {
        is_valid: violations.is_empty(),
        violations,
        warnings,
        score,
    }
}

/// Validation capability used by the orchestrator.
#[async_trait]
pub trait ScheduleValidator: Send + Sync {
    async fn validate(
        &self,
        period: Period,
        candidate: &CandidateSchedule,
    ) -> ScheduleResult<ValidationResult>;
}

/// Loads the catalog for each call and delegates to [`validate`].
pub struct CatalogValidator {
    catalog: Arc<dyn CatalogSource>,
}

impl CatalogValidator {
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ScheduleValidator for CatalogValidator {
    async fn validate(
        &self,
        period: Period,
        candidate: &CandidateSchedule,
    ) -> ScheduleResult<ValidationResult> {
        let catalog = self
            .catalog
            .load_catalog(period)
            .await
            .map_err(|e| ScheduleError::ValidationInput(e.to_string()))?;
        let result = validate(period, candidate, &catalog);
        debug!(
            "Validated {} entries for {}: {} violations, {} warnings, score {:.2}",
            candidate.entries.len(),
            period,
            result.violations.len(),
            result.warnings.len(),
            result.score
        );
        Ok(result)
    }
}
