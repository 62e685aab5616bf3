//! One generation run: sequential patterns, sequential retries per pattern.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::attempt_progress;
use super::types::{JobOutcome, JobStatus};
use crate::core::error::{ScheduleError, ScheduleResult};
use crate::core::oracle::{CandidateOracle, OracleRequest};
use crate::core::schedule::{
    CandidateSchedule, ConstraintKind, ConstraintViolation, Period, ValidationResult, Violation,
};
use crate::core::store::{JobStore, PatternStore};
use crate::core::validation::ScheduleValidator;

pub(super) struct GenerationRun {
    pub job_id: String,
    pub period: Period,
    pub pattern_count: usize,
    pub max_retries: u32,
    pub jobs: Arc<dyn JobStore>,
    pub patterns: Arc<dyn PatternStore>,
    pub oracle: Arc<dyn CandidateOracle>,
    pub validator: Arc<dyn ScheduleValidator>,
}

/// The candidate kept for a pattern. `result` is `None` when the validator
/// failed on the final attempt.
struct AcceptedCandidate {
    candidate: CandidateSchedule,
    result: Option<ValidationResult>,
}

impl AcceptedCandidate {
    fn score(&self) -> f64 {
        self.result.as_ref().map(|r| r.score).unwrap_or(0.0)
    }

    /// Self-reported violations followed by the validator's findings.
    fn merged_violations(&self) -> Vec<ConstraintViolation> {
        let mut merged = self.candidate.self_reported_violations.clone();
        if let Some(result) = &self.result {
            merged.extend(result.violations.iter().map(ConstraintViolation::from));
        }
        merged
    }
}

impl GenerationRun {
    pub async fn execute(self) -> JobOutcome {
        let mut pattern_ids = Vec::new();
        match self.generate_all(&mut pattern_ids).await {
            Ok(()) => {
                if let Err(e) = self.jobs.set_completed(&self.job_id).await {
                    error!("Failed to mark job {} completed: {}", self.job_id, e);
                    let message = e.to_string();
                    if let Err(store_err) = self.jobs.set_failed(&self.job_id, &message).await {
                        error!("Failed to mark job {} failed: {}", self.job_id, store_err);
                    }
                    return self.outcome(JobStatus::Failed, pattern_ids, Some(message));
                }
                info!(
                    "Generation job {} completed with {} patterns",
                    self.job_id,
                    pattern_ids.len()
                );
                self.outcome(JobStatus::Completed, pattern_ids, None)
            }
            Err(e) => {
                let message = e.to_string();
                error!("Generation job {} failed: {}", self.job_id, message);
                if let Err(store_err) = self.jobs.set_failed(&self.job_id, &message).await {
                    error!("Failed to mark job {} failed: {}", self.job_id, store_err);
                }
                self.outcome(JobStatus::Failed, pattern_ids, Some(message))
            }
        }
    }

    fn outcome(
        &self,
        status: JobStatus,
        pattern_ids: Vec<String>,
        error: Option<String>,
    ) -> JobOutcome {
        JobOutcome {
            job_id: self.job_id.clone(),
            status,
            pattern_ids,
            error,
        }
    }

    async fn generate_all(&self, pattern_ids: &mut Vec<String>) -> ScheduleResult<()> {
        self.jobs.set_processing(&self.job_id).await?;
        info!("Generation job {} processing {}", self.job_id, self.period);

        let mut prior_candidates: Vec<CandidateSchedule> = Vec::new();
        for index in 0..self.pattern_count {
            let accepted = self
                .generate_pattern(index, &prior_candidates)
                .await?
                .ok_or_else(|| ScheduleError::Oracle(format!("pattern {}: no result", index + 1)))?;

            let violations = accepted.merged_violations();
            let pattern_id = self
                .patterns
                .persist_pattern(
                    self.period,
                    &accepted.candidate.reasoning,
                    accepted.score(),
                    &violations,
                )
                .await?;
            if let Err(e) = self
                .patterns
                .persist_entries(&pattern_id, &accepted.candidate.entries)
                .await
            {
                if let Err(discard_err) = self.patterns.discard_pattern(&pattern_id).await {
                    error!(
                        "Failed to discard pattern {} after entry failure: {}",
                        pattern_id, discard_err
                    );
                }
                return Err(e);
            }
            info!(
                "Stored pattern {} ({}/{}) for job {}: {} entries, score {:.2}, {} violations",
                pattern_id,
                index + 1,
                self.pattern_count,
                self.job_id,
                accepted.candidate.entries.len(),
                accepted.score(),
                violations.len()
            );

            pattern_ids.push(pattern_id);
            prior_candidates.push(accepted.candidate);
        }
        Ok(())
    }

    /// Retries until a candidate has no hard violations or the budget runs
    /// out, in which case the last validated attempt is kept.
    async fn generate_pattern(
        &self,
        index: usize,
        prior_candidates: &[CandidateSchedule],
    ) -> ScheduleResult<Option<AcceptedCandidate>> {
        let mut previous_violations: Vec<Violation> = Vec::new();
        let mut accepted = None;

        for retry in 0..self.max_retries {
            let last_attempt = retry + 1 == self.max_retries;
            let progress = attempt_progress(index, retry, self.pattern_count, self.max_retries);
            let message = if retry == 0 {
                format!("Generating pattern {}/{}", index + 1, self.pattern_count)
            } else {
                format!(
                    "Generating pattern {}/{} (retry {})",
                    index + 1,
                    self.pattern_count,
                    retry
                )
            };
            if let Err(e) = self.jobs.update_progress(&self.job_id, progress, &message).await {
                warn!("Progress update for job {} failed: {}", self.job_id, e);
            }

            let request = OracleRequest {
                period: self.period,
                total_pattern_count: self.pattern_count,
                pattern_index: index,
                prior_candidates: prior_candidates.to_vec(),
                previous_violations: previous_violations.clone(),
            };
            let candidate = match self.oracle.generate(&request).await {
                Ok(candidate) => candidate,
                Err(e) if last_attempt => return Err(e),
                Err(e) => {
                    warn!(
                        "Oracle attempt {} for pattern {} of job {} failed: {}",
                        retry + 1,
                        index + 1,
                        self.job_id,
                        e
                    );
                    continue;
                }
            };

            let result = match self.validator.validate(self.period, &candidate).await {
                Ok(result) => result,
                Err(e) if last_attempt => {
                    warn!(
                        "Validation failed on the last attempt for pattern {} of job {}, keeping candidate unscored: {}",
                        index + 1,
                        self.job_id,
                        e
                    );
                    return Ok(Some(AcceptedCandidate {
                        candidate,
                        result: None,
                    }));
                }
                Err(e) => {
                    warn!(
                        "Validation attempt {} for pattern {} of job {} failed: {}",
                        retry + 1,
                        index + 1,
                        self.job_id,
                        e
                    );
                    continue;
                }
            };

            if !result.has_hard_violations() {
                return Ok(Some(AcceptedCandidate {
                    candidate,
                    result: Some(result),
                }));
            }

            for v in result
                .violations
                .iter()
                .filter(|v| v.kind == ConstraintKind::Hard)
            {
                warn!(
                    "Hard violation in pattern {} attempt {}: [{}] staff={} date={} {}",
                    index + 1,
                    retry + 1,
                    v.constraint,
                    v.staff_id.as_deref().unwrap_or("-"),
                    v.date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                    v.message
                );
            }
            previous_violations = result.violations.clone();
            accepted = Some(AcceptedCandidate {
                candidate,
                result: Some(result),
            });
        }

        Ok(accepted)
    }
}
