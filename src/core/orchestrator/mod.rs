mod run;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::core::error::{ScheduleError, ScheduleResult};
use crate::core::oracle::CandidateOracle;
use crate::core::schedule::Period;
use crate::core::store::{GenerationJob, JobStore, PatternStore};
use crate::core::validation::ScheduleValidator;

pub use types::{GenerationSettings, JobHandle, JobOutcome, JobStatus};

use run::GenerationRun;

pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    match from {
        JobStatus::Pending => matches!(to, JobStatus::Processing | JobStatus::Failed),
        JobStatus::Processing => matches!(to, JobStatus::Completed | JobStatus::Failed),
        JobStatus::Completed | JobStatus::Failed => false,
    }
}

/// Reported progress for attempt `retry` of pattern `index`. Integer math,
/// capped at 95 so only a terminal status reaches 100.
pub fn attempt_progress(index: usize, retry: u32, pattern_count: usize, max_retries: u32) -> u8 {
    let n = pattern_count.max(1);
    let per_pattern = index * 100 / n;
    let per_retry = retry as usize * 100 / (n * max_retries.max(1) as usize);
    (per_pattern + per_retry).min(95) as u8
}

pub struct GenerationOrchestrator {
    jobs: Arc<dyn JobStore>,
    patterns: Arc<dyn PatternStore>,
    oracle: Arc<dyn CandidateOracle>,
    validator: Arc<dyn ScheduleValidator>,
    settings: GenerationSettings,
}

impl GenerationOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        patterns: Arc<dyn PatternStore>,
        oracle: Arc<dyn CandidateOracle>,
        validator: Arc<dyn ScheduleValidator>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            jobs,
            patterns,
            oracle,
            validator,
            settings,
        }
    }

    pub fn settings(&self) -> GenerationSettings {
        self.settings
    }

    /// Creates a pending job and spawns its run. Returns as soon as the job
    /// row exists; poll [`Self::job_status`] or await [`JobHandle::wait`].
    pub async fn start_generation(
        &self,
        period: &str,
        pattern_count: Option<usize>,
    ) -> ScheduleResult<JobHandle> {
        let period: Period = period.parse()?;
        let pattern_count = pattern_count.unwrap_or(self.settings.default_pattern_count);
        if pattern_count == 0 || pattern_count > self.settings.max_pattern_count {
            return Err(ScheduleError::Config(format!(
                "pattern count must be between 1 and {}, got {}",
                self.settings.max_pattern_count, pattern_count
            )));
        }

        if self.jobs.has_active_job(period).await? {
            return Err(ScheduleError::Conflict(period.to_string()));
        }
        let job = self.jobs.create_job(period, pattern_count).await?;
        info!(
            "Created generation job {} for {} ({} patterns)",
            job.job_id, period, pattern_count
        );

        let run = GenerationRun {
            job_id: job.job_id.clone(),
            period,
            pattern_count,
            max_retries: self.settings.max_retries.max(1),
            jobs: self.jobs.clone(),
            patterns: self.patterns.clone(),
            oracle: self.oracle.clone(),
            validator: self.validator.clone(),
        };
        let task = tokio::spawn(run.execute());

        Ok(JobHandle { job, task })
    }

    pub async fn job_status(&self, job_id: &str) -> ScheduleResult<GenerationJob> {
        self.jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("job {job_id}")))
    }

    /// Polls the job row every `interval`, handing each snapshot to
    /// `on_update`, until the row is terminal or the run itself has returned.
    pub async fn follow(
        &self,
        handle: JobHandle,
        interval: Duration,
        mut on_update: impl FnMut(&GenerationJob),
    ) -> ScheduleResult<JobOutcome> {
        loop {
            let finished = handle.is_finished();
            let job = self.job_status(handle.job_id()).await?;
            on_update(&job);
            if job.status.is_terminal() {
                break;
            }
            if finished {
                warn!(
                    "Run for job {} returned while the job is still {}",
                    job.job_id,
                    job.status.as_str()
                );
                break;
            }
            tokio::time::sleep(interval).await;
        }
        Ok(handle.wait().await)
    }
}

#[cfg(test)]
mod tests;
