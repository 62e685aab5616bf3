use serde::Serialize;
use tokio::task::JoinHandle;

use crate::core::store::GenerationJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Retry and pattern-count limits for generation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    pub max_retries: u32,
    pub default_pattern_count: usize,
    pub max_pattern_count: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            default_pattern_count: 3,
            max_pattern_count: 5,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub pattern_ids: Vec<String>,
    pub error: Option<String>,
}

/// Returned by `start_generation` once the job row exists and the run is spawned.
/// Dropping it detaches the run.
pub struct JobHandle {
    pub job: GenerationJob,
    pub(crate) task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job.job_id
    }

    /// True once the run has returned, even if its final status write failed.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the run to reach a terminal state.
    pub async fn wait(self) -> JobOutcome {
        let job_id = self.job.job_id.clone();
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome {
                job_id,
                status: JobStatus::Failed,
                pattern_ids: Vec::new(),
                error: Some(format!("generation task aborted: {e}")),
            },
        }
    }
}
