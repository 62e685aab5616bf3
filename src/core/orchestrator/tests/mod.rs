mod generation;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::error::{ScheduleError, ScheduleResult};
use crate::core::oracle::{CandidateOracle, OracleRequest};
use crate::core::schedule::{
    CandidateSchedule, ConstraintKind, ConstraintViolation, Period, ShiftEntry, ValidationResult,
    Violation,
};
use crate::core::store::{GenerationJob, JobStore, PatternStore, ShiftStore};
use crate::core::validation::ScheduleValidator;

pub(super) fn entry(staff: &str, date: &str) -> ShiftEntry {
    ShiftEntry {
        staff_id: staff.to_string(),
        date: date.parse().unwrap(),
        start_time: "09:00".parse().unwrap(),
        end_time: "17:00".parse().unwrap(),
        break_minutes: 60,
    }
}

pub(super) fn candidate(reasoning: &str) -> CandidateSchedule {
    CandidateSchedule {
        reasoning: reasoning.to_string(),
        entries: vec![entry("s1", "2025-03-01"), entry("s2", "2025-03-02")],
        self_reported_violations: vec![ConstraintViolation {
            constraint_name: "weekend balance".into(),
            kind: ConstraintKind::Soft,
            message: "s2 works two weekends".into(),
        }],
    }
}

pub(super) fn clean_result() -> ValidationResult {
    ValidationResult {
        is_valid: true,
        violations: vec![],
        warnings: vec![],
        score: 100.0,
    }
}

pub(super) fn violation(kind: ConstraintKind, constraint: &str) -> Violation {
    Violation {
        kind,
        constraint: constraint.to_string(),
        staff_id: Some("s1".into()),
        date: "2025-03-01".parse().ok(),
        message: format!("{constraint} broken"),
    }
}

pub(super) fn result_with(violations: Vec<Violation>, score: f64) -> ValidationResult {
    ValidationResult {
        is_valid: violations.is_empty(),
        violations,
        warnings: vec![],
        score,
    }
}

type OracleScript = dyn Fn(&OracleRequest, usize) -> ScheduleResult<CandidateSchedule> + Send + Sync;

/// Oracle double driven by a closure over (request, zero-based call number).
pub(super) struct ScriptedOracle {
    script: Box<OracleScript>,
    pub requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn new(
        script: impl Fn(&OracleRequest, usize) -> ScheduleResult<CandidateSchedule>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CandidateOracle for ScriptedOracle {
    async fn generate(&self, request: &OracleRequest) -> ScheduleResult<CandidateSchedule> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.script)(request, call)
    }
}

type ValidatorScript =
    dyn Fn(&CandidateSchedule, usize) -> ScheduleResult<ValidationResult> + Send + Sync;

pub(super) struct ScriptedValidator {
    script: Box<ValidatorScript>,
    calls: Mutex<usize>,
}

impl ScriptedValidator {
    pub fn new(
        script: impl Fn(&CandidateSchedule, usize) -> ScheduleResult<ValidationResult>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(0),
        })
    }

    pub fn always(result: ValidationResult) -> Arc<Self> {
        Self::new(move |_, _| Ok(result.clone()))
    }
}

#[async_trait]
impl ScheduleValidator for ScriptedValidator {
    async fn validate(
        &self,
        _period: Period,
        candidate: &CandidateSchedule,
    ) -> ScheduleResult<ValidationResult> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls - 1
        };
        (self.script)(candidate, call)
    }
}

/// Delegates to a real store but fails the entry batch of the Nth pattern.
pub(super) struct FailingEntries {
    pub inner: Arc<ShiftStore>,
    pub fail_on: usize,
    seen: Mutex<usize>,
}

impl FailingEntries {
    pub fn new(inner: Arc<ShiftStore>, fail_on: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_on,
            seen: Mutex::new(0),
        })
    }
}

#[async_trait]
impl PatternStore for FailingEntries {
    async fn persist_pattern(
        &self,
        period: Period,
        reasoning: &str,
        score: f64,
        violations: &[ConstraintViolation],
    ) -> ScheduleResult<String> {
        self.inner
            .persist_pattern(period, reasoning, score, violations)
            .await
    }

    async fn persist_entries(
        &self,
        pattern_id: &str,
        entries: &[ShiftEntry],
    ) -> ScheduleResult<()> {
        let n = {
            let mut seen = self.seen.lock().unwrap();
            *seen += 1;
            *seen
        };
        if n == self.fail_on {
            return Err(ScheduleError::Persistence("disk full".into()));
        }
        self.inner.persist_entries(pattern_id, entries).await
    }

    async fn discard_pattern(&self, pattern_id: &str) -> ScheduleResult<()> {
        self.inner.discard_pattern(pattern_id).await
    }
}

/// Job store whose `set_completed` always fails. With `fail_set_failed` the
/// row is left in `processing` after the run returns.
pub(super) struct StuckJobs {
    pub inner: Arc<ShiftStore>,
    pub fail_set_failed: bool,
}

impl StuckJobs {
    pub fn new(inner: Arc<ShiftStore>, fail_set_failed: bool) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_set_failed,
        })
    }
}

#[async_trait]
impl JobStore for StuckJobs {
    async fn create_job(&self, period: Period, pattern_count: usize) -> ScheduleResult<GenerationJob> {
        self.inner.create_job(period, pattern_count).await
    }

    async fn has_active_job(&self, period: Period) -> ScheduleResult<bool> {
        self.inner.has_active_job(period).await
    }

    async fn get_job(&self, job_id: &str) -> ScheduleResult<Option<GenerationJob>> {
        self.inner.get_job(job_id).await
    }

    async fn set_processing(&self, job_id: &str) -> ScheduleResult<()> {
        self.inner.set_processing(job_id).await
    }

    async fn update_progress(&self, job_id: &str, progress: u8, message: &str) -> ScheduleResult<()> {
        self.inner.update_progress(job_id, progress, message).await
    }

    async fn set_completed(&self, _job_id: &str) -> ScheduleResult<()> {
        Err(ScheduleError::Persistence("database is locked".into()))
    }

    async fn set_failed(&self, job_id: &str, message: &str) -> ScheduleResult<()> {
        if self.fail_set_failed {
            return Err(ScheduleError::Persistence("database is locked".into()));
        }
        self.inner.set_failed(job_id, message).await
    }
}
