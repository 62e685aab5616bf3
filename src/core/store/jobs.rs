use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, warn};

use super::{ShiftStore, conflict_or_persistence};
use crate::core::error::{ScheduleError, ScheduleResult};
use crate::core::orchestrator::{JobStatus, can_transition};
use crate::core::schedule::Period;
use crate::core::store::types::GenerationJob;

const JOB_COLUMNS: &str = "job_id, period, status, pattern_count, progress, status_message, error_message, created_at, started_at, completed_at";

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<GenerationJob> {
    let period: String = row.get(1)?;
    let status: String = row.get(2)?;
    let pattern_count: i64 = row.get(3)?;
    let progress: i64 = row.get(4)?;
    Ok(GenerationJob {
        job_id: row.get(0)?,
        period: period.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(1, "period".into(), rusqlite::types::Type::Text)
        })?,
        status: JobStatus::from_status(&status).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(2, "status".into(), rusqlite::types::Type::Text)
        })?,
        pattern_count: pattern_count.max(0) as usize,
        progress: progress.clamp(0, 100) as u8,
        status_message: row.get(5)?,
        error_message: row.get(6)?,
        created_at: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
    })
}

fn load_job(db: &Connection, job_id: &str) -> ScheduleResult<Option<GenerationJob>> {
    let job = db
        .query_row(
            &format!("SELECT {JOB_COLUMNS} FROM generation_jobs WHERE job_id = ?1"),
            params![job_id],
            job_from_row,
        )
        .optional()?;
    Ok(job)
}

/// Checks the state machine before any status write.
fn require_transition(db: &Connection, job_id: &str, to: JobStatus) -> ScheduleResult<()> {
    let job = load_job(db, job_id)?.ok_or_else(|| ScheduleError::NotFound(format!("job {job_id}")))?;
    if !can_transition(job.status, to) {
        warn!(
            "Rejected job {} transition {} -> {}",
            job_id,
            job.status.as_str(),
            to.as_str()
        );
        return Err(ScheduleError::InvalidTransition(format!(
            "job {} cannot move from {} to {}",
            job_id,
            job.status.as_str(),
            to.as_str()
        )));
    }
    Ok(())
}

impl ShiftStore {
    pub async fn create_job(
        &self,
        period: Period,
        pattern_count: usize,
    ) -> ScheduleResult<GenerationJob> {
        let job_id = uuid::Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO generation_jobs (job_id, period, status, pattern_count, progress) VALUES (?1, ?2, ?3, ?4, 0)",
            params![
                job_id,
                period.to_string(),
                JobStatus::Pending.as_str(),
                pattern_count as i64
            ],
        )
        .map_err(|e| conflict_or_persistence(e, &period.to_string()))?;
        debug!("Created generation job {} for {}", job_id, period);
        load_job(&db, &job_id)?
            .ok_or_else(|| ScheduleError::Persistence(format!("job {job_id} vanished after insert")))
    }

    pub async fn get_job(&self, job_id: &str) -> ScheduleResult<Option<GenerationJob>> {
        let db = self.db.lock().await;
        load_job(&db, job_id)
    }

    /// Most recent job for a period, whatever its status.
    pub async fn latest_job(&self, period: Period) -> ScheduleResult<Option<GenerationJob>> {
        let db = self.db.lock().await;
        let job = db
            .query_row(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM generation_jobs WHERE period = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![period.to_string()],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    pub async fn has_active_job(&self, period: Period) -> ScheduleResult<bool> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM generation_jobs WHERE period = ?1 AND status IN ('pending', 'processing')",
            params![period.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub async fn set_processing(&self, job_id: &str) -> ScheduleResult<()> {
        let db = self.db.lock().await;
        require_transition(&db, job_id, JobStatus::Processing)?;
        db.execute(
            "UPDATE generation_jobs SET status = ?1, started_at = CURRENT_TIMESTAMP WHERE job_id = ?2",
            params![JobStatus::Processing.as_str(), job_id],
        )?;
        Ok(())
    }

    /// Progress never decreases and only moves while the job is processing.
    pub async fn update_progress(
        &self,
        job_id: &str,
        progress: u8,
        message: &str,
    ) -> ScheduleResult<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE generation_jobs SET progress = MAX(progress, ?1), status_message = ?2
             WHERE job_id = ?3 AND status = 'processing'",
            params![i64::from(progress), message, job_id],
        )?;
        Ok(())
    }

    pub async fn set_completed(&self, job_id: &str) -> ScheduleResult<()> {
        let db = self.db.lock().await;
        require_transition(&db, job_id, JobStatus::Completed)?;
        db.execute(
            "UPDATE generation_jobs SET status = ?1, progress = 100, completed_at = CURRENT_TIMESTAMP WHERE job_id = ?2",
            params![JobStatus::Completed.as_str(), job_id],
        )?;
        Ok(())
    }

    pub async fn set_failed(&self, job_id: &str, message: &str) -> ScheduleResult<()> {
        let db = self.db.lock().await;
        require_transition(&db, job_id, JobStatus::Failed)?;
        db.execute(
            "UPDATE generation_jobs SET status = ?1, error_message = ?2, completed_at = CURRENT_TIMESTAMP WHERE job_id = ?3",
            params![JobStatus::Failed.as_str(), message, job_id],
        )?;
        Ok(())
    }
}
