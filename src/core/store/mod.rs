//! SQLite-backed storage for catalog data, generation jobs, and accepted patterns.

mod catalog;
mod entries;
mod jobs;
mod patterns;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::error::{ScheduleError, ScheduleResult};
use crate::core::schedule::{ConstraintCatalog, ConstraintViolation, Period, ShiftEntry};

pub use catalog::{CatalogImport, RuleDefinition};
pub use types::{
    EntryUpdate, GenerationJob, PatternStatus, PatternSummary, ShiftPattern, StoredEntry,
};

/// Read-only catalog access for the validator and the oracle prompt.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load_catalog(&self, period: Period) -> ScheduleResult<ConstraintCatalog>;
}

/// Job lifecycle persistence. `create_job` must refuse a second active job per period.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, period: Period, pattern_count: usize)
    -> ScheduleResult<GenerationJob>;
    async fn has_active_job(&self, period: Period) -> ScheduleResult<bool>;
    async fn get_job(&self, job_id: &str) -> ScheduleResult<Option<GenerationJob>>;
    async fn set_processing(&self, job_id: &str) -> ScheduleResult<()>;
    async fn update_progress(&self, job_id: &str, progress: u8, message: &str)
    -> ScheduleResult<()>;
    async fn set_completed(&self, job_id: &str) -> ScheduleResult<()>;
    async fn set_failed(&self, job_id: &str, message: &str) -> ScheduleResult<()>;
}

/// Writes for accepted candidates.
#[async_trait]
pub trait PatternStore: Send + Sync {
    async fn persist_pattern(
        &self,
        period: Period,
        reasoning: &str,
        score: f64,
        violations: &[ConstraintViolation],
    ) -> ScheduleResult<String>;

    /// Stores all entries of one pattern, or none of them.
    async fn persist_entries(&self, pattern_id: &str, entries: &[ShiftEntry])
    -> ScheduleResult<()>;

    /// Removes a pattern whose entry batch never committed.
    async fn discard_pattern(&self, pattern_id: &str) -> ScheduleResult<()>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS staff (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT '',
        employment_type TEXT NOT NULL DEFAULT '',
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS availability_marks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        staff_id TEXT NOT NULL,
        period TEXT NOT NULL,
        date TEXT NOT NULL,
        kind TEXT NOT NULL,
        start_time TEXT,
        end_time TEXT,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS monthly_hour_targets (
        staff_id TEXT NOT NULL,
        period TEXT NOT NULL,
        min_hours REAL NOT NULL,
        max_hours REAL NOT NULL,
        note TEXT,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (staff_id, period)
    );

    CREATE TABLE IF NOT EXISTS constraint_rules (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        category TEXT NOT NULL,
        config_json TEXT NOT NULL DEFAULT '{}',
        priority INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS generation_jobs (
        job_id TEXT PRIMARY KEY,
        period TEXT NOT NULL,
        status TEXT NOT NULL,
        pattern_count INTEGER NOT NULL,
        progress INTEGER NOT NULL DEFAULT 0,
        status_message TEXT,
        error_message TEXT,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        started_at DATETIME,
        completed_at DATETIME
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_generation_jobs_active_period
        ON generation_jobs(period) WHERE status IN ('pending', 'processing');

    CREATE TABLE IF NOT EXISTS shift_patterns (
        pattern_id TEXT PRIMARY KEY,
        period TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft',
        reasoning TEXT NOT NULL,
        score REAL NOT NULL,
        violations_json TEXT NOT NULL DEFAULT '[]',
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_shift_patterns_period ON shift_patterns(period, created_at);

    CREATE TABLE IF NOT EXISTS shift_entries (
        entry_id TEXT PRIMARY KEY,
        pattern_id TEXT NOT NULL REFERENCES shift_patterns(pattern_id) ON DELETE CASCADE,
        staff_id TEXT NOT NULL CHECK (staff_id <> ''),
        date TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        break_minutes INTEGER NOT NULL DEFAULT 0,
        is_manual_edit INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_shift_entries_pattern ON shift_entries(pattern_id, date);
";

pub struct ShiftStore {
    db: Arc<Mutex<Connection>>,
}

impl ShiftStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> ScheduleResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ScheduleError::Persistence(e.to_string()))?;
        }
        let db = Connection::open(path)?;
        info!("Opened schedule database at {}", path.display());
        Self::with_connection(db)
    }

    pub fn in_memory() -> ScheduleResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(db: Connection) -> ScheduleResult<Self> {
        db.execute_batch("PRAGMA foreign_keys = ON;")?;
        db.execute_batch(SCHEMA)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

/// Maps a uniqueness failure to `Conflict`, everything else to `Persistence`.
pub(crate) fn conflict_or_persistence(err: rusqlite::Error, what: &str) -> ScheduleError {
    match err.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => ScheduleError::Conflict(what.to_string()),
        _ => ScheduleError::Persistence(err.to_string()),
    }
}

#[async_trait]
impl CatalogSource for ShiftStore {
    async fn load_catalog(&self, period: Period) -> ScheduleResult<ConstraintCatalog> {
        ShiftStore::load_catalog(self, period).await
    }
}

#[async_trait]
impl JobStore for ShiftStore {
    async fn create_job(
        &self,
        period: Period,
        pattern_count: usize,
    ) -> ScheduleResult<GenerationJob> {
        ShiftStore::create_job(self, period, pattern_count).await
    }

    async fn has_active_job(&self, period: Period) -> ScheduleResult<bool> {
        ShiftStore::has_active_job(self, period).await
    }

    async fn get_job(&self, job_id: &str) -> ScheduleResult<Option<GenerationJob>> {
        ShiftStore::get_job(self, job_id).await
    }

    async fn set_processing(&self, job_id: &str) -> ScheduleResult<()> {
        ShiftStore::set_processing(self, job_id).await
    }

    async fn update_progress(
        &self,
        job_id: &str,
        progress: u8,
        message: &str,
    ) -> ScheduleResult<()> {
        ShiftStore::update_progress(self, job_id, progress, message).await
    }

    async fn set_completed(&self, job_id: &str) -> ScheduleResult<()> {
        ShiftStore::set_completed(self, job_id).await
    }

    async fn set_failed(&self, job_id: &str, message: &str) -> ScheduleResult<()> {
        ShiftStore::set_failed(self, job_id, message).await
    }
}

#[async_trait]
impl PatternStore for ShiftStore {
    async fn persist_pattern(
        &self,
        period: Period,
        reasoning: &str,
        score: f64,
        violations: &[ConstraintViolation],
    ) -> ScheduleResult<String> {
        ShiftStore::persist_pattern(self, period, reasoning, score, violations).await
    }

    async fn persist_entries(
        &self,
        pattern_id: &str,
        entries: &[ShiftEntry],
    ) -> ScheduleResult<()> {
        ShiftStore::persist_entries(self, pattern_id, entries).await
    }

    async fn discard_pattern(&self, pattern_id: &str) -> ScheduleResult<()> {
        ShiftStore::discard_pattern(self, pattern_id).await
    }
}
