//! Manual adjustments to the entries of a stored pattern.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use super::ShiftStore;
use super::patterns::{ENTRY_COLUMNS, entry_from_row, load_pattern};
use crate::core::error::{ScheduleError, ScheduleResult};
use crate::core::schedule::ShiftEntry;
use crate::core::store::types::{EntryUpdate, PatternStatus, ShiftPattern, StoredEntry};

fn load_entry(db: &Connection, entry_id: &str) -> ScheduleResult<StoredEntry> {
    db.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM shift_entries WHERE entry_id = ?1"),
        params![entry_id],
        entry_from_row,
    )
    .optional()?
    .ok_or_else(|| ScheduleError::NotFound(format!("entry {entry_id}")))
}

fn editable_pattern(db: &Connection, pattern_id: &str) -> ScheduleResult<ShiftPattern> {
    let pattern = load_pattern(db, pattern_id)?;
    if pattern.status == PatternStatus::Finalized {
        return Err(ScheduleError::InvalidTransition(format!(
            "pattern {pattern_id} is finalized and cannot be edited"
        )));
    }
    Ok(pattern)
}

fn check_times(entry: &ShiftEntry) -> ScheduleResult<()> {
    if entry.start_time >= entry.end_time {
        return Err(ScheduleError::ValidationInput(format!(
            "shift must end after it starts, got {}-{}",
            entry.start_time, entry.end_time
        )));
    }
    Ok(())
}

fn touch_pattern(db: &Connection, pattern_id: &str) -> ScheduleResult<()> {
    db.execute(
        "UPDATE shift_patterns SET updated_at = CURRENT_TIMESTAMP WHERE pattern_id = ?1",
        params![pattern_id],
    )?;
    Ok(())
}

impl ShiftStore {
    pub async fn get_entry(&self, entry_id: &str) -> ScheduleResult<StoredEntry> {
        let db = self.db.lock().await;
        load_entry(&db, entry_id)
    }

    /// Adds a hand-written entry to a draft or selected pattern.
    pub async fn add_entry(
        &self,
        pattern_id: &str,
        entry: &ShiftEntry,
    ) -> ScheduleResult<StoredEntry> {
        if entry.staff_id.trim().is_empty() {
            return Err(ScheduleError::ValidationInput("staff id is empty".into()));
        }
        check_times(entry)?;

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let pattern = editable_pattern(&tx, pattern_id)?;
        if !pattern.period.contains(entry.date) {
            return Err(ScheduleError::ValidationInput(format!(
                "{} is outside {}",
                entry.date, pattern.period
            )));
        }

        let entry_id = uuid::Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO shift_entries (entry_id, pattern_id, staff_id, date, start_time, end_time, break_minutes, is_manual_edit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
            params![
                entry_id,
                pattern_id,
                entry.staff_id,
                entry.date.to_string(),
                entry.start_time.to_string(),
                entry.end_time.to_string(),
                i64::from(entry.break_minutes)
            ],
        )?;
        touch_pattern(&tx, pattern_id)?;
        let stored = load_entry(&tx, &entry_id)?;
        tx.commit()?;
        info!(
            "Added entry {} to pattern {} ({} on {})",
            entry_id, pattern_id, entry.staff_id, entry.date
        );
        Ok(stored)
    }

    /// Changes the times or break of an entry and marks it as manually edited.
    pub async fn update_entry(
        &self,
        entry_id: &str,
        update: &EntryUpdate,
    ) -> ScheduleResult<StoredEntry> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let current = load_entry(&tx, entry_id)?;
        editable_pattern(&tx, &current.pattern_id)?;

        let mut entry = current.entry.clone();
        if let Some(start) = update.start_time {
            entry.start_time = start;
        }
        if let Some(end) = update.end_time {
            entry.end_time = end;
        }
        if let Some(minutes) = update.break_minutes {
            entry.break_minutes = minutes;
        }
        check_times(&entry)?;

        tx.execute(
            "UPDATE shift_entries
             SET start_time = ?1, end_time = ?2, break_minutes = ?3, is_manual_edit = 1,
                 updated_at = CURRENT_TIMESTAMP
             WHERE entry_id = ?4",
            params![
                entry.start_time.to_string(),
                entry.end_time.to_string(),
                i64::from(entry.break_minutes),
                entry_id
            ],
        )?;
        touch_pattern(&tx, &current.pattern_id)?;
        let stored = load_entry(&tx, entry_id)?;
        tx.commit()?;
        info!("Updated entry {} of pattern {}", entry_id, current.pattern_id);
        Ok(stored)
    }

    pub async fn delete_entry(&self, entry_id: &str) -> ScheduleResult<()> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let current = load_entry(&tx, entry_id)?;
        editable_pattern(&tx, &current.pattern_id)?;
        tx.execute(
            "DELETE FROM shift_entries WHERE entry_id = ?1",
            params![entry_id],
        )?;
        touch_pattern(&tx, &current.pattern_id)?;
        tx.commit()?;
        info!("Deleted entry {} from pattern {}", entry_id, current.pattern_id);
        Ok(())
    }
}
