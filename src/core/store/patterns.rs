use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use super::ShiftStore;
use crate::core::error::{ScheduleError, ScheduleResult};
use crate::core::schedule::{ConstraintViolation, Period, ShiftEntry};
use crate::core::store::types::{PatternStatus, PatternSummary, ShiftPattern, StoredEntry};

pub(super) const ENTRY_COLUMNS: &str =
    "entry_id, pattern_id, staff_id, date, start_time, end_time, break_minutes, is_manual_edit";

const PATTERN_COLUMNS: &str =
    "pattern_id, period, status, reasoning, score, violations_json, created_at, updated_at";

pub(super) fn invalid_text(index: usize, name: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(index, name.to_string(), rusqlite::types::Type::Text)
}

fn pattern_from_row(row: &Row<'_>) -> rusqlite::Result<ShiftPattern> {
    let period: String = row.get(1)?;
    let status: String = row.get(2)?;
    let violations_json: String = row.get(5)?;
    Ok(ShiftPattern {
        pattern_id: row.get(0)?,
        period: period.parse().map_err(|_| invalid_text(1, "period"))?,
        status: PatternStatus::from_status(&status).ok_or_else(|| invalid_text(2, "status"))?,
        reasoning: row.get(3)?,
        score: row.get(4)?,
        violations: serde_json::from_str(&violations_json)
            .map_err(|_| invalid_text(5, "violations_json"))?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub(super) fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<StoredEntry> {
    let date: String = row.get(3)?;
    let start: String = row.get(4)?;
    let end: String = row.get(5)?;
    let break_minutes: i64 = row.get(6)?;
    Ok(StoredEntry {
        entry_id: row.get(0)?,
        pattern_id: row.get(1)?,
        entry: ShiftEntry {
            staff_id: row.get(2)?,
            date: date.parse().map_err(|_| invalid_text(3, "date"))?,
            start_time: start.parse().map_err(|_| invalid_text(4, "start_time"))?,
            end_time: end.parse().map_err(|_| invalid_text(5, "end_time"))?,
            break_minutes: break_minutes.max(0) as u32,
        },
        is_manual_edit: row.get(7)?,
    })
}

pub(super) fn load_pattern(db: &Connection, pattern_id: &str) -> ScheduleResult<ShiftPattern> {
    db.query_row(
        &format!("SELECT {PATTERN_COLUMNS} FROM shift_patterns WHERE pattern_id = ?1"),
        params![pattern_id],
        pattern_from_row,
    )
    .optional()?
    .ok_or_else(|| ScheduleError::NotFound(format!("pattern {pattern_id}")))
}

impl ShiftStore {
    pub async fn persist_pattern(
        &self,
        period: Period,
        reasoning: &str,
        score: f64,
        violations: &[ConstraintViolation],
    ) -> ScheduleResult<String> {
        let pattern_id = uuid::Uuid::new_v4().to_string();
        let violations_json = serde_json::to_string(violations)
            .map_err(|e| ScheduleError::Persistence(e.to_string()))?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO shift_patterns (pattern_id, period, status, reasoning, score, violations_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                pattern_id,
                period.to_string(),
                PatternStatus::Draft.as_str(),
                reasoning,
                score,
                violations_json
            ],
        )?;
        debug!("Stored pattern {} for {} (score {:.2})", pattern_id, period, score);
        Ok(pattern_id)
    }

    pub async fn persist_entries(
        &self,
        pattern_id: &str,
        entries: &[ShiftEntry],
    ) -> ScheduleResult<()> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO shift_entries (entry_id, pattern_id, staff_id, date, start_time, end_time, break_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    uuid::Uuid::new_v4().to_string(),
                    pattern_id,
                    entry.staff_id,
                    entry.date.to_string(),
                    entry.start_time.to_string(),
                    entry.end_time.to_string(),
                    i64::from(entry.break_minutes)
                ])?;
            }
        }
        tx.commit()?;
        debug!("Stored {} entries for pattern {}", entries.len(), pattern_id);
        Ok(())
    }

    /// Deletes a pattern and, through the cascade, any entries it has.
    pub async fn discard_pattern(&self, pattern_id: &str) -> ScheduleResult<()> {
        let db = self.db.lock().await;
        let removed = db.execute(
            "DELETE FROM shift_patterns WHERE pattern_id = ?1",
            params![pattern_id],
        )?;
        debug!("Discarded pattern {} ({} rows)", pattern_id, removed);
        Ok(())
    }

    pub async fn get_pattern(&self, pattern_id: &str) -> ScheduleResult<ShiftPattern> {
        let db = self.db.lock().await;
        load_pattern(&db, pattern_id)
    }

    /// Patterns for a period in creation order.
    pub async fn list_patterns(&self, period: Period) -> ScheduleResult<Vec<ShiftPattern>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {PATTERN_COLUMNS} FROM shift_patterns WHERE period = ?1 ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![period.to_string()], pattern_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub async fn list_entries(&self, pattern_id: &str) -> ScheduleResult<Vec<StoredEntry>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {ENTRY_COLUMNS}
             FROM shift_entries WHERE pattern_id = ?1 ORDER BY date ASC, staff_id ASC, start_time ASC"
        ))?;
        let rows = stmt.query_map(params![pattern_id], entry_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Entry count and worked hours per staff member, keyed by display name.
    pub async fn pattern_summary(&self, pattern_id: &str) -> ScheduleResult<PatternSummary> {
        let entries = self.list_entries(pattern_id).await?;
        let names: BTreeMap<String, String> = {
            let db = self.db.lock().await;
            let mut stmt = db.prepare(
                "SELECT DISTINCT s.id, s.name FROM staff s
                 JOIN shift_entries e ON e.staff_id = s.id WHERE e.pattern_id = ?1",
            )?;
            let rows = stmt.query_map(params![pattern_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut out = BTreeMap::new();
            for row in rows {
                let (id, name) = row?;
                out.insert(id, name);
            }
            out
        };

        let mut summary = PatternSummary {
            total_entries: entries.len(),
            ..Default::default()
        };
        for stored in &entries {
            let key = names
                .get(&stored.entry.staff_id)
                .cloned()
                .unwrap_or_else(|| stored.entry.staff_id.clone());
            *summary.staff_hours.entry(key).or_insert(0.0) += stored.entry.worked_hours();
        }
        Ok(summary)
    }

    /// Marks one pattern selected and returns every other non-finalized
    /// pattern of the same period to draft.
    pub async fn select_pattern(&self, pattern_id: &str) -> ScheduleResult<ShiftPattern> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let pattern = load_pattern(&tx, pattern_id)?;
        if pattern.status == PatternStatus::Finalized {
            return Err(ScheduleError::InvalidTransition(format!(
                "pattern {pattern_id} is already finalized"
            )));
        }
        tx.execute(
            "UPDATE shift_patterns SET status = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE period = ?2 AND pattern_id <> ?3 AND status = ?4",
            params![
                PatternStatus::Draft.as_str(),
                pattern.period.to_string(),
                pattern_id,
                PatternStatus::Selected.as_str()
            ],
        )?;
        tx.execute(
            "UPDATE shift_patterns SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE pattern_id = ?2",
            params![PatternStatus::Selected.as_str(), pattern_id],
        )?;
        let selected = load_pattern(&tx, pattern_id)?;
        tx.commit()?;
        info!("Selected pattern {} for {}", pattern_id, selected.period);
        Ok(selected)
    }

    /// Finalizing an already finalized pattern is a no-op.
    pub async fn finalize_pattern(&self, pattern_id: &str) -> ScheduleResult<ShiftPattern> {
        let db = self.db.lock().await;
        let pattern = load_pattern(&db, pattern_id)?;
        if pattern.status == PatternStatus::Finalized {
            return Ok(pattern);
        }
        db.execute(
            "UPDATE shift_patterns SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE pattern_id = ?2",
            params![PatternStatus::Finalized.as_str(), pattern_id],
        )?;
        info!("Finalized pattern {} for {}", pattern_id, pattern.period);
        load_pattern(&db, pattern_id)
    }
}
