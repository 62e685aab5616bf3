use rusqlite::{Row, params};
use serde::Deserialize;
use tracing::{debug, warn};

use super::ShiftStore;
use crate::core::error::{ScheduleError, ScheduleResult};
use crate::core::schedule::{
    AvailabilityKind, AvailabilityMark, ConstraintCatalog, ConstraintKind, ConstraintRule,
    MonthlyHourTarget, Period, RuleConfig, Staff,
};

/// Rule as written by operators: free-form config keyed by category.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDefinition {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(alias = "type")]
    pub kind: ConstraintKind,
    pub category: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Catalog import document for one period.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogImport {
    pub period: Period,
    #[serde(default)]
    pub staff: Vec<Staff>,
    #[serde(default)]
    pub availability: Vec<AvailabilityMark>,
    #[serde(default)]
    pub targets: Vec<MonthlyHourTarget>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

fn invalid_text(index: usize, name: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(index, name.to_string(), rusqlite::types::Type::Text)
}

fn mark_from_row(row: &Row<'_>) -> rusqlite::Result<AvailabilityMark> {
    let date: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let start: Option<String> = row.get(3)?;
    let end: Option<String> = row.get(4)?;
    Ok(AvailabilityMark {
        staff_id: row.get(0)?,
        date: date.parse().map_err(|_| invalid_text(1, "date"))?,
        kind: AvailabilityKind::from_name(&kind).ok_or_else(|| invalid_text(2, "kind"))?,
        start_time: start
            .map(|s| s.parse())
            .transpose()
            .map_err(|_| invalid_text(3, "start_time"))?,
        end_time: end
            .map(|s| s.parse())
            .transpose()
            .map_err(|_| invalid_text(4, "end_time"))?,
    })
}

struct RuleRow {
    id: String,
    name: String,
    kind: String,
    category: String,
    config_json: String,
    priority: i64,
}

impl ShiftStore {
    pub async fn upsert_staff(&self, staff: &Staff) -> ScheduleResult<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO staff (id, name, role, employment_type, is_active) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, role = excluded.role,
                employment_type = excluded.employment_type, is_active = excluded.is_active",
            params![
                staff.id,
                staff.name,
                staff.role,
                staff.employment_type,
                staff.active
            ],
        )?;
        Ok(())
    }

    /// The mark is filed under the period its date falls in.
    pub async fn add_availability(&self, mark: &AvailabilityMark) -> ScheduleResult<()> {
        let period = Period::from_date(mark.date);
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO availability_marks (staff_id, period, date, kind, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                mark.staff_id,
                period.to_string(),
                mark.date.to_string(),
                mark.kind.as_str(),
                mark.start_time.map(|t| t.to_string()),
                mark.end_time.map(|t| t.to_string())
            ],
        )?;
        Ok(())
    }

    pub async fn set_monthly_target(
        &self,
        period: Period,
        target: &MonthlyHourTarget,
    ) -> ScheduleResult<()> {
        if target.min_hours > target.max_hours {
            return Err(ScheduleError::Config(format!(
                "target for {} has min {} above max {}",
                target.staff_id, target.min_hours, target.max_hours
            )));
        }
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO monthly_hour_targets (staff_id, period, min_hours, max_hours, note)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(staff_id, period) DO UPDATE SET min_hours = excluded.min_hours,
                max_hours = excluded.max_hours, note = excluded.note, updated_at = CURRENT_TIMESTAMP",
            params![
                target.staff_id,
                period.to_string(),
                target.min_hours,
                target.max_hours,
                target.note
            ],
        )?;
        Ok(())
    }

    pub async fn upsert_rule(&self, rule: &RuleDefinition) -> ScheduleResult<String> {
        let id = rule
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let config_json = serde_json::to_string(&rule.config)
            .map_err(|e| ScheduleError::Persistence(e.to_string()))?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO constraint_rules (id, name, kind, category, config_json, priority, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, kind = excluded.kind,
                category = excluded.category, config_json = excluded.config_json,
                priority = excluded.priority, is_active = excluded.is_active",
            params![
                id,
                rule.name,
                rule.kind.as_str(),
                rule.category,
                config_json,
                rule.priority,
                rule.active
            ],
        )?;
        Ok(id)
    }

    /// Writes a whole import document. Returns the number of records written.
    pub async fn import_catalog(&self, import: &CatalogImport) -> ScheduleResult<usize> {
        for staff in &import.staff {
            self.upsert_staff(staff).await?;
        }
        for mark in &import.availability {
            if !import.period.contains(mark.date) {
                return Err(ScheduleError::Config(format!(
                    "availability date {} is outside {}",
                    mark.date, import.period
                )));
            }
            self.add_availability(mark).await?;
        }
        for target in &import.targets {
            self.set_monthly_target(import.period, target).await?;
        }
        for rule in &import.rules {
            self.upsert_rule(rule).await?;
        }
        Ok(import.staff.len() + import.availability.len() + import.targets.len() + import.rules.len())
    }

    /// Active staff, the period's marks and targets, and active rules by priority.
    pub async fn load_catalog(&self, period: Period) -> ScheduleResult<ConstraintCatalog> {
        let db = self.db.lock().await;
        let key = period.to_string();

        let mut stmt = db.prepare(
            "SELECT id, name, role, employment_type, is_active FROM staff WHERE is_active = 1 ORDER BY id ASC",
        )?;
        let staff = stmt
            .query_map([], |row| {
                Ok(Staff {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    role: row.get(2)?,
                    employment_type: row.get(3)?,
                    active: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = db.prepare(
            "SELECT staff_id, date, kind, start_time, end_time FROM availability_marks
             WHERE period = ?1 ORDER BY date ASC, staff_id ASC",
        )?;
        let availability = stmt
            .query_map(params![key], mark_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = db.prepare(
            "SELECT staff_id, min_hours, max_hours, note FROM monthly_hour_targets
             WHERE period = ?1 ORDER BY staff_id ASC",
        )?;
        let targets = stmt
            .query_map(params![key], |row| {
                Ok(MonthlyHourTarget {
                    staff_id: row.get(0)?,
                    min_hours: row.get(1)?,
                    max_hours: row.get(2)?,
                    note: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = db.prepare(
            "SELECT id, name, kind, category, config_json, priority FROM constraint_rules
             WHERE is_active = 1 ORDER BY priority DESC, name ASC",
        )?;
        let rule_rows = stmt
            .query_map([], |row| {
                Ok(RuleRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    kind: row.get(2)?,
                    category: row.get(3)?,
                    config_json: row.get(4)?,
                    priority: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rules = Vec::with_capacity(rule_rows.len());
        for row in rule_rows {
            let Some(kind) = ConstraintKind::from_name(&row.kind) else {
                warn!("Skipping rule '{}': unknown kind '{}'", row.name, row.kind);
                continue;
            };
            let value = match serde_json::from_str::<serde_json::Value>(&row.config_json) {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        "Skipping rule '{}' ({}): undecodable config: {}",
                        row.name, row.category, e
                    );
                    continue;
                }
            };
            rules.push(ConstraintRule {
                config: RuleConfig::decode(&row.category, &value),
                id: row.id,
                name: row.name,
                kind,
                priority: row.priority,
            });
        }

        debug!(
            "Loaded catalog for {}: {} staff, {} marks, {} targets, {} rules",
            period,
            staff.len(),
            availability.len(),
            targets.len(),
            rules.len()
        );
        Ok(ConstraintCatalog {
            staff,
            availability,
            targets,
            rules,
        })
    }
}
