use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::orchestrator::JobStatus;
use crate::core::schedule::{ConstraintViolation, Period, ShiftEntry, TimeOfDay};

#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub job_id: String,
    pub period: Period,
    pub status: JobStatus,
    pub pattern_count: usize,
    pub progress: u8,
    pub status_message: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    Draft,
    Selected,
    Finalized,
}

impl PatternStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternStatus::Draft => "draft",
            PatternStatus::Selected => "selected",
            PatternStatus::Finalized => "finalized",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(PatternStatus::Draft),
            "selected" => Some(PatternStatus::Selected),
            "finalized" => Some(PatternStatus::Finalized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShiftPattern {
    pub pattern_id: String,
    pub period: Period,
    pub status: PatternStatus,
    pub reasoning: String,
    pub score: f64,
    pub violations: Vec<ConstraintViolation>,
    pub created_at: String,
    pub updated_at: String,
}

/// A persisted entry row, owned by exactly one pattern.
#[derive(Debug, Clone, Serialize)]
pub struct StoredEntry {
    pub entry_id: String,
    pub pattern_id: String,
    #[serde(flatten)]
    pub entry: ShiftEntry,
    /// Set once the entry is added or changed by hand after generation.
    pub is_manual_edit: bool,
}

/// Partial change to a stored entry; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryUpdate {
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub break_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PatternSummary {
    pub total_entries: usize,
    /// Worked hours keyed by staff name (staff id when the name is unknown).
    pub staff_hours: BTreeMap<String, f64>,
}
