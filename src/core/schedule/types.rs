use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::calendar::{TimeOfDay, worked_hours};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Hard,
    Soft,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintKind::Hard => "hard",
            ConstraintKind::Soft => "soft",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "hard" => Some(ConstraintKind::Hard),
            "soft" => Some(ConstraintKind::Soft),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityKind {
    Available,
    Unavailable,
    Preferred,
}

impl AvailabilityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AvailabilityKind::Available => "available",
            AvailabilityKind::Unavailable => "unavailable",
            AvailabilityKind::Preferred => "preferred",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "available" => Some(AvailabilityKind::Available),
            "unavailable" => Some(AvailabilityKind::Unavailable),
            "preferred" => Some(AvailabilityKind::Preferred),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub employment_type: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// A staff member's preference for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityMark {
    pub staff_id: String,
    pub date: NaiveDate,
    pub kind: AvailabilityKind,
    #[serde(default)]
    pub start_time: Option<TimeOfDay>,
    #[serde(default)]
    pub end_time: Option<TimeOfDay>,
}

/// Preferred monthly hour range for one staff member within a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyHourTarget {
    pub staff_id: String,
    pub min_hours: f64,
    pub max_hours: f64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Category-specific rule configuration, decoded once when the catalog loads.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleConfig {
    MaxConsecutiveDays { max_days: u32 },
    MinStaff { min_count: u32 },
    MaxStaff { max_count: u32 },
    RestHours { min_hours: f64 },
    /// Monthly hours are scored from the hour targets, not from rule config.
    MonthlyHours,
    Unrecognized { category: String },
}

pub const DEFAULT_MAX_CONSECUTIVE_DAYS: u32 = 5;
pub const DEFAULT_MIN_STAFF: u32 = 2;
pub const DEFAULT_MAX_STAFF: u32 = 5;
pub const DEFAULT_MIN_REST_HOURS: f64 = 11.0;

/// Reads a non-negative count, truncating fractions. A missing key yields
/// `default`; a value of the wrong type is logged and also yields `default`.
fn count_field(config: &serde_json::Value, key: &str, default: u32) -> u32 {
    match config.get(key) {
        None | Some(serde_json::Value::Null) => default,
        Some(value) => match value.as_f64() {
            Some(n) if n.is_finite() && n >= 0.0 && n <= f64::from(u32::MAX) => n.trunc() as u32,
            _ => {
                warn!("Rule config '{}' = {} is not a count, using {}", key, value, default);
                default
            }
        },
    }
}

fn hours_field(config: &serde_json::Value, key: &str, default: f64) -> f64 {
    match config.get(key) {
        None | Some(serde_json::Value::Null) => default,
        Some(value) => match value.as_f64() {
            Some(n) if n.is_finite() => n,
            _ => {
                warn!("Rule config '{}' = {} is not a number, using {}", key, value, default);
                default
            }
        },
    }
}

impl RuleConfig {
    /// Decode a rule's free-form JSON config for its category. Each limit
    /// falls back to its category default when absent or mistyped.
    pub fn decode(category: &str, config: &serde_json::Value) -> Self {
        if !config.is_null() && !config.is_object() {
            warn!("Rule config for '{}' is not an object, using defaults", category);
        }
        match category {
            "max_consecutive_days" => RuleConfig::MaxConsecutiveDays {
                max_days: count_field(config, "max_days", DEFAULT_MAX_CONSECUTIVE_DAYS),
            },
            "min_staff" => RuleConfig::MinStaff {
                min_count: count_field(config, "min_count", DEFAULT_MIN_STAFF),
            },
            "max_staff" => RuleConfig::MaxStaff {
                max_count: count_field(config, "max_count", DEFAULT_MAX_STAFF),
            },
            "rest_hours" => RuleConfig::RestHours {
                min_hours: hours_field(config, "min_hours", DEFAULT_MIN_REST_HOURS),
            },
            "monthly_hours" => RuleConfig::MonthlyHours,
            other => RuleConfig::Unrecognized {
                category: other.to_string(),
            },
        }
    }

    /// Short human description of the configured limit, used in prompts.
    pub fn describe(&self) -> Option<String> {
        match self {
            RuleConfig::MaxConsecutiveDays { max_days } => Some(format!("max {} days", max_days)),
            RuleConfig::MinStaff { min_count } => Some(format!("min {} staff", min_count)),
            RuleConfig::MaxStaff { max_count } => Some(format!("max {} staff", max_count)),
            RuleConfig::RestHours { min_hours } => Some(format!("min {} hours", min_hours)),
            RuleConfig::MonthlyHours | RuleConfig::Unrecognized { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintRule {
    pub id: String,
    pub name: String,
    pub kind: ConstraintKind,
    pub priority: i64,
    pub config: RuleConfig,
}

/// Everything the validator and the oracle prompt read for one period.
#[derive(Debug, Clone, Default)]
pub struct ConstraintCatalog {
    pub staff: Vec<Staff>,
    pub availability: Vec<AvailabilityMark>,
    pub targets: Vec<MonthlyHourTarget>,
    pub rules: Vec<ConstraintRule>,
}

impl ConstraintCatalog {
    pub fn staff_name<'a>(&'a self, staff_id: &'a str) -> &'a str {
        self.staff
            .iter()
            .find(|s| s.id == staff_id)
            .map(|s| s.name.as_str())
            .unwrap_or(staff_id)
    }
}

/// One staff/day assignment as proposed by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftEntry {
    #[serde(alias = "staffId")]
    pub staff_id: String,
    pub date: NaiveDate,
    #[serde(alias = "startTime")]
    pub start_time: TimeOfDay,
    #[serde(alias = "endTime")]
    pub end_time: TimeOfDay,
    #[serde(default, alias = "breakMinutes")]
    pub break_minutes: u32,
}

impl ShiftEntry {
    pub fn worked_hours(&self) -> f64 {
        worked_hours(self.start_time, self.end_time, self.break_minutes)
    }
}

/// Persisted violation shape shared by oracle self-reports and validator findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    #[serde(alias = "constraintName")]
    pub constraint_name: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: ConstraintKind,
    pub message: String,
}

/// One oracle attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSchedule {
    #[serde(default)]
    pub reasoning: String,
    pub entries: Vec<ShiftEntry>,
    #[serde(
        default,
        rename = "constraint_violations",
        alias = "selfReportedViolations",
        alias = "self_reported_violations"
    )]
    pub self_reported_violations: Vec<ConstraintViolation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ConstraintKind,
    pub constraint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub message: String,
}

impl From<&Violation> for ConstraintViolation {
    fn from(v: &Violation) -> Self {
        ConstraintViolation {
            constraint_name: v.constraint.clone(),
            kind: v.kind,
            message: v.message.clone(),
        }
    }
}

/// Soft deviation reported for scoring only; never affects validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub constraint: String,
    pub staff_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
    pub score: f64,
}

impl ValidationResult {
    /// True if any recorded violation is hard. Soft violations still flip
    /// `is_valid` but never warrant a retry.
    pub fn has_hard_violations(&self) -> bool {
        self.violations.iter().any(|v| v.kind == ConstraintKind::Hard)
    }
}
