//! Shared scheduling data model.

pub mod calendar;
mod types;

pub use calendar::{Period, TimeOfDay, is_consecutive, worked_hours};
pub use types::{
    AvailabilityKind, AvailabilityMark, CandidateSchedule, ConstraintCatalog, ConstraintKind,
    ConstraintRule, ConstraintViolation, MonthlyHourTarget, RuleConfig, ShiftEntry, Staff,
    ValidationResult, Violation, Warning,
};
