//! Individual schedule checks. Each check appends to a shared violation list
//! so that every problem in a candidate is reported in one pass.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use crate::core::schedule::calendar::overnight_rest_minutes;
use crate::core::schedule::{
    AvailabilityKind, ConstraintCatalog, ConstraintKind, ConstraintRule, MonthlyHourTarget,
    Period, ShiftEntry, Violation, Warning, is_consecutive,
};

pub const AVAILABILITY_CHECK: &str = "unavailable date";
pub const TIME_RANGE_CHECK: &str = "time consistency";
pub const DATE_RANGE_CHECK: &str = "date range";
pub const DUPLICATE_CHECK: &str = "duplicate shift";
pub const MONTHLY_HOURS_CHECK: &str = "monthly hours";

/// Points deducted for a deviation equal to the whole bound.
const MONTHLY_HOURS_PENALTY_WEIGHT: f64 = 5.0;

fn hard(constraint: &str, entry: &ShiftEntry, message: String) -> Violation {
    Violation {
        kind: ConstraintKind::Hard,
        constraint: constraint.to_string(),
        staff_id: Some(entry.staff_id.clone()),
        date: Some(entry.date),
        message,
    }
}

pub fn check_availability(
    entries: &[ShiftEntry],
    catalog: &ConstraintCatalog,
    out: &mut Vec<Violation>,
) {
    let unavailable: HashSet<(&str, NaiveDate)> = catalog
        .availability
        .iter()
        .filter(|m| m.kind == AvailabilityKind::Unavailable)
        .map(|m| (m.staff_id.as_str(), m.date))
        .collect();

    for entry in entries {
        if unavailable.contains(&(entry.staff_id.as_str(), entry.date)) {
            out.push(hard(
                AVAILABILITY_CHECK,
                entry,
                format!("shift assigned on a date marked unavailable ({})", entry.date),
            ));
        }
    }
}

pub fn check_time_consistency(period: Period, entries: &[ShiftEntry], out: &mut Vec<Violation>) {
    for entry in entries {
        if entry.start_time >= entry.end_time {
            out.push(hard(
                TIME_RANGE_CHECK,
                entry,
                format!(
                    "start time {} is not before end time {}",
                    entry.start_time, entry.end_time
                ),
            ));
        }
        if !period.contains(entry.date) {
            out.push(hard(
                DATE_RANGE_CHECK,
                entry,
                format!("date {} is outside period {}", entry.date, period),
            ));
        }
    }
}

pub fn check_duplicates(entries: &[ShiftEntry], out: &mut Vec<Violation>) {
    let mut seen: HashSet<(&str, NaiveDate)> = HashSet::new();
    for entry in entries {
        if !seen.insert((entry.staff_id.as_str(), entry.date)) {
            out.push(hard(
                DUPLICATE_CHECK,
                entry,
                "staff member has more than one shift on the same date".to_string(),
            ));
        }
    }
}

fn rule_violation(
    rule: &ConstraintRule,
    staff_id: Option<&str>,
    date: NaiveDate,
    message: String,
) -> Violation {
    Violation {
        kind: rule.kind,
        constraint: rule.name.clone(),
        staff_id: staff_id.map(str::to_string),
        date: Some(date),
        message,
    }
}

fn dates_by_staff(entries: &[ShiftEntry]) -> BTreeMap<&str, Vec<NaiveDate>> {
    let mut by_staff: BTreeMap<&str, Vec<NaiveDate>> = BTreeMap::new();
    for entry in entries {
        by_staff.entry(&entry.staff_id).or_default().push(entry.date);
    }
    for dates in by_staff.values_mut() {
        dates.sort();
        dates.dedup();
    }
    by_staff
}

/// Flags every day of a run that goes beyond `max_days` consecutive dates.
pub fn check_consecutive_days(
    entries: &[ShiftEntry],
    rule: &ConstraintRule,
    max_days: u32,
    out: &mut Vec<Violation>,
) {
    for (staff_id, dates) in dates_by_staff(entries) {
        let mut run = 1u32;
        for pair in dates.windows(2) {
            if is_consecutive(pair[0], pair[1]) {
                run += 1;
                if run > max_days {
                    out.push(rule_violation(
                        rule,
                        Some(staff_id),
                        pair[1],
                        format!("{} consecutive working days (max {})", run, max_days),
                    ));
                }
            } else {
                run = 1;
            }
        }
    }
}

fn staff_per_date(entries: &[ShiftEntry]) -> BTreeMap<NaiveDate, u32> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.date).or_insert(0) += 1;
    }
    counts
}

pub fn check_min_staff(
    entries: &[ShiftEntry],
    rule: &ConstraintRule,
    min_count: u32,
    out: &mut Vec<Violation>,
) {
    for (date, count) in staff_per_date(entries) {
        if count < min_count {
            out.push(rule_violation(
                rule,
                None,
                date,
                format!("{} has {} staff (min {})", date, count, min_count),
            ));
        }
    }
}

pub fn check_max_staff(
    entries: &[ShiftEntry],
    rule: &ConstraintRule,
    max_count: u32,
    out: &mut Vec<Violation>,
) {
    for (date, count) in staff_per_date(entries) {
        if count > max_count {
            out.push(rule_violation(
                rule,
                None,
                date,
                format!("{} has {} staff (max {})", date, count, max_count),
            ));
        }
    }
}

/// Rest between shifts on calendar-adjacent dates for the same staff member.
pub fn check_rest_hours(
    entries: &[ShiftEntry],
    rule: &ConstraintRule,
    min_hours: f64,
    out: &mut Vec<Violation>,
) {
    let mut by_staff: BTreeMap<&str, Vec<&ShiftEntry>> = BTreeMap::new();
    for entry in entries {
        by_staff.entry(&entry.staff_id).or_default().push(entry);
    }

    for (staff_id, mut shifts) in by_staff {
        shifts.sort_by_key(|e| e.date);
        for pair in shifts.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if !is_consecutive(prev.date, curr.date) {
                continue;
            }
            let rest_hours = f64::from(overnight_rest_minutes(prev.end_time, curr.start_time)) / 60.0;
            if rest_hours < min_hours {
                out.push(rule_violation(
                    rule,
                    Some(staff_id),
                    curr.date,
                    format!(
                        "rest of {:.1}h is below the minimum {}h (previous shift ended {}, next starts {})",
                        rest_hours, min_hours, prev.end_time, curr.start_time
                    ),
                ));
            }
        }
    }
}

/// Scores monthly hour deviations against each staff member's target range.
///
/// Only staff with at least one entry and a target are scored. Returns the
/// score in `[0, 100]` and one warning per out-of-range staff member.
pub fn score_monthly_hours(
    entries: &[ShiftEntry],
    targets: &[MonthlyHourTarget],
) -> (f64, Vec<Warning>) {
    let mut hours: BTreeMap<&str, f64> = BTreeMap::new();
    for entry in entries {
        *hours.entry(&entry.staff_id).or_insert(0.0) += entry.worked_hours();
    }

    let by_staff: HashMap<&str, &MonthlyHourTarget> = targets
        .iter()
        .map(|t| (t.staff_id.as_str(), t))
        .collect();

    let mut penalty = 0.0;
    let mut warnings = Vec::new();
    for (staff_id, worked) in hours {
        let Some(target) = by_staff.get(staff_id) else {
            continue;
        };
        let (deviation, bound, message) = if worked > target.max_hours {
            (
                worked - target.max_hours,
                target.max_hours,
                format!(
                    "monthly hours {:.1}h exceed the preferred maximum {}h",
                    worked, target.max_hours
                ),
            )
        } else if worked < target.min_hours {
            (
                target.min_hours - worked,
                target.min_hours,
                format!(
                    "monthly hours {:.1}h fall below the preferred minimum {}h",
                    worked, target.min_hours
                ),
            )
        } else {
            continue;
        };

        let ratio = if bound > 0.0 { deviation / bound } else { 1.0 };
        penalty += ratio * MONTHLY_HOURS_PENALTY_WEIGHT;
        warnings.push(Warning {
            constraint: MONTHLY_HOURS_CHECK.to_string(),
            staff_id: staff_id.to_string(),
            message,
        });
    }

    ((100.0 - penalty).clamp(0.0, 100.0), warnings)
}
