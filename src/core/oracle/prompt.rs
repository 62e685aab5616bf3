//! Prompt rendering for the schedule oracle.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::core::schedule::{
    AvailabilityKind, AvailabilityMark, CandidateSchedule, ConstraintCatalog, ConstraintKind,
    ConstraintRule, Period, Violation,
};

const OPENING_HOURS: &str = "09:00-22:00";

pub const SYSTEM_PROMPT: &str = r#"You are an expert at building monthly shift schedules for restaurants and retail stores.
Build the best schedule you can from the staff roster, availability marks, and constraints you are given.

## Output rules
- Respond with JSON in exactly the format below
- Decide work or rest for every staff member on every date of the period
- Never break a hard constraint
- Respect soft constraints as far as possible and explain any you could not meet
- Give every shift of 6 hours or more a 60 minute break
- Keep each staff member's monthly hours close to their preferred range

## Output JSON format
{
  "reasoning": "what characterizes this pattern and why",
  "entries": [
    {
      "staff_id": "staff id",
      "date": "2026-03-01",
      "start_time": "09:00",
      "end_time": "17:00",
      "break_minutes": 60
    }
  ],
  "constraint_violations": [
    {
      "constraint_name": "constraint name",
      "type": "soft",
      "message": "why this constraint could not be fully met"
    }
  ]
}"#;

fn mark_symbol(kind: AvailabilityKind) -> &'static str {
    match kind {
        AvailabilityKind::Available => "○",
        AvailabilityKind::Unavailable => "×",
        AvailabilityKind::Preferred => "◎",
    }
}

fn render_mark(mark: &AvailabilityMark) -> String {
    let window = match (mark.start_time, mark.end_time) {
        (Some(start), Some(end)) => format!("({}-{})", start, end),
        _ => String::new(),
    };
    format!("{} {}{}", mark.date, mark_symbol(mark.kind), window)
}

fn rule_description(rule: &ConstraintRule) -> String {
    match rule.config.describe() {
        Some(limit) => format!("{} ({})", rule.name, limit),
        None => rule.name.clone(),
    }
}

pub struct PromptContext<'a> {
    pub period: Period,
    pub catalog: &'a ConstraintCatalog,
    pub pattern_index: usize,
    pub prior_candidates: &'a [CandidateSchedule],
    pub previous_violations: &'a [Violation],
}

pub fn build_user_prompt(ctx: &PromptContext<'_>) -> String {
    let catalog = ctx.catalog;
    let mut out = String::new();

    let _ = writeln!(out, "Build the shift schedule for {}.\n", ctx.period);

    out.push_str("## Store hours\n");
    let _ = writeln!(out, "- Open: {}", OPENING_HOURS);
    let _ = writeln!(
        out,
        "- Period: every date from {} to {}\n",
        ctx.period.first_day(),
        ctx.period.dates().last().unwrap_or_else(|| ctx.period.first_day())
    );

    out.push_str("## Staff\n");
    for staff in &catalog.staff {
        let _ = writeln!(
            out,
            "- {} (id: {}): {}, {}",
            staff.name, staff.id, staff.role, staff.employment_type
        );
    }
    out.push('\n');

    out.push_str("## Preferred monthly hours\n");
    for target in &catalog.targets {
        let _ = write!(
            out,
            "- {}: {}-{}h",
            catalog.staff_name(&target.staff_id),
            target.min_hours,
            target.max_hours
        );
        if let Some(note) = target.note.as_deref().filter(|n| !n.is_empty()) {
            let _ = write!(out, " ({})", note);
        }
        out.push('\n');
    }
    out.push('\n');

    out.push_str("## Availability (○ available, × unavailable, ◎ preferred)\n");
    let mut by_staff: BTreeMap<&str, Vec<&AvailabilityMark>> = BTreeMap::new();
    for mark in &catalog.availability {
        by_staff.entry(catalog.staff_name(&mark.staff_id)).or_default().push(mark);
    }
    for (name, marks) in by_staff {
        let rendered: Vec<String> = marks.into_iter().map(render_mark).collect();
        let _ = writeln!(out, "- {}: {}", name, rendered.join(", "));
    }
    out.push('\n');

    out.push_str("## Hard constraints (must hold)\n");
    out.push_str("- Every date marked × must be a day off\n");
    for rule in catalog.rules.iter().filter(|r| r.kind == ConstraintKind::Hard) {
        let _ = writeln!(out, "- {}", rule_description(rule));
    }
    out.push('\n');

    out.push_str("## Soft constraints (by priority)\n");
    let mut soft: Vec<&ConstraintRule> = catalog
        .rules
        .iter()
        .filter(|r| r.kind == ConstraintKind::Soft)
        .collect();
    soft.sort_by(|a, b| b.priority.cmp(&a.priority));
    for rule in soft {
        let _ = writeln!(out, "- [P:{}] {}", rule.priority, rule_description(rule));
    }
    out.push('\n');

    if ctx.pattern_index > 0 {
        out.push_str("## Additional instructions\n");
        out.push_str("Use a different approach from the previous patterns, for example a different weekend split or different early/late assignments.\n");
        for (i, prior) in ctx.prior_candidates.iter().enumerate() {
            if !prior.reasoning.is_empty() {
                let _ = writeln!(out, "- Pattern {}: {}", i + 1, prior.reasoning);
            }
        }
        out.push('\n');
    }

    if ctx.previous_violations.is_empty() {
        out.push_str("Respond in the JSON format above.");
    } else {
        out.push_str("## The previous attempt broke these constraints. Fix every one of them.\n");
        for v in ctx.previous_violations {
            let mut detail = v.message.clone();
            if let Some(date) = v.date {
                let _ = write!(detail, " (date: {})", date);
            }
            let _ = writeln!(out, "- [{}] {}: {}", v.kind.as_str(), v.constraint, detail);
        }
        out.push_str("\nResolve all of the violations above and respond in the JSON format.");
    }

    out
}
