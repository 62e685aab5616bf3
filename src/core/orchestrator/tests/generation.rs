use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::core::orchestrator::{GenerationOrchestrator, GenerationSettings, JobStatus};
use crate::core::store::{JobStore, PatternStatus};

fn period() -> Period {
    "2025-03".parse().unwrap()
}

fn orchestrator(
    store: &Arc<ShiftStore>,
    oracle: Arc<ScriptedOracle>,
    validator: Arc<ScriptedValidator>,
) -> GenerationOrchestrator {
    GenerationOrchestrator::new(
        store.clone(),
        store.clone(),
        oracle,
        validator,
        GenerationSettings::default(),
    )
}

#[tokio::test]
async fn clean_candidates_complete_with_every_pattern() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|req, _| Ok(candidate(&format!("approach {}", req.pattern_index))));
    let orch = orchestrator(&store, oracle.clone(), ScriptedValidator::always(clean_result()));

    let handle = orch.start_generation("2025-03", Some(3)).await.unwrap();
    assert_eq!(handle.job.status, JobStatus::Pending);
    let outcome = handle.wait().await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.pattern_ids.len(), 3);
    assert_eq!(outcome.error, None);
    assert_eq!(oracle.calls(), 3);

    let job = orch.job_status(&outcome.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);

    let patterns = store.list_patterns(period()).await.unwrap();
    assert_eq!(patterns.len(), 3);
    assert_eq!(patterns[0].reasoning, "approach 0");
    assert_eq!(patterns[2].reasoning, "approach 2");
    for pattern in &patterns {
        assert_eq!(pattern.status, PatternStatus::Draft);
        assert_eq!(pattern.score, 100.0);
        assert_eq!(pattern.violations.len(), 1);
        assert_eq!(store.list_entries(&pattern.pattern_id).await.unwrap().len(), 2);
    }
}

#[tokio::test]
async fn each_pattern_sees_the_previously_accepted_ones() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|req, _| Ok(candidate(&format!("approach {}", req.pattern_index))));
    let orch = orchestrator(&store, oracle.clone(), ScriptedValidator::always(clean_result()));

    orch.start_generation("2025-03", Some(3)).await.unwrap().wait().await;

    let requests = oracle.requests.lock().unwrap();
    for (i, req) in requests.iter().enumerate() {
        assert_eq!(req.pattern_index, i);
        assert_eq!(req.total_pattern_count, 3);
        assert_eq!(req.prior_candidates.len(), i);
        assert!(req.previous_violations.is_empty());
    }
    assert_eq!(requests[2].prior_candidates[1].reasoning, "approach 1");
}

#[tokio::test]
async fn persistent_hard_violations_fall_back_to_the_last_attempt() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|_, call| Ok(candidate(&format!("attempt {call}"))));
    let validator = ScriptedValidator::new(|candidate, _| {
        Ok(result_with(
            vec![violation(
                ConstraintKind::Hard,
                &format!("min staff after {}", candidate.reasoning),
            )],
            90.0,
        ))
    });
    let orch = orchestrator(&store, oracle.clone(), validator);

    let outcome = orch.start_generation("2025-03", Some(2)).await.unwrap().wait().await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(oracle.calls(), 6);

    let patterns = store.list_patterns(period()).await.unwrap();
    assert_eq!(patterns.len(), 2);
    assert_eq!(patterns[0].reasoning, "attempt 2");
    assert_eq!(patterns[1].reasoning, "attempt 5");
    let last = &patterns[1].violations;
    assert_eq!(last.len(), 2);
    assert_eq!(last[0].kind, ConstraintKind::Soft);
    assert_eq!(last[1].kind, ConstraintKind::Hard);
    assert_eq!(last[1].constraint_name, "min staff after attempt 5");
    assert_eq!(patterns[1].score, 90.0);
}

#[tokio::test]
async fn retries_carry_the_previous_violations() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|_, call| Ok(candidate(&format!("attempt {call}"))));
    let validator = ScriptedValidator::new(|_, call| {
        if call == 0 {
            Ok(result_with(
                vec![
                    violation(ConstraintKind::Hard, "unavailable date"),
                    violation(ConstraintKind::Soft, "rest"),
                ],
                95.0,
            ))
        } else {
            Ok(clean_result())
        }
    });
    let orch = orchestrator(&store, oracle.clone(), validator);

    let outcome = orch.start_generation("2025-03", Some(1)).await.unwrap().wait().await;
    assert_eq!(outcome.status, JobStatus::Completed);

    let requests = oracle.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].previous_violations.is_empty());
    let feedback: Vec<&str> = requests[1]
        .previous_violations
        .iter()
        .map(|v| v.constraint.as_str())
        .collect();
    assert_eq!(feedback, vec!["unavailable date", "rest"]);
}

#[tokio::test]
async fn soft_violations_do_not_trigger_retries() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|_, _| Ok(candidate("soft only")));
    let validator =
        ScriptedValidator::always(result_with(vec![violation(ConstraintKind::Soft, "rest")], 97.0));
    let orch = orchestrator(&store, oracle.clone(), validator);

    let outcome = orch.start_generation("2025-03", Some(1)).await.unwrap().wait().await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(oracle.calls(), 1);
    let pattern = store.get_pattern(&outcome.pattern_ids[0]).await.unwrap();
    assert_eq!(pattern.score, 97.0);
    assert_eq!(pattern.violations.len(), 2);
}

#[tokio::test]
async fn oracle_failure_is_retried() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|_, call| {
        if call == 0 {
            Err(ScheduleError::Oracle("unparseable response".into()))
        } else {
            Ok(candidate("second try"))
        }
    });
    let orch = orchestrator(&store, oracle.clone(), ScriptedValidator::always(clean_result()));

    let outcome = orch.start_generation("2025-03", Some(1)).await.unwrap().wait().await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test]
async fn exhausted_oracle_fails_the_job_but_keeps_earlier_patterns() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|req, _| {
        if req.pattern_index == 0 {
            Ok(candidate("first"))
        } else {
            Err(ScheduleError::Oracle("upstream timeout".into()))
        }
    });
    let orch = orchestrator(&store, oracle.clone(), ScriptedValidator::always(clean_result()));

    let outcome = orch.start_generation("2025-03", Some(3)).await.unwrap().wait().await;

    assert_eq!(outcome.status, JobStatus::Failed);
    assert_eq!(outcome.pattern_ids.len(), 1);
    assert!(outcome.error.as_deref().unwrap().contains("upstream timeout"));
    assert_eq!(oracle.calls(), 4);

    let job = orch.job_status(&outcome.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("upstream timeout"));
    assert!(job.progress < 100);
    assert_eq!(store.list_patterns(period()).await.unwrap().len(), 1);
    assert!(!store.has_active_job(period()).await.unwrap());
}

#[tokio::test]
async fn validator_failure_on_last_attempt_keeps_the_candidate_unscored() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|_, call| Ok(candidate(&format!("attempt {call}"))));
    let validator = ScriptedValidator::new(|_, _| {
        Err(ScheduleError::ValidationInput("catalog unavailable".into()))
    });
    let orch = orchestrator(&store, oracle.clone(), validator);

    let outcome = orch.start_generation("2025-03", Some(1)).await.unwrap().wait().await;

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(oracle.calls(), 3);
    let pattern = store.get_pattern(&outcome.pattern_ids[0]).await.unwrap();
    assert_eq!(pattern.reasoning, "attempt 2");
    assert_eq!(pattern.score, 0.0);
    assert_eq!(pattern.violations.len(), 1);
    assert_eq!(pattern.violations[0].constraint_name, "weekend balance");
}

#[tokio::test]
async fn entry_persistence_failure_is_terminal() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let patterns = FailingEntries::new(store.clone(), 2);
    let oracle = ScriptedOracle::new(|_, _| Ok(candidate("steady")));
    let orch = GenerationOrchestrator::new(
        store.clone(),
        patterns,
        oracle.clone(),
        ScriptedValidator::always(clean_result()),
        GenerationSettings::default(),
    );

    let outcome = orch.start_generation("2025-03", Some(3)).await.unwrap().wait().await;

    assert_eq!(outcome.status, JobStatus::Failed);
    assert_eq!(outcome.pattern_ids.len(), 1);
    assert_eq!(oracle.calls(), 2);
    assert!(outcome.error.unwrap().contains("disk full"));
    let first = &outcome.pattern_ids[0];
    assert_eq!(store.list_entries(first).await.unwrap().len(), 2);

    let listed = store.list_patterns(period()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(&listed[0].pattern_id, first);
}

#[tokio::test]
async fn active_job_for_period_conflicts_without_a_new_row() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let existing = JobStore::create_job(store.as_ref(), period(), 3).await.unwrap();
    let oracle = ScriptedOracle::new(|_, _| Ok(candidate("unused")));
    let orch = orchestrator(&store, oracle.clone(), ScriptedValidator::always(clean_result()));

    let err = orch.start_generation("2025-03", None).await.err().unwrap();
    assert!(matches!(err, ScheduleError::Conflict(_)));
    assert_eq!(oracle.calls(), 0);
    let latest = store.latest_job(period()).await.unwrap().unwrap();
    assert_eq!(latest.job_id, existing.job_id);
}

#[tokio::test]
async fn bad_inputs_are_config_errors_and_create_nothing() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|_, _| Ok(candidate("unused")));
    let orch = orchestrator(&store, oracle.clone(), ScriptedValidator::always(clean_result()));

    for (period, count) in [
        ("2025-13", Some(1)),
        ("March 2025", Some(1)),
        ("2025-3", Some(1)),
        ("2025-03", Some(0)),
        ("2025-03", Some(6)),
    ] {
        let err = orch.start_generation(period, count).await.err().unwrap();
        assert!(
            matches!(err, ScheduleError::Config(_)),
            "{period} / {count:?} gave {err:?}"
        );
    }
    assert!(store.latest_job(period()).await.unwrap().is_none());
}

#[tokio::test]
async fn pattern_count_defaults_to_three() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|_, _| Ok(candidate("default")));
    let orch = orchestrator(&store, oracle.clone(), ScriptedValidator::always(clean_result()));

    let handle = orch.start_generation("2025-03", None).await.unwrap();
    assert_eq!(handle.job.pattern_count, 3);
    let outcome = handle.wait().await;
    assert_eq!(outcome.pattern_ids.len(), 3);
}

#[tokio::test]
async fn different_periods_run_side_by_side() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|req, _| Ok(candidate(&req.period.to_string())));
    let orch = orchestrator(&store, oracle.clone(), ScriptedValidator::always(clean_result()));

    let march = orch.start_generation("2025-03", Some(2)).await.unwrap();
    let april = orch.start_generation("2025-04", Some(1)).await.unwrap();
    let (march, april) = tokio::join!(march.wait(), april.wait());

    assert_eq!(march.status, JobStatus::Completed);
    assert_eq!(april.status, JobStatus::Completed);
    let april_patterns = store.list_patterns("2025-04".parse().unwrap()).await.unwrap();
    assert_eq!(april_patterns.len(), 1);
    assert_eq!(april_patterns[0].reasoning, "2025-04");
}

#[tokio::test]
async fn follow_reports_progress_until_the_job_is_terminal() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|_, _| Ok(candidate("steady")));
    let orch = orchestrator(&store, oracle, ScriptedValidator::always(clean_result()));

    let handle = orch.start_generation("2025-03", Some(2)).await.unwrap();
    let mut seen = Vec::new();
    let outcome = orch
        .follow(handle, Duration::from_millis(5), |job| seen.push(job.status))
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(seen.last(), Some(&JobStatus::Completed));
}

#[tokio::test]
async fn follow_stops_when_the_run_returns_without_a_terminal_row() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|_, _| Ok(candidate("steady")));
    let orch = GenerationOrchestrator::new(
        StuckJobs::new(store.clone(), true),
        store.clone(),
        oracle,
        ScriptedValidator::always(clean_result()),
        GenerationSettings::default(),
    );

    let handle = orch.start_generation("2025-03", Some(1)).await.unwrap();
    let job_id = handle.job_id().to_string();
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        orch.follow(handle, Duration::from_millis(5), |_| {}),
    )
    .await
    .expect("follow kept polling after the run returned")
    .unwrap();

    assert_eq!(outcome.status, JobStatus::Failed);
    assert!(outcome.error.unwrap().contains("database is locked"));
    let job = store.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Processing);
}

#[tokio::test]
async fn failed_completion_write_falls_back_to_marking_the_job_failed() {
    let store = Arc::new(ShiftStore::in_memory().unwrap());
    let oracle = ScriptedOracle::new(|_, _| Ok(candidate("steady")));
    let orch = GenerationOrchestrator::new(
        StuckJobs::new(store.clone(), false),
        store.clone(),
        oracle,
        ScriptedValidator::always(clean_result()),
        GenerationSettings::default(),
    );

    let outcome = orch.start_generation("2025-03", Some(1)).await.unwrap().wait().await;

    assert_eq!(outcome.status, JobStatus::Failed);
    let job = store.get_job(&outcome.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("database is locked"));
    assert!(!store.has_active_job(period()).await.unwrap());
}
