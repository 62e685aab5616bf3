use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::core::config::AppConfig;
use crate::core::oracle::{HttpProvider, LlmOracle};
use crate::core::orchestrator::{GenerationOrchestrator, JobStatus};
use crate::core::schedule::Period;
use crate::core::store::{GenerationJob, ShiftStore};
use crate::core::terminal;
use crate::core::validation::CatalogValidator;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn print_job(job: &GenerationJob) {
    terminal::print_status("Job", &job.job_id);
    terminal::print_status("Period", &job.period.to_string());
    terminal::print_status("Status", job.status.as_str());
    terminal::print_status("Patterns", &job.pattern_count.to_string());
    terminal::print_status("Progress", &terminal::progress_bar(job.progress));
    if let Some(message) = &job.status_message {
        terminal::print_status("Message", message);
    }
    if let Some(error) = &job.error_message {
        terminal::print_status("Error", error);
    }
    terminal::print_status("Created", &job.created_at);
    if let Some(completed) = &job.completed_at {
        terminal::print_status("Finished", completed);
    }
}

pub async fn run_generate(
    config: &AppConfig,
    store: Arc<ShiftStore>,
    period: &str,
    count: Option<usize>,
) -> Result<()> {
    let provider = Arc::new(HttpProvider::from_config(&config.oracle)?);
    let oracle = Arc::new(LlmOracle::new(store.clone(), provider));
    let validator = Arc::new(CatalogValidator::new(store.clone()));
    let orchestrator = GenerationOrchestrator::new(
        store.clone(),
        store.clone(),
        oracle,
        validator,
        config.generation_settings(),
    );

    let handle = orchestrator.start_generation(period, count).await?;
    let job_id = handle.job_id().to_string();
    terminal::print_heading(&format!(
        "Generating {} patterns for {} (job {})",
        handle.job.pattern_count, handle.job.period, job_id
    ));

    let mut last_seen: Option<(u8, Option<String>)> = None;
    let outcome = orchestrator
        .follow(handle, POLL_INTERVAL, |job| {
            let seen = (job.progress, job.status_message.clone());
            if last_seen.as_ref() != Some(&seen) {
                terminal::print_progress(job.progress, job.status_message.as_deref().unwrap_or(""));
                last_seen = Some(seen);
            }
        })
        .await?;

    match outcome.status {
        JobStatus::Completed => {
            terminal::print_success(&format!(
                "Stored {} patterns. Review them with 'shiftgen patterns {}'.",
                outcome.pattern_ids.len(),
                period
            ));
            Ok(())
        }
        _ => Err(anyhow!(
            "generation failed: {}",
            outcome.error.unwrap_or_else(|| "unknown error".into())
        )),
    }
}

pub async fn run_status(
    store: &ShiftStore,
    job_id: Option<&str>,
    period: Option<&str>,
) -> Result<()> {
    let job = match (job_id, period) {
        (Some(id), _) => store.get_job(id).await?,
        (None, Some(period)) => store.latest_job(period.parse::<Period>()?).await?,
        (None, None) => None,
    };
    match job {
        Some(job) => {
            print_job(&job);
            Ok(())
        }
        None => {
            terminal::print_warn("No matching generation job.");
            Ok(())
        }
    }
}
