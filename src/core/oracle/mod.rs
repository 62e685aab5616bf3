//! Candidate generation: the oracle port and its LLM-backed implementation.

mod prompt;
pub mod provider;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::core::error::{ScheduleError, ScheduleResult};
use crate::core::schedule::{CandidateSchedule, Period, Violation};
use crate::core::store::CatalogSource;

pub use prompt::{PromptContext, SYSTEM_PROMPT, build_user_prompt};
pub use provider::{HttpProvider, LlmProvider};

/// Everything one oracle attempt gets to see.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub period: Period,
    pub total_pattern_count: usize,
    pub pattern_index: usize,
    /// Candidates already accepted in this run, used as a diversity hint.
    pub prior_candidates: Vec<CandidateSchedule>,
    /// Violations of the previous rejected attempt for this pattern.
    pub previous_violations: Vec<Violation>,
}

#[async_trait]
pub trait CandidateOracle: Send + Sync {
    async fn generate(&self, request: &OracleRequest) -> ScheduleResult<CandidateSchedule>;
}

/// Pull a JSON object out of model output: a ```json fence, then any fence,
/// then the span from the first `{` to the last `}`.
pub(crate) fn extract_json_block(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }
    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
        && end > start
    {
        return &text[start..=end];
    }
    text
}

/// Parses a raw model response into a candidate.
pub fn parse_candidate(text: &str) -> ScheduleResult<CandidateSchedule> {
    let json = extract_json_block(text);
    let candidate: CandidateSchedule = serde_json::from_str(json)
        .map_err(|e| ScheduleError::Oracle(format!("unparseable response: {e}")))?;
    if let Some(pos) = candidate
        .entries
        .iter()
        .position(|e| e.staff_id.trim().is_empty())
    {
        return Err(ScheduleError::Oracle(format!(
            "entry {} has an empty staff_id",
            pos + 1
        )));
    }
    Ok(candidate)
}

pub struct LlmOracle {
    catalog: Arc<dyn CatalogSource>,
    provider: Arc<dyn LlmProvider>,
}

impl LlmOracle {
    pub fn new(catalog: Arc<dyn CatalogSource>, provider: Arc<dyn LlmProvider>) -> Self {
        Self { catalog, provider }
    }
}

#[async_trait]
impl CandidateOracle for LlmOracle {
    async fn generate(&self, request: &OracleRequest) -> ScheduleResult<CandidateSchedule> {
        let catalog = self
            .catalog
            .load_catalog(request.period)
            .await
            .map_err(|e| ScheduleError::Oracle(format!("catalog unavailable: {e}")))?;

        let user_prompt = build_user_prompt(&PromptContext {
            period: request.period,
            catalog: &catalog,
            pattern_index: request.pattern_index,
            prior_candidates: &request.prior_candidates,
            previous_violations: &request.previous_violations,
        });
        info!(
            "Requesting pattern {}/{} for {} from {} ({} feedback items)",
            request.pattern_index + 1,
            request.total_pattern_count,
            request.period,
            self.provider.name(),
            request.previous_violations.len()
        );

        let response = self
            .provider
            .complete(SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(|e| ScheduleError::Oracle(e.to_string()))?;
        debug!("Oracle response: {} bytes", response.len());

        parse_candidate(&response)
    }
}
