use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

use crate::core::error::{ScheduleError, ScheduleResult};
use crate::core::orchestrator::GenerationSettings;

pub const CONFIG_FILE: &str = "shiftgen.toml";
pub const DB_ENV: &str = "SHIFTGEN_DB";
pub const LOG_ENV: &str = "SHIFTGEN_LOG";

/// `<platform data dir>/shiftgen`, falling back to the working directory.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("shiftgen"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    Anthropic,
    Openai,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_api_format")]
    pub api_format: ApiFormat,

    /// Full endpoint URL. Defaults to the public endpoint for `api_format`.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_pattern_count")]
    pub default_pattern_count: usize,

    #[serde(default = "default_max_pattern_count")]
    pub max_pattern_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_database_path() -> PathBuf {
    data_dir().join("shiftgen.db")
}
fn default_api_format() -> ApiFormat {
    ApiFormat::Anthropic
}
fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    16384
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_retries() -> u32 {
    3
}
fn default_pattern_count() -> usize {
    3
}
fn default_max_pattern_count() -> usize {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_format: default_api_format(),
            base_url: None,
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: None,
        }
    }
}

impl OracleConfig {
    pub fn endpoint(&self) -> &str {
        match (&self.base_url, self.api_format) {
            (Some(url), _) => url.as_str(),
            (None, ApiFormat::Anthropic) => "https://api.anthropic.com/v1/messages",
            (None, ApiFormat::Openai) => "https://api.openai.com/v1/chat/completions",
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            default_pattern_count: default_pattern_count(),
            max_pattern_count: default_max_pattern_count(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl AppConfig {
    /// Reads `path`, or `<data dir>/shiftgen.toml` when no path is given. A
    /// missing default file yields defaults; a missing explicit file is an error.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => data_dir().join(CONFIG_FILE),
        };
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path).await?;
            let parsed: AppConfig = toml::from_str(&content)?;
            info!("Loaded config from {}", config_path.display());
            parsed
        } else if path.is_some() {
            anyhow::bail!("config file {} does not exist", config_path.display());
        } else {
            info!("No {} found, using defaults.", CONFIG_FILE);
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(db) = lookup(DB_ENV).filter(|v| !v.is_empty()) {
            self.storage.database_path = PathBuf::from(db);
        }
        if let Some(level) = lookup(LOG_ENV).filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> ScheduleResult<()> {
        let generation = &self.generation;
        if generation.max_retries == 0 {
            return Err(ScheduleError::Config(
                "generation.max_retries must be at least 1".into(),
            ));
        }
        if generation.default_pattern_count == 0
            || generation.default_pattern_count > generation.max_pattern_count
        {
            return Err(ScheduleError::Config(format!(
                "generation.default_pattern_count must be between 1 and {}",
                generation.max_pattern_count
            )));
        }
        if !(0.0..=1.0).contains(&self.oracle.temperature) {
            return Err(ScheduleError::Config(
                "oracle.temperature must be between 0 and 1".into(),
            ));
        }
        Ok(())
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            max_retries: self.generation.max_retries,
            default_pattern_count: self.generation.default_pattern_count,
            max_pattern_count: self.generation.max_pattern_count,
        }
    }
}
