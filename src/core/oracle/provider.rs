use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::config::{ApiFormat, OracleConfig};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A single-turn text completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

// ── Anthropic Messages request/response ──

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

// ── OpenAI-compatible request/response ──

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageOwned,
}

#[derive(Deserialize)]
struct OpenAiMessageOwned {
    #[serde(default)]
    content: Option<String>,
}

pub struct HttpProvider {
    format: ApiFormat,
    base_url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
    client: Client,
}

impl HttpProvider {
    /// Builds a provider from config, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("environment variable {} is not set", config.api_key_env))?;
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            format: config.api_format,
            base_url: config.endpoint().to_string(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client: builder.build()?,
        })
    }

    async fn complete_anthropic(&self, system: &str, user: &str) -> Result<String> {
        let req = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
            messages: vec![ChatMessage {
                role: "user",
                content: user,
            }],
        };
        let res = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&req)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "Anthropic API Error ({}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: AnthropicResponse = res.json().await?;
        parsed
            .content
            .into_iter()
            .find(|b| b.kind == "text")
            .and_then(|b| b.text)
            .ok_or_else(|| anyhow!("Anthropic response contained no text block"))
    }

    async fn complete_openai(&self, system: &str, user: &str) -> Result<String> {
        let req = OpenAiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };
        let res = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "OpenAI API Error ({}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: OpenAiResponse = res.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("OpenAI response contained no message content"))
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        match self.format {
            ApiFormat::Anthropic => "anthropic",
            ApiFormat::Openai => "openai",
        }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        match self.format {
            ApiFormat::Anthropic => self.complete_anthropic(system, user).await,
            ApiFormat::Openai => self.complete_openai(system, user).await,
        }
    }
}
