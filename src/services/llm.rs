use crate::error::SummarizationError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const SYSTEM_INSTRUCTIONS: &str = "You are a non-fictional book chapter summarizer. I will give you a single chapter as input. You should present the concept in an interesting way, without saying the sentences such as \"This chapter ..\" or \"The author ...\" - just think about creating a script for a podcaster, but without writing anything about podcast (e.g., \"hey Podcaster\"). Focus on the main concepts and provide an engaging but clear and professional narrative. It should be about 20% of original length that takes 80% of the most important concepts. Do not return markdowns, HTML tags, apostrophes or underscores - just plain text.";

/// Produces a summary of one chapter's text.
///
/// Implementations need not be shareable across workers: the orchestrator
/// builds one instance per worker through a factory.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, SummarizationError>;
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub system_instructions: String,
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            // Ollama's generate endpoint
            api_url: "http://localhost:11434/api/generate".to_string(),
            api_key: None,
            model: "llama2".to_string(),
            temperature: 1.0,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
            system_instructions: SYSTEM_INSTRUCTIONS.to_string(),
            request_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct LlmSummarizer {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmSummarizer {
    pub fn new(config: LlmConfig) -> Result<Self, SummarizationError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(LlmSummarizer { client, config })
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizationError> {
        if text.trim().is_empty() {
            return Err(SummarizationError::EmptyInput);
        }

        let mut request_builder = self
            .client
            .post(&self.config.api_url)
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.config.model,
                "system": self.config.system_instructions,
                "prompt": text,
                "stream": false,
                "options": {
                    "temperature": self.config.temperature,
                    "top_p": self.config.top_p,
                    "top_k": self.config.top_k,
                    "num_predict": self.config.max_output_tokens,
                }
            }));

        if let Some(api_key) = &self.config.api_key {
            request_builder = request_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request_builder.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SummarizationError::RateLimited);
        }

        let response_text = response.text().await?;
        if !status.is_success() {
            return Err(SummarizationError::Backend {
                status: status.as_u16(),
                body: response_text,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| SummarizationError::MalformedResponse(e.to_string()))?;
        let summary = parsed.response.trim().to_string();
        if summary.is_empty() {
            return Err(SummarizationError::MalformedResponse(
                "empty summary".to_string(),
            ));
        }

        debug!(
            input_chars = text.len(),
            summary_chars = summary.len(),
            "Received summary"
        );
        Ok(summary)
    }
}
