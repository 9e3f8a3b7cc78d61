use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info, warn};

/// Post-processes a summary into bionic-reading form.
///
/// Never fails: on any backend problem implementations hand back the input
/// text unchanged.
#[async_trait]
pub trait BionicTransform: Send + Sync {
    async fn convert(&self, text: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct BionicConfig {
    pub api_url: String,
    pub api_key: String,
    pub fixation: u8,
    pub saccade: u8,
    pub request_timeout: Duration,
}

impl BionicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: "https://bionic-reading1.p.rapidapi.com/convert".to_string(),
            api_key: api_key.into(),
            fixation: 2,
            saccade: 20,
            request_timeout: Duration::from_secs(60),
        }
    }
}

pub struct BionicReader {
    client: reqwest::Client,
    config: BionicConfig,
    api_host: Option<String>,
}

impl BionicReader {
    pub fn new(config: BionicConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!("Falling back to default HTTP client for bionic reader: {err}");
                reqwest::Client::new()
            });
        let api_host = reqwest::Url::parse(&config.api_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string));

        BionicReader {
            client,
            config,
            api_host,
        }
    }

    async fn try_convert(&self, text: &str) -> Result<String> {
        let form = [
            ("content", text.to_string()),
            ("response_type", "html".to_string()),
            ("request_type", "html".to_string()),
            ("fixation", self.config.fixation.to_string()),
            ("saccade", self.config.saccade.to_string()),
        ];

        let mut request_builder = self
            .client
            .post(&self.config.api_url)
            .header("x-rapidapi-key", self.config.api_key.as_str())
            .form(&form);
        if let Some(host) = &self.api_host {
            request_builder = request_builder.header("x-rapidapi-host", host.as_str());
        }

        let response = request_builder
            .send()
            .await
            .context("bionic reading request failed")?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read bionic reading response")?;
        if !status.is_success() {
            bail!("bionic reading API returned {status}: {body}");
        }
        Ok(body)
    }
}

#[async_trait]
impl BionicTransform for BionicReader {
    async fn convert(&self, text: &str) -> String {
        match self.try_convert(text).await {
            Ok(converted) => {
                info!(chars = converted.len(), "Converted text to Bionic Reading");
                converted
            }
            Err(err) => {
                error!("Error converting text: {err:#}");
                text.to_string()
            }
        }
    }
}
