use crate::services::bionic::{BionicConfig, BionicReader, BionicTransform};
use crate::services::llm::{LlmConfig, LlmSummarizer, Summarizer};
use crate::services::orchestrator::{
    DEFAULT_RATE_LIMIT_DELAY, Orchestrator, RunMode, SummarizerFactory, TransformFactory,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MIN_CHAPTER_LENGTH: usize = 105;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub llm: LlmConfig,
    /// `None` when no bionic API key is configured.
    pub bionic: Option<BionicConfig>,
    pub min_chapter_length: usize,
    pub rate_limit_delay: Duration,
    pub workers: NonZeroUsize,
    /// Lowercase primary language tags; empty accepts every book.
    pub allowed_languages: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source; unset variables fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let llm_defaults = LlmConfig::default();
        let llm = LlmConfig {
            api_url: lookup("LLM_API_URL").unwrap_or(llm_defaults.api_url.clone()),
            api_key: lookup("LLM_API_KEY").filter(|key| !key.is_empty()),
            model: lookup("LLM_MODEL").unwrap_or(llm_defaults.model.clone()),
            temperature: parse_var(&lookup, "LLM_TEMPERATURE", llm_defaults.temperature)?,
            top_p: parse_var(&lookup, "LLM_TOP_P", llm_defaults.top_p)?,
            top_k: parse_var(&lookup, "LLM_TOP_K", llm_defaults.top_k)?,
            max_output_tokens: parse_var(
                &lookup,
                "LLM_MAX_OUTPUT_TOKENS",
                llm_defaults.max_output_tokens,
            )?,
            ..llm_defaults
        };

        let bionic = match lookup("BIONIC_API_KEY").filter(|key| !key.is_empty()) {
            Some(api_key) => {
                let defaults = BionicConfig::new(api_key);
                Some(BionicConfig {
                    api_url: lookup("BIONIC_API_URL").unwrap_or(defaults.api_url.clone()),
                    fixation: parse_var(&lookup, "BIONIC_FIXATION", defaults.fixation)?,
                    saccade: parse_var(&lookup, "BIONIC_SACCADE", defaults.saccade)?,
                    ..defaults
                })
            }
            None => None,
        };

        let default_workers = std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
        let delay_ms = parse_var(
            &lookup,
            "BOOKAI_RATE_LIMIT_DELAY_MS",
            DEFAULT_RATE_LIMIT_DELAY.as_millis() as u64,
        )?;

        let allowed_languages = lookup("BOOKAI_ALLOWED_LANGUAGES")
            .unwrap_or_else(|| "en".to_string())
            .split(',')
            .map(|lang| lang.trim().to_lowercase())
            .filter(|lang| !lang.is_empty())
            .collect();

        Ok(AppConfig {
            bind_addr: parse_var(
                &lookup,
                "BOOKAI_BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 3000)),
            )?,
            llm,
            bionic,
            min_chapter_length: parse_var(
                &lookup,
                "BOOKAI_MIN_CHAPTER_LENGTH",
                DEFAULT_MIN_CHAPTER_LENGTH,
            )?,
            rate_limit_delay: Duration::from_millis(delay_ms),
            workers: parse_var(&lookup, "BOOKAI_WORKERS", default_workers)?,
            allowed_languages,
        })
    }

    /// Orchestrator for one request. `bionic` is ignored when no bionic API key
    /// is configured.
    pub fn orchestrator(&self, mode: RunMode, bionic: bool) -> Orchestrator {
        let llm = self.llm.clone();
        let summarizer: SummarizerFactory = Arc::new(move || {
            LlmSummarizer::new(llm.clone()).map(|s| Box::new(s) as Box<dyn Summarizer>)
        });

        let orchestrator = Orchestrator::new(summarizer)
            .with_mode(mode)
            .with_rate_limit_delay(self.rate_limit_delay);

        match (&self.bionic, bionic) {
            (Some(config), true) => {
                let config = config.clone();
                let transform: TransformFactory = Arc::new(move || {
                    Box::new(BionicReader::new(config.clone())) as Box<dyn BionicTransform>
                });
                orchestrator.with_bionic(transform)
            }
            (None, true) => {
                warn!("Bionic reading requested but BIONIC_API_KEY is not set");
                orchestrator
            }
            (_, false) => orchestrator,
        }
    }

    pub fn default_mode(&self) -> RunMode {
        RunMode::Parallel {
            workers: self.workers,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.llm.api_url, "http://localhost:11434/api/generate");
        assert_eq!(config.llm.api_key, None);
        assert_eq!(config.llm.top_k, 40);
        assert!(config.bionic.is_none());
        assert_eq!(config.min_chapter_length, 105);
        assert_eq!(config.rate_limit_delay, Duration::from_millis(20));
        assert_eq!(config.allowed_languages, vec!["en".to_string()]);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("BOOKAI_BIND_ADDR", "127.0.0.1:8080"),
            ("LLM_MODEL", "mistral"),
            ("LLM_TEMPERATURE", "0.2"),
            ("BIONIC_API_KEY", "secret"),
            ("BIONIC_SACCADE", "10"),
            ("BOOKAI_WORKERS", "3"),
            ("BOOKAI_ALLOWED_LANGUAGES", " en, PT ,"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.temperature, 0.2);
        let bionic = config.bionic.as_ref().unwrap();
        assert_eq!(bionic.api_key, "secret");
        assert_eq!(bionic.fixation, 2);
        assert_eq!(bionic.saccade, 10);
        assert_eq!(config.workers.get(), 3);
        assert_eq!(config.allowed_languages, vec!["en", "pt"]);
    }

    #[test]
    fn test_empty_language_list_disables_gate() {
        let config = config_from(&[("BOOKAI_ALLOWED_LANGUAGES", "")]).unwrap();
        assert!(config.allowed_languages.is_empty());
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = config_from(&[("BOOKAI_WORKERS", "0")]).unwrap_err();
        assert!(format!("{err:#}").contains("BOOKAI_WORKERS"));

        let err = config_from(&[("LLM_TOP_K", "many")]).unwrap_err();
        assert!(err.to_string().contains("LLM_TOP_K"));
    }

    #[test]
    fn test_orchestrator_honours_bionic_availability() {
        let without_key = config_from(&[]).unwrap();
        assert!(!without_key.orchestrator(RunMode::Sequential, true).has_bionic());

        let with_key = config_from(&[("BIONIC_API_KEY", "secret")]).unwrap();
        let orchestrator = with_key.orchestrator(with_key.default_mode(), true);
        assert!(orchestrator.has_bionic());
        assert_eq!(orchestrator.mode(), with_key.default_mode());
        assert!(!with_key.orchestrator(RunMode::Sequential, false).has_bionic());
    }
}
