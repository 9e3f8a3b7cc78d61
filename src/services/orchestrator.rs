//! Runs the summarizer, and optionally the bionic transform, over every chapter.
//!
//! Failures stay scoped to their chapter: the result always holds exactly one
//! outcome per input chapter, whatever happens to individual calls.

use crate::error::SummarizationError;
use crate::models::{BionicStatus, ChapterOutcome, ChapterResult, ChapterText, SummaryStatus};
use crate::services::bionic::BionicTransform;
use crate::services::llm::Summarizer;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub type SummarizerFactory =
    Arc<dyn Fn() -> Result<Box<dyn Summarizer>, SummarizationError> + Send + Sync>;
pub type TransformFactory = Arc<dyn Fn() -> Box<dyn BionicTransform> + Send + Sync>;

pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One chapter at a time with a single summarizer instance, pausing
    /// between calls for the backend's rate limit.
    Sequential,
    /// A fixed-size pool of workers, each building its own summarizer.
    Parallel { workers: NonZeroUsize },
}

impl RunMode {
    /// Parallel mode sized to the host's available parallelism.
    pub fn parallel_default() -> Self {
        let workers = std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
        RunMode::Parallel { workers }
    }
}

pub struct Orchestrator {
    summarizer: SummarizerFactory,
    bionic: Option<TransformFactory>,
    mode: RunMode,
    rate_limit_delay: Duration,
}

impl Orchestrator {
    pub fn new(summarizer: SummarizerFactory) -> Self {
        Self {
            summarizer,
            bionic: None,
            mode: RunMode::Sequential,
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
        }
    }

    pub fn with_bionic(mut self, bionic: TransformFactory) -> Self {
        self.bionic = Some(bionic);
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn has_bionic(&self) -> bool {
        self.bionic.is_some()
    }

    /// Summarizes every chapter. Every chapter is attempted; there is no way to
    /// cancel a run once started.
    pub async fn run(&self, chapters: &ChapterText) -> ChapterResult {
        let started = Instant::now();
        let results = match self.mode {
            RunMode::Sequential => self.run_sequential(chapters).await,
            RunMode::Parallel { workers } => self.run_parallel(chapters, workers.get()).await,
        };

        let failed = results.failed_count();
        info!(
            mode = ?self.mode,
            chapters = results.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Finished summarizing chapters"
        );
        results
    }

    async fn run_sequential(&self, chapters: &ChapterText) -> ChapterResult {
        let mut results = ChapterResult::new();

        let summarizer = match (self.summarizer)() {
            Ok(summarizer) => summarizer,
            Err(err) => {
                warn!("Could not construct summarizer: {err}");
                for title in chapters.keys() {
                    results.insert(title, ChapterOutcome::failed(err.to_string()));
                }
                return results;
            }
        };
        let bionic = self.bionic.as_ref().map(|factory| factory());

        for (position, (title, text)) in chapters.iter().enumerate() {
            if position > 0 && !self.rate_limit_delay.is_zero() {
                tokio::time::sleep(self.rate_limit_delay).await;
            }
            let outcome = summarize_chapter(title, text, summarizer.as_ref(), bionic.as_deref()).await;
            results.insert(title, outcome);
        }

        results
    }

    async fn run_parallel(&self, chapters: &ChapterText, workers: usize) -> ChapterResult {
        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        for (title, text) in chapters.iter() {
            let title = title.to_string();
            let text = text.clone();
            let permits = Arc::clone(&permits);
            let summarizer_factory = Arc::clone(&self.summarizer);
            let bionic_factory = self.bionic.clone();

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let outcome = match summarizer_factory() {
                    Ok(summarizer) => {
                        let bionic = bionic_factory.map(|factory| factory());
                        summarize_chapter(&title, &text, summarizer.as_ref(), bionic.as_deref())
                            .await
                    }
                    Err(err) => {
                        warn!(%title, "Could not construct summarizer: {err}");
                        ChapterOutcome::failed(err.to_string())
                    }
                };
                (title, outcome)
            });
        }

        // Completion order is arbitrary; results are keyed by title.
        let mut results = ChapterResult::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((title, outcome)) => {
                    results.insert(title, outcome);
                }
                Err(err) => warn!("Summarization worker terminated abnormally: {err}"),
            }
        }

        for title in chapters.keys() {
            if !results.contains_key(title) {
                results.insert(title, ChapterOutcome::failed("worker terminated abnormally"));
            }
        }

        results
    }
}

async fn summarize_chapter(
    title: &str,
    text: &str,
    summarizer: &dyn Summarizer,
    bionic: Option<&dyn BionicTransform>,
) -> ChapterOutcome {
    match summarizer.summarize(text).await {
        Ok(summary) => {
            debug!(%title, "Summarized chapter");
            let bionic = match bionic {
                Some(transform) => BionicStatus::Converted(transform.convert(&summary).await),
                None => BionicStatus::Skipped,
            };
            ChapterOutcome {
                summary: SummaryStatus::Ok(summary),
                bionic,
            }
        }
        Err(err) => {
            warn!(%title, "Error summarizing chapter: {err}");
            ChapterOutcome::failed(err.to_string())
        }
    }
}
