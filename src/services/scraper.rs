use crate::error::ScraperError;
use crate::models::{ChapterIndex, ChapterOutcome, ChapterResult, ChapterText, OrderedMap};
use crate::services::epub_source::BookSource;
use crate::services::extractor::extract;
use crate::services::orchestrator::Orchestrator;
use crate::services::toc::flatten;
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing::info;

/// One book on its way from EPUB to chapter summaries.
///
/// The chapter index is built when the scraper is created. Chapter text is
/// extracted on first use and kept for the lifetime of the scraper.
pub struct EbookScraper {
    source: BookSource,
    chapters_idx: ChapterIndex,
    min_length: usize,
    book_parsed: OnceCell<ChapterText>,
    result: Option<ChapterResult>,
    orchestrator: Orchestrator,
}

impl EbookScraper {
    pub fn new(source: BookSource, min_length: usize, orchestrator: Orchestrator) -> Self {
        let chapters_idx = flatten(&source.toc);
        info!(
            title = %source.title,
            chapters = chapters_idx.len(),
            "Indexed book chapters"
        );

        Self {
            source,
            chapters_idx,
            min_length,
            book_parsed: OnceCell::new(),
            result: None,
            orchestrator,
        }
    }

    pub fn open(
        path: &Path,
        min_length: usize,
        orchestrator: Orchestrator,
    ) -> Result<Self, ScraperError> {
        let source = BookSource::open(path)?;
        Ok(Self::new(source, min_length, orchestrator))
    }

    pub fn title(&self) -> &str {
        &self.source.title
    }

    pub fn language(&self) -> Option<&str> {
        self.source.language.as_deref()
    }

    /// Whether the book's language is one of `allowed`.
    ///
    /// Only the primary subtag is compared, so `en-US` passes for `en`. An empty
    /// list allows everything; a book without a language passes only then.
    pub fn is_allowed_language(&self, allowed: &[String]) -> bool {
        if allowed.is_empty() {
            return true;
        }
        let Some(language) = self.language() else {
            return false;
        };
        let primary = language.split(['-', '_']).next().unwrap_or(language);
        allowed
            .iter()
            .any(|lang| lang.trim().eq_ignore_ascii_case(primary))
    }

    pub fn chapter_index(&self) -> &ChapterIndex {
        &self.chapters_idx
    }

    pub fn chapters(&self) -> &ChapterText {
        self.book_parsed
            .get_or_init(|| extract(&self.source.documents, &self.chapters_idx, self.min_length))
    }

    /// Summarizes every extracted chapter, replacing any earlier result.
    pub async fn summarize_chapters(&mut self) -> &ChapterResult {
        let result = self.orchestrator.run(self.chapters()).await;
        &*self.result.insert(result)
    }

    pub fn result(&self) -> Option<&ChapterResult> {
        self.result.as_ref()
    }

    /// Plain summaries of the latest run.
    pub fn summary(&self) -> Result<OrderedMap<String>, ScraperError> {
        self.result
            .as_ref()
            .map(ChapterResult::plain_texts)
            .ok_or(ScraperError::NotSummarized)
    }

    /// Bionic summaries of the latest run, plain text where none was produced.
    pub fn summary_bionic(&self) -> Result<OrderedMap<String>, ScraperError> {
        self.result
            .as_ref()
            .map(ChapterResult::bionic_texts)
            .ok_or(ScraperError::NotSummarized)
    }

    /// Outcome for the `idx`-th indexed chapter, clamped to the last one.
    ///
    /// `Ok(None)` means the chapter was indexed but never summarized, usually
    /// because its text was too short.
    pub fn chapter_summary(&self, idx: usize) -> Result<Option<&ChapterOutcome>, ScraperError> {
        let result = self.result.as_ref().ok_or(ScraperError::NotSummarized)?;
        let last = self
            .chapters_idx
            .len()
            .checked_sub(1)
            .ok_or(ScraperError::NoChapters)?;

        Ok(self
            .chapters_idx
            .get_index(idx.min(last))
            .and_then(|(_, title)| result.get(title)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SummarizationError;
    use crate::services::bionic::BionicTransform;
    use crate::services::epub_source::tests::sample_epub;
    use crate::services::llm::Summarizer;
    use crate::services::orchestrator::RunMode;
    use async_trait::async_trait;
    use std::num::NonZeroUsize;
    use std::sync::Arc;
    use std::time::Duration;

    struct LengthSummarizer;

    #[async_trait]
    impl Summarizer for LengthSummarizer {
        async fn summarize(&self, text: &str) -> Result<String, SummarizationError> {
            Ok(format!("{} words", text.split_whitespace().count()))
        }
    }

    struct Bolden;

    #[async_trait]
    impl BionicTransform for Bolden {
        async fn convert(&self, text: &str) -> String {
            format!("<b>{text}</b>")
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(Arc::new(|| {
            Ok(Box::new(LengthSummarizer) as Box<dyn Summarizer>)
        }))
        .with_rate_limit_delay(Duration::ZERO)
    }

    fn scraper(orchestrator: Orchestrator) -> EbookScraper {
        let source = BookSource::from_bytes(sample_epub()).unwrap();
        EbookScraper::new(source, 105, orchestrator)
    }

    #[test]
    fn test_index_and_chapters() {
        let scraper = scraper(orchestrator());

        assert_eq!(scraper.title(), "The Sample Book");
        assert_eq!(
            scraper.chapter_index().values().collect::<Vec<_>>(),
            vec!["Chapter 1: Beginnings", "Chapter 2: Interval", "The Long Road"]
        );
        // The interval page is below the length threshold.
        assert_eq!(
            scraper.chapters().keys().collect::<Vec<_>>(),
            vec!["Chapter 1: Beginnings", "The Long Road"]
        );
        assert!(std::ptr::eq(scraper.chapters(), scraper.chapters()));
    }

    #[test]
    fn test_language_gate() {
        fn langs(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }
        let scraper = scraper(orchestrator());

        assert!(scraper.is_allowed_language(&langs(&["en"])));
        assert!(scraper.is_allowed_language(&langs(&["fr", "EN"])));
        assert!(scraper.is_allowed_language(&[]));
        assert!(!scraper.is_allowed_language(&langs(&["de"])));
    }

    #[tokio::test]
    async fn test_summaries_before_and_after_run() {
        let mut scraper = scraper(orchestrator());
        assert!(matches!(
            scraper.chapter_summary(0),
            Err(ScraperError::NotSummarized)
        ));
        assert!(matches!(scraper.summary(), Err(ScraperError::NotSummarized)));

        let result = scraper.summarize_chapters().await;
        assert_eq!(result.len(), 2);
        assert_eq!(result.failed_count(), 0);

        assert!(scraper.chapter_summary(0).unwrap().is_some());
        // Indexed but too short to summarize.
        assert!(scraper.chapter_summary(1).unwrap().is_none());
        // Out of range clamps to the last indexed chapter.
        assert_eq!(
            scraper.chapter_summary(99).unwrap(),
            scraper.result().unwrap().get("The Long Road")
        );

        let plain = scraper.summary().unwrap();
        assert!(plain.get("The Long Road").unwrap().ends_with(" words"));
        assert_eq!(scraper.summary_bionic().unwrap(), plain);
    }

    #[tokio::test]
    async fn test_parallel_run_with_bionic_view() {
        let orchestrator = orchestrator()
            .with_mode(RunMode::Parallel {
                workers: NonZeroUsize::new(2).unwrap(),
            })
            .with_bionic(Arc::new(|| Box::new(Bolden) as Box<dyn BionicTransform>));
        let mut scraper = scraper(orchestrator);

        scraper.summarize_chapters().await;
        let plain = scraper.summary().unwrap();
        let bionic = scraper.summary_bionic().unwrap();

        for (title, text) in plain.iter() {
            assert_eq!(bionic.get(title), Some(&format!("<b>{text}</b>")));
        }
    }

    #[tokio::test]
    async fn test_rerun_replaces_result() {
        let mut scraper = scraper(orchestrator());
        let first = scraper.summarize_chapters().await.clone();
        let second = scraper.summarize_chapters().await.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_open_missing_file_is_load_error() {
        let err = EbookScraper::open(Path::new("/nonexistent/book.epub"), 105, orchestrator())
            .err()
            .unwrap();
        assert!(matches!(err, ScraperError::Load(_)));
    }
}
