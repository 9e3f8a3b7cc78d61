use crate::models::ChapterResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A finished summarization, as served to repeat uploads of the same book.
#[derive(Debug, Clone)]
pub struct CachedSummary {
    pub title: String,
    pub language: Option<String>,
    pub chapters: ChapterResult,
}

/// Summaries keyed by book title. Grows for the lifetime of the process.
#[derive(Default)]
pub struct SummaryCache {
    entries: RwLock<HashMap<String, Arc<CachedSummary>>>,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, title: &str) -> Option<Arc<CachedSummary>> {
        let entries = self.entries.read().await;
        entries.get(title).cloned()
    }

    /// Stores `summary` under its title, replacing any earlier entry.
    pub async fn insert(&self, summary: CachedSummary) -> Arc<CachedSummary> {
        let summary = Arc::new(summary);
        let mut entries = self.entries.write().await;
        if entries
            .insert(summary.title.clone(), Arc::clone(&summary))
            .is_some()
        {
            debug!(title = %summary.title, "Replaced cached summary");
        }
        summary
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
