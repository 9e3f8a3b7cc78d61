use thiserror::Error;

/// Failure of a single summarization call. Always chapter-scoped.
#[derive(Debug, Error)]
pub enum SummarizationError {
    #[error("summarization backend rate limited the request")]
    RateLimited,
    #[error("summarization backend returned {status}: {body}")]
    Backend { status: u16, body: String },
    #[error("summarization request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed summarization response: {0}")]
    MalformedResponse(String),
    #[error("refusing to summarize empty text")]
    EmptyInput,
    #[error("summarizer could not be constructed: {0}")]
    Setup(String),
}

#[derive(Debug, Error)]
pub enum ScraperError {
    /// The EPUB container could not be read at all.
    #[error("error loading EPUB file: {0}")]
    Load(String),
    #[error("chapters have not been summarized yet")]
    NotSummarized,
    #[error("book has no chapters")]
    NoChapters,
}
