pub mod bionic;
pub mod classifier;
pub mod epub_source;
pub mod extractor;
pub mod llm;
pub mod orchestrator;
pub mod scraper;
pub mod toc;
