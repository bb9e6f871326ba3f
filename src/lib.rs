pub mod aggregator;
pub mod config;
pub mod enrich;
pub mod fetcher;
pub mod pipeline;
pub mod processor;
pub mod scraper;
pub mod store;
pub mod types;

pub use aggregator::FeedAggregator;
pub use config::{AppConfig, FetchConfig, LlmConfig};
pub use enrich::{BlogStage, EnrichStage, ImageStage, KeywordStage, LlmClient, SummaryStage};
pub use fetcher::PageFetcher;
pub use pipeline::{EnrichmentPipeline, RunReport};
pub use processor::EntryProcessor;
pub use scraper::Scraper;
pub use store::{validate_feed_url, DocumentStore, MemoryStore, PgStore};
pub use types::*;
