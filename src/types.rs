use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered feed URL with its metadata. Created once at registration
/// time and read-only to the pipeline afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    pub id: String,
    pub url: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
}

impl FeedSource {
    pub fn new(url: String, domain: String) -> Self {
        Self {
            id: format!("{}_{}", domain, Uuid::new_v4()),
            url,
            domain,
            created_at: Utc::now(),
        }
    }
}

/// Plain-text content previously extracted for an article link. A cache hit
/// short-circuits re-fetching; entries are never updated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedContent {
    pub url: String,
    pub content: String,
    pub scraped_at: DateTime<Utc>,
}

/// One item of a parsed feed. Ephemeral: lives for a single aggregation pass.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub published: Option<String>,
    pub published_parsed: Option<DateTime<Utc>>,
    pub link: String,
    pub media_url: Option<String>,
}

/// The fully enriched, persistable article record. Unique by `link`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedArticle {
    pub id: Uuid,
    pub title: String,
    pub published: String,
    pub link: String,
    pub source: String,
    pub image_url: Option<String>,
    pub scrape_result: String,
    pub summary_result: String,
    pub image_result: String,
    pub blog_result: String,
    pub keyword_result: String,
    pub created_at: DateTime<Utc>,
}

/// Entry selection mode for one aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    /// Every entry of every feed.
    All,
    /// Only entries whose publish date falls on the current local calendar day.
    TodayOnly,
}

#[derive(Debug, thiserror::Error)]
pub enum EnricherError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("feed parse error: {0}")]
    FeedParse(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid feed URL: {0}")]
    InvalidFeedUrl(String),

    #[error("enrichment service error: {0}")]
    Enrichment(String),

    #[error("source already registered: {0}")]
    SourceExists(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EnricherError>;
