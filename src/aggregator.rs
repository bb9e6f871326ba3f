use crate::fetcher::PageFetcher;
use crate::processor::EntryProcessor;
use crate::types::{AggregationMode, EnrichedArticle, EnricherError, FeedEntry, Result};
use chrono::{Local, NaiveDate};
use feed_rs::parser;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Drives one aggregation pass: parse every feed URL, select entries by
/// mode, process the selection concurrently and flatten the results in
/// feed-iteration order.
pub struct FeedAggregator {
    fetcher: PageFetcher,
    processor: Arc<EntryProcessor>,
    /// Bounds how many entries are scraped/enriched at once across all feeds.
    limits: Arc<Semaphore>,
}

impl FeedAggregator {
    pub fn new(
        fetcher: PageFetcher,
        processor: Arc<EntryProcessor>,
        max_concurrent_entries: usize,
    ) -> Self {
        Self {
            fetcher,
            processor,
            limits: Arc::new(Semaphore::new(max_concurrent_entries.max(1))),
        }
    }

    /// A failing feed contributes zero articles; it never aborts the pass.
    pub async fn aggregate(&self, urls: &[String], mode: AggregationMode) -> Vec<EnrichedArticle> {
        let today = Local::now().date_naive();

        let per_feed = urls.iter().map(|url| self.process_feed(url, mode, today));
        let results = join_all(per_feed).await;

        let articles: Vec<EnrichedArticle> = results.into_iter().flatten().collect();
        info!(
            "Aggregation pass over {} feeds produced {} articles",
            urls.len(),
            articles.len()
        );
        articles
    }

    async fn process_feed(
        &self,
        url: &str,
        mode: AggregationMode,
        today: NaiveDate,
    ) -> Vec<EnrichedArticle> {
        let entries = match self.load_entries(url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping feed {}: {}", url, e);
                return Vec::new();
            }
        };

        let total = entries.len();
        let selected: Vec<FeedEntry> = entries
            .into_iter()
            .filter(|entry| is_selected(entry, mode, today))
            .collect();
        debug!("Feed {}: selected {}/{} entries", url, selected.len(), total);

        let tasks = selected.iter().map(|entry| async move {
            let _permit = self.limits.acquire().await.expect("semaphore closed");
            self.processor.process(entry, url).await
        });
        join_all(tasks).await
    }

    async fn load_entries(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let body = self.fetcher.get_text(url).await?;
        parse_feed_content(&body)
    }
}

/// Parse an RSS/Atom document into ephemeral entries. Entries without a link
/// cannot be scraped or deduplicated, so they are dropped individually.
pub fn parse_feed_content(content: &str) -> Result<Vec<FeedEntry>> {
    let feed = parser::parse(content.as_bytes())
        .map_err(|e| EnricherError::FeedParse(e.to_string()))?;

    let mut entries = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        match convert_entry(entry) {
            Some(entry) => entries.push(entry),
            None => warn!("Dropping feed entry without a link"),
        }
    }
    Ok(entries)
}

fn convert_entry(entry: feed_rs::model::Entry) -> Option<FeedEntry> {
    let link = entry.links.first()?.href.clone();
    let title = entry
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Untitled".to_string());

    let published_parsed = entry.published;
    let published = published_parsed.map(|ts| ts.to_rfc2822());

    let media_url = entry
        .media
        .first()
        .and_then(|media| media.content.first())
        .and_then(|content| content.url.as_ref())
        .map(|url| url.to_string());

    Some(FeedEntry {
        title,
        published,
        published_parsed,
        link,
        media_url,
    })
}

/// Under `TodayOnly` an entry must carry a publish timestamp whose calendar
/// date, in the server's local timezone, is the run's current date.
fn is_selected(entry: &FeedEntry, mode: AggregationMode, today: NaiveDate) -> bool {
    match mode {
        AggregationMode::All => true,
        AggregationMode::TodayOnly => entry
            .published_parsed
            .map(|ts| ts.with_timezone(&Local).date_naive() == today)
            .unwrap_or(false),
    }
}
