use crate::enrich::EnrichStage;
use crate::scraper::Scraper;
use crate::types::{EnrichedArticle, FeedEntry};
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Turns one feed entry into a fully populated article record: scrape first
/// (it gates everything), then all enrichment stages concurrently.
pub struct EntryProcessor {
    scraper: Arc<Scraper>,
    summary: Arc<dyn EnrichStage>,
    image: Arc<dyn EnrichStage>,
    blog: Arc<dyn EnrichStage>,
    keyword: Arc<dyn EnrichStage>,
}

impl EntryProcessor {
    pub fn new(
        scraper: Arc<Scraper>,
        summary: Arc<dyn EnrichStage>,
        image: Arc<dyn EnrichStage>,
        blog: Arc<dyn EnrichStage>,
        keyword: Arc<dyn EnrichStage>,
    ) -> Self {
        Self {
            scraper,
            summary,
            image,
            blog,
            keyword,
        }
    }

    /// Never fails: the scraper and every stage degrade to diagnostic
    /// strings, so the returned record is always fully populated.
    pub async fn process(&self, entry: &FeedEntry, source_url: &str) -> EnrichedArticle {
        let scrape_result = self.scraper.scrape(&entry.link).await;

        let (summary_result, image_result, blog_result, keyword_result) = tokio::join!(
            run_stage(self.summary.as_ref(), &scrape_result),
            run_stage(self.image.as_ref(), &scrape_result),
            run_stage(self.blog.as_ref(), &scrape_result),
            run_stage(self.keyword.as_ref(), &scrape_result),
        );

        EnrichedArticle {
            id: Uuid::new_v4(),
            title: entry.title.clone(),
            published: entry
                .published
                .clone()
                .unwrap_or_else(|| "No date available".to_string()),
            link: entry.link.clone(),
            source: source_url.to_string(),
            image_url: entry.media_url.clone(),
            scrape_result,
            summary_result,
            image_result,
            blog_result,
            keyword_result,
            created_at: Utc::now(),
        }
    }
}

async fn run_stage(stage: &dyn EnrichStage, scraped: &str) -> String {
    match stage.run(scraped).await {
        Ok(result) => result,
        Err(e) => {
            warn!("{} stage failed: {}", stage.name(), e);
            format!("Error generating {}: {}", stage.name(), e)
        }
    }
}
