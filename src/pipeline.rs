use crate::aggregator::FeedAggregator;
use crate::config::AppConfig;
use crate::enrich::{BlogStage, ImageStage, KeywordStage, LlmClient, SummaryStage};
use crate::fetcher::PageFetcher;
use crate::processor::EntryProcessor;
use crate::scraper::Scraper;
use crate::store::DocumentStore;
use crate::types::{AggregationMode, EnrichedArticle, Result};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Outcome of one full aggregation pass.
pub struct RunReport {
    /// Every article produced by the pass, duplicates included.
    pub articles: Vec<EnrichedArticle>,
    /// Ids of the articles actually persisted (new links only).
    pub new_ids: Vec<Uuid>,
}

/// Facade wiring registry, aggregator and persistence sink together.
pub struct EnrichmentPipeline {
    store: Arc<dyn DocumentStore>,
    aggregator: FeedAggregator,
}

impl EnrichmentPipeline {
    pub fn new(config: &AppConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let fetcher = PageFetcher::new(&config.fetch)?;
        let llm = Arc::new(LlmClient::new(&config.llm)?);

        let scraper = Arc::new(Scraper::new(fetcher.clone(), store.clone()));
        let processor = Arc::new(EntryProcessor::new(
            scraper,
            Arc::new(SummaryStage::new(llm.clone(), config.llm.temperature)),
            Arc::new(ImageStage::new()?),
            Arc::new(BlogStage::new(llm)),
            Arc::new(KeywordStage::new()),
        ));
        let aggregator = FeedAggregator::new(fetcher, processor, config.max_concurrent_entries);

        Ok(Self { store, aggregator })
    }

    pub async fn aggregate(
        &self,
        urls: &[String],
        mode: AggregationMode,
    ) -> Vec<EnrichedArticle> {
        self.aggregator.aggregate(urls, mode).await
    }

    /// Insert-or-skip per article; returns ids of newly created records
    /// only, so a re-run over unchanged feeds reports an empty list.
    pub async fn persist(&self, articles: &[EnrichedArticle]) -> Result<Vec<Uuid>> {
        let mut new_ids = Vec::new();
        for article in articles {
            if self.store.insert_article(article).await? {
                new_ids.push(article.id);
            }
        }

        info!(
            "Persisted {} new of {} candidate articles",
            new_ids.len(),
            articles.len()
        );
        Ok(new_ids)
    }

    /// One full pass: registered sources → aggregate → persist.
    pub async fn run(&self, mode: AggregationMode) -> Result<RunReport> {
        let sources = self.store.list_sources().await?;
        let urls: Vec<String> = sources.iter().map(|s| s.url.clone()).collect();
        info!("Running aggregation over {} registered sources", urls.len());

        let articles = self.aggregate(&urls, mode).await;
        let new_ids = self.persist(&articles).await?;

        Ok(RunReport { articles, new_ids })
    }
}
