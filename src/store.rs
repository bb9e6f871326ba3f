use crate::types::{CachedContent, EnrichedArticle, EnricherError, FeedSource, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Document-store collaborator over the three collections the pipeline
/// touches: `xml_urls` (feed sources), `scraped_content` (content cache)
/// and `articles` (enriched results).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<FeedSource>>;

    /// Register a new feed URL. Duplicate URLs are rejected.
    async fn add_source(&self, url: &str, domain: &str) -> Result<FeedSource>;

    async fn cached_content(&self, url: &str) -> Result<Option<CachedContent>>;

    /// Write-once: an existing cache entry for the URL is left untouched.
    async fn put_cached_content(&self, url: &str, content: &str) -> Result<()>;

    async fn find_article_by_link(&self, link: &str) -> Result<Option<EnrichedArticle>>;

    /// Insert the article unless one with the same link already exists.
    /// Returns whether a row was actually created; a duplicate is a benign
    /// skip, not an error.
    async fn insert_article(&self, article: &EnrichedArticle) -> Result<bool>;

    /// Most recently created articles first.
    async fn list_articles(&self, limit: usize) -> Result<Vec<EnrichedArticle>>;
}

/// Scheme and shape check for a feed URL before registration.
pub fn validate_feed_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(EnricherError::InvalidFeedUrl(format!(
            "unsupported scheme '{}' in {}",
            parsed.scheme(),
            url
        )));
    }
    if parsed.host().is_none() {
        return Err(EnricherError::InvalidFeedUrl(format!("no host in {}", url)));
    }
    Ok(())
}

/// Postgres-backed store. One pooled connection set per process; the unique
/// indexes created by [`PgStore::ensure_schema`] are what make concurrent
/// duplicate inserts collapse into a single row.
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = PgPool::connect(database_url).await?;
        Ok(Self { db })
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS xml_urls (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL UNIQUE,
                domain TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scraped_content (
                url TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                scraped_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id UUID PRIMARY KEY,
                title TEXT NOT NULL,
                published TEXT NOT NULL,
                link TEXT NOT NULL UNIQUE,
                source TEXT NOT NULL,
                image_url TEXT,
                scrape_result TEXT NOT NULL,
                summary_result TEXT NOT NULL,
                image_result TEXT NOT NULL,
                blog_result TEXT NOT NULL,
                keyword_result TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_created ON articles (created_at)")
            .execute(&self.db)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_source ON articles (source)")
            .execute(&self.db)
            .await?;

        info!("Database schema ready");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn list_sources(&self) -> Result<Vec<FeedSource>> {
        let rows = sqlx::query(
            "SELECT id, url, domain, created_at FROM xml_urls ORDER BY created_at",
        )
        .fetch_all(&self.db)
        .await?;

        let mut sources = Vec::with_capacity(rows.len());
        for row in rows {
            sources.push(FeedSource {
                id: row.try_get("id")?,
                url: row.try_get("url")?,
                domain: row.try_get("domain")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(sources)
    }

    async fn add_source(&self, url: &str, domain: &str) -> Result<FeedSource> {
        let source = FeedSource::new(url.to_string(), domain.to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO xml_urls (id, url, domain, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(&source.id)
        .bind(&source.url)
        .bind(&source.domain)
        .bind(source.created_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EnricherError::SourceExists(url.to_string()));
        }

        info!("Registered feed source: {} ({})", source.url, source.id);
        Ok(source)
    }

    async fn cached_content(&self, url: &str) -> Result<Option<CachedContent>> {
        let row = sqlx::query(
            "SELECT url, content, scraped_at FROM scraped_content WHERE url = $1",
        )
        .bind(url)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(Some(CachedContent {
                url: row.try_get("url")?,
                content: row.try_get("content")?,
                scraped_at: row.try_get("scraped_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn put_cached_content(&self, url: &str, content: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scraped_content (url, content, scraped_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(url)
        .bind(content)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn find_article_by_link(&self, link: &str) -> Result<Option<EnrichedArticle>> {
        let row = sqlx::query("SELECT * FROM articles WHERE link = $1")
            .bind(link)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => Ok(Some(article_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_article(&self, article: &EnrichedArticle) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (id, title, published, link, source, image_url,
                scrape_result, summary_result, image_result, blog_result,
                keyword_result, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (link) DO NOTHING
            "#,
        )
        .bind(article.id)
        .bind(&article.title)
        .bind(&article.published)
        .bind(&article.link)
        .bind(&article.source)
        .bind(&article.image_url)
        .bind(&article.scrape_result)
        .bind(&article.summary_result)
        .bind(&article.image_result)
        .bind(&article.blog_result)
        .bind(&article.keyword_result)
        .bind(article.created_at)
        .execute(&self.db)
        .await?;

        let inserted = result.rows_affected() > 0;
        if !inserted {
            debug!("Skipping duplicate article: {}", article.link);
        }
        Ok(inserted)
    }

    async fn list_articles(&self, limit: usize) -> Result<Vec<EnrichedArticle>> {
        let rows = sqlx::query("SELECT * FROM articles ORDER BY created_at DESC LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.db)
            .await?;

        let mut articles = Vec::with_capacity(rows.len());
        for row in rows {
            articles.push(article_from_row(&row)?);
        }
        Ok(articles)
    }
}

fn article_from_row(row: &sqlx::postgres::PgRow) -> Result<EnrichedArticle> {
    Ok(EnrichedArticle {
        id: row.try_get::<Uuid, _>("id")?,
        title: row.try_get("title")?,
        published: row.try_get("published")?,
        link: row.try_get("link")?,
        source: row.try_get("source")?,
        image_url: row.try_get("image_url")?,
        scrape_result: row.try_get("scrape_result")?,
        summary_result: row.try_get("summary_result")?,
        image_result: row.try_get("image_result")?,
        blog_result: row.try_get("blog_result")?,
        keyword_result: row.try_get("keyword_result")?,
        created_at: row.try_get("created_at")?,
    })
}

/// In-memory store with the same dedup semantics as [`PgStore`]. Used by the
/// test suite and by offline runs without a database.
#[derive(Default)]
pub struct MemoryStore {
    sources: RwLock<Vec<FeedSource>>,
    cache: RwLock<HashMap<String, CachedContent>>,
    articles: RwLock<Vec<EnrichedArticle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_sources(&self) -> Result<Vec<FeedSource>> {
        Ok(self.sources.read().await.clone())
    }

    async fn add_source(&self, url: &str, domain: &str) -> Result<FeedSource> {
        let mut sources = self.sources.write().await;
        if sources.iter().any(|s| s.url == url) {
            return Err(EnricherError::SourceExists(url.to_string()));
        }
        let source = FeedSource::new(url.to_string(), domain.to_string());
        sources.push(source.clone());
        Ok(source)
    }

    async fn cached_content(&self, url: &str) -> Result<Option<CachedContent>> {
        Ok(self.cache.read().await.get(url).cloned())
    }

    async fn put_cached_content(&self, url: &str, content: &str) -> Result<()> {
        let mut cache = self.cache.write().await;
        cache.entry(url.to_string()).or_insert_with(|| CachedContent {
            url: url.to_string(),
            content: content.to_string(),
            scraped_at: Utc::now(),
        });
        Ok(())
    }

    async fn find_article_by_link(&self, link: &str) -> Result<Option<EnrichedArticle>> {
        Ok(self
            .articles
            .read()
            .await
            .iter()
            .find(|a| a.link == link)
            .cloned())
    }

    async fn insert_article(&self, article: &EnrichedArticle) -> Result<bool> {
        let mut articles = self.articles.write().await;
        if articles.iter().any(|a| a.link == article.link) {
            return Ok(false);
        }
        articles.push(article.clone());
        Ok(true)
    }

    async fn list_articles(&self, limit: usize) -> Result<Vec<EnrichedArticle>> {
        let articles = self.articles.read().await;
        let mut out: Vec<EnrichedArticle> = articles.clone();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }
}
