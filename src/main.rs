use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rss_enricher::{
    validate_feed_url, AggregationMode, AppConfig, DocumentStore, EnrichmentPipeline, PgStore,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rss-enricher")]
#[command(about = "RSS/XML feed ingestion and per-article enrichment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate all registered feeds and persist new articles
    Run {
        #[arg(long, value_enum, default_value_t = Mode::Today)]
        mode: Mode,
    },
    /// Register a new feed URL
    AddSource { url: String, domain: String },
    /// List registered feed sources
    Sources,
    /// Show the most recently persisted articles
    Articles {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Every entry of every feed
    All,
    /// Only entries published today (local time)
    Today,
}

impl From<Mode> for AggregationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::All => AggregationMode::All,
            Mode::Today => AggregationMode::TodayOnly,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let store = PgStore::connect(&config.database_url)
        .await
        .context("failed to connect to the database")?;
    store.ensure_schema().await?;
    let store: Arc<dyn DocumentStore> = Arc::new(store);

    match cli.command {
        Command::Run { mode } => {
            let pipeline = EnrichmentPipeline::new(&config, store)?;
            let report = pipeline.run(mode.into()).await?;

            info!(
                "Aggregated {} articles, {} newly persisted",
                report.articles.len(),
                report.new_ids.len()
            );
            for article in &report.articles {
                println!("{} | {} ({})", article.published, article.title, article.link);
            }
        }
        Command::AddSource { url, domain } => {
            validate_feed_url(&url)?;
            let source = store.add_source(&url, &domain).await?;
            println!("Registered {} ({})", source.url, source.id);
        }
        Command::Sources => {
            for source in store.list_sources().await? {
                println!("{}  {}  {}", source.id, source.url, source.created_at);
            }
        }
        Command::Articles { limit } => {
            for article in store.list_articles(limit).await? {
                println!(
                    "{} | {}\n  {}\n  {}\n",
                    article.published, article.title, article.link, article.summary_result
                );
            }
        }
    }

    Ok(())
}
