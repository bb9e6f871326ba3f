use chrono::{Duration, Utc};
use rss_enricher::{
    AggregationMode, AppConfig, DocumentStore, EnrichmentPipeline, FetchConfig, LlmConfig,
    MemoryStore, PageFetcher, Scraper,
};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn article_html(body: &str) -> String {
    format!(
        "<html><body><article><h1>A headline that is long enough</h1><p>{}</p></article></body></html>",
        body
    )
}

fn rss_item(title: &str, link: &str, pub_date: Option<&str>, media_url: Option<&str>) -> String {
    let mut item = format!("<item><title>{}</title><link>{}</link>", title, link);
    if let Some(date) = pub_date {
        item.push_str(&format!("<pubDate>{}</pubDate>", date));
    }
    if let Some(url) = media_url {
        item.push_str(&format!(r#"<media:content url="{}" />"#, url));
    }
    item.push_str("</item>");
    item
}

fn rss_feed(items: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
<channel><title>Test Feed</title><link>https://example.com</link>{}</channel>
</rss>"#,
        items.concat()
    )
}

fn test_config(server: &MockServer) -> AppConfig {
    AppConfig {
        fetch: FetchConfig {
            timeout_seconds: 5,
            ..FetchConfig::default()
        },
        llm: LlmConfig {
            base_url: server.uri(),
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            timeout_seconds: 5,
            ..LlmConfig::default()
        },
        max_concurrent_entries: 4,
        ..AppConfig::default()
    }
}

fn build_pipeline(server: &MockServer, store: Arc<MemoryStore>) -> EnrichmentPipeline {
    EnrichmentPipeline::new(&test_config(server), store as Arc<dyn DocumentStore>)
        .expect("pipeline construction")
}

async fn mount_completions(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "A concise generated summary."}}]
        })))
        .mount(server)
        .await;
}

async fn mount_article(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_html(body)))
        .mount(server)
        .await;
}

async fn mount_feed(server: &MockServer, route: &str, feed_xml: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(feed_xml.to_string())
                .insert_header("content-type", "application/rss+xml"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn today_only_filters_entries_and_isolates_broken_feeds() {
    let server = MockServer::start().await;
    mount_completions(&server).await;

    let now = Utc::now().to_rfc2822();
    let old = (Utc::now() - Duration::days(3)).to_rfc2822();

    let feed_a = rss_feed(&[
        rss_item(
            "Fresh One",
            &format!("{}/articles/1", server.uri()),
            Some(&now),
            Some("https://cdn.example.com/one.jpg"),
        ),
        rss_item("Fresh Two", &format!("{}/articles/2", server.uri()), Some(&now), None),
        rss_item("Stale", &format!("{}/articles/3", server.uri()), Some(&old), None),
    ]);
    mount_feed(&server, "/feeds/a.xml", &feed_a).await;

    // Feed B returns a 200 that is not a feed at all.
    Mock::given(method("GET"))
        .and(path("/feeds/b.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a feed</html>"))
        .mount(&server)
        .await;

    mount_article(&server, "/articles/1", "First article body with plenty of text in it.").await;
    mount_article(&server, "/articles/2", "Second article body with plenty of text in it.").await;

    let store = Arc::new(MemoryStore::new());
    let pipeline = build_pipeline(&server, store.clone());

    let urls = vec![
        format!("{}/feeds/a.xml", server.uri()),
        format!("{}/feeds/b.xml", server.uri()),
    ];
    let articles = pipeline.aggregate(&urls, AggregationMode::TodayOnly).await;

    assert_eq!(articles.len(), 2);
    assert!(articles.iter().all(|a| a.source == urls[0]));

    let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Fresh One", "Fresh Two"]);

    assert_eq!(
        articles[0].image_url.as_deref(),
        Some("https://cdn.example.com/one.jpg")
    );
    assert!(articles[0].scrape_result.contains("First article body"));
    assert_eq!(articles[0].summary_result, "A concise generated summary.");

    let new_ids = pipeline.persist(&articles).await.unwrap();
    assert_eq!(new_ids.len(), 2);
}

#[tokio::test]
async fn same_link_across_feeds_is_persisted_once() {
    let server = MockServer::start().await;
    mount_completions(&server).await;

    let now = Utc::now().to_rfc2822();
    let shared_link = format!("{}/articles/shared", server.uri());

    let feed_a = rss_feed(&[rss_item("From A", &shared_link, Some(&now), None)]);
    let feed_c = rss_feed(&[rss_item("From C", &shared_link, Some(&now), None)]);
    mount_feed(&server, "/feeds/a.xml", &feed_a).await;
    mount_feed(&server, "/feeds/c.xml", &feed_c).await;
    mount_article(&server, "/articles/shared", "Shared article body with plenty of text.").await;

    let store = Arc::new(MemoryStore::new());
    let pipeline = build_pipeline(&server, store.clone());

    let urls = vec![
        format!("{}/feeds/a.xml", server.uri()),
        format!("{}/feeds/c.xml", server.uri()),
    ];
    let articles = pipeline.aggregate(&urls, AggregationMode::All).await;
    assert_eq!(articles.len(), 2);

    let new_ids = pipeline.persist(&articles).await.unwrap();
    assert_eq!(new_ids.len(), 1);

    let stored = store.list_articles(10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].link, shared_link);
}

#[tokio::test]
async fn rerun_over_unchanged_feeds_is_idempotent() {
    let server = MockServer::start().await;
    mount_completions(&server).await;

    let now = Utc::now().to_rfc2822();
    let feed = rss_feed(&[
        rss_item("One", &format!("{}/articles/1", server.uri()), Some(&now), None),
        rss_item("Two", &format!("{}/articles/2", server.uri()), Some(&now), None),
    ]);
    mount_feed(&server, "/feeds/a.xml", &feed).await;

    // Each article page may be fetched at most once across both runs; the
    // second run must be served from the content cache.
    Mock::given(method("GET"))
        .and(path("/articles/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_html("Body number one with plenty of text in it.")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/articles/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_html("Body number two with plenty of text in it.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store
        .add_source(&format!("{}/feeds/a.xml", server.uri()), "example.com")
        .await
        .unwrap();

    let pipeline = build_pipeline(&server, store.clone());

    let first = pipeline.run(AggregationMode::All).await.unwrap();
    assert_eq!(first.articles.len(), 2);
    assert_eq!(first.new_ids.len(), 2);

    let second = pipeline.run(AggregationMode::All).await.unwrap();
    assert_eq!(second.articles.len(), 2);
    assert!(second.new_ids.is_empty());

    let stored = store.list_articles(10).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn scraper_fetches_each_link_at_most_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/articles/cached"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_html("Cache me once, serve me twice, with text.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let fetcher = PageFetcher::new(&FetchConfig::default()).unwrap();
    let scraper = Scraper::new(fetcher, store.clone() as Arc<dyn DocumentStore>);

    let link = format!("{}/articles/cached", server.uri());
    let first = scraper.scrape(&link).await;
    let second = scraper.scrape(&link).await;

    assert!(first.contains("Cache me once"));
    assert_eq!(first, second);
}

#[tokio::test]
async fn scraper_degrades_on_http_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/articles/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let fetcher = PageFetcher::new(&FetchConfig::default()).unwrap();
    let scraper = Scraper::new(fetcher, store.clone() as Arc<dyn DocumentStore>);

    let link = format!("{}/articles/missing", server.uri());
    let result = scraper.scrape(&link).await;

    assert!(result.starts_with(&format!("Error scraping {}", link)));
    // Diagnostics are never cached.
    assert!(store.cached_content(&link).await.unwrap().is_none());
}

#[tokio::test]
async fn summary_failure_leaves_sibling_stages_intact() {
    let server = MockServer::start().await;

    // The summarization prompt fails; the blog prompt still succeeds.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Summarize the following"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "A generated blog post."}}]
        })))
        .mount(&server)
        .await;

    let now = Utc::now().to_rfc2822();
    let feed = rss_feed(&[rss_item(
        "Only Entry",
        &format!("{}/articles/1", server.uri()),
        Some(&now),
        None,
    )]);
    mount_feed(&server, "/feeds/a.xml", &feed).await;
    mount_article(
        &server,
        "/articles/1",
        "Enrichment pipeline coverage article body with repeated pipeline words.",
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let pipeline = build_pipeline(&server, store.clone());

    let urls = vec![format!("{}/feeds/a.xml", server.uri())];
    let articles = pipeline.aggregate(&urls, AggregationMode::All).await;
    assert_eq!(articles.len(), 1);

    let article = &articles[0];
    assert!(article.summary_result.starts_with("Error generating summary:"));
    assert_eq!(article.blog_result, "A generated blog post.");
    assert!(article.scrape_result.contains("Enrichment pipeline coverage"));
    assert_eq!(article.image_result, "No image reference found");
    assert!(article.keyword_result.contains("pipeline"));
}
