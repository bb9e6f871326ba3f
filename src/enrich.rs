use crate::config::LlmConfig;
use crate::types::{EnricherError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One independent enrichment transform over scraped article text. Stage
/// errors are converted to diagnostic placeholders by the entry processor;
/// they never abort sibling stages or the entry.
#[async_trait]
pub trait EnrichStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, scraped: &str) -> Result<String>;
}

/// Client for an OpenAI-compatible chat-completions endpoint. Constructed
/// once and injected into the stages that need it.
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(EnricherError::Http)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    pub async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(EnricherError::Enrichment(
                "no API key configured".to_string(),
            ));
        }

        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }
        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }

        let request = Request {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnricherError::Enrichment(format!(
                "completion request failed with status {}",
                status.as_u16()
            )));
        }

        let body: Response = response.json().await?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(EnricherError::Enrichment(
                "empty completion returned".to_string(),
            ));
        }

        debug!("Completion returned {} chars", content.len());
        Ok(content)
    }
}

/// ~100-word summary of the scraped text via the external model.
pub struct SummaryStage {
    client: Arc<LlmClient>,
    temperature: f32,
}

impl SummaryStage {
    pub fn new(client: Arc<LlmClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }
}

#[async_trait]
impl EnrichStage for SummaryStage {
    fn name(&self) -> &'static str {
        "summary"
    }

    async fn run(&self, scraped: &str) -> Result<String> {
        let prompt = format!(
            "Summarize the following text in approximately 100 words while \
             preserving all key context and main points:\n\n{}",
            scraped
        );
        self.client.complete(&prompt, self.temperature).await
    }
}

const BLOG_PROMPT: &str = "You are tasked with generating a listicle blog post. \
Follow the steps below to ensure clarity, accuracy, and coherence. Avoid \
hallucination by strictly adhering to the provided context.\n\n\
1. Title: start with a catchy title that includes a number and the central theme.\n\
2. Introduction: introduce the topic with a 2-3 sentence overview and explain how \
the list benefits the reader.\n\
3. List items: give each item a descriptive H3 heading and a 2-3 sentence \
description of its significance.\n\
4. Conclusion: summarize the key points, restate the value and close with a call \
to action.\n\nContext:\n";

/// Derives a listicle-style blog post from the scraped text.
pub struct BlogStage {
    client: Arc<LlmClient>,
}

impl BlogStage {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EnrichStage for BlogStage {
    fn name(&self) -> &'static str {
        "blog"
    }

    async fn run(&self, scraped: &str) -> Result<String> {
        let prompt = format!("{}{}", BLOG_PROMPT, scraped);
        self.client.complete(&prompt, 0.2).await
    }
}

/// Picks the first image-looking URL out of the scraped text.
pub struct ImageStage {
    image_url: Regex,
}

impl ImageStage {
    pub fn new() -> Result<Self> {
        let image_url = Regex::new(r#"https?://[^\s"'<>]+\.(?:png|jpe?g|gif|webp)"#)
            .map_err(|e| EnricherError::Enrichment(e.to_string()))?;
        Ok(Self { image_url })
    }
}

#[async_trait]
impl EnrichStage for ImageStage {
    fn name(&self) -> &'static str {
        "image"
    }

    async fn run(&self, scraped: &str) -> Result<String> {
        Ok(self
            .image_url
            .find(scraped)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "No image reference found".to_string()))
    }
}

/// Frequency-based keyword extraction over the scraped text.
pub struct KeywordStage {
    max_keywords: usize,
}

impl KeywordStage {
    pub fn new() -> Self {
        Self { max_keywords: 10 }
    }
}

#[async_trait]
impl EnrichStage for KeywordStage {
    fn name(&self) -> &'static str {
        "keywords"
    }

    async fn run(&self, scraped: &str) -> Result<String> {
        let keywords = extract_keywords(scraped, self.max_keywords);
        if keywords.is_empty() {
            return Ok("No keywords extracted".to_string());
        }
        Ok(keywords.join(", "))
    }
}

/// Most frequent substantial words, stop words removed, most frequent first
/// with an alphabetical tie-break.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for word in text.to_lowercase().split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if word.len() <= 3 || is_stop_word(word) {
            continue;
        }
        *counts.entry(word.to_string()).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(max);
    ranked.into_iter().map(|(word, _)| word).collect()
}

fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "the" | "and" | "or" | "but" | "in" | "on" | "at" | "to" | "for" | "of" | "with" | "by"
            | "a" | "an" | "is" | "are" | "was" | "were" | "be" | "been" | "have" | "has" | "had"
            | "do" | "does" | "did" | "will" | "would" | "could" | "should" | "may" | "might"
            | "must" | "can" | "this" | "that" | "these" | "those" | "from" | "into" | "about"
            | "their" | "there" | "than" | "then" | "when" | "while" | "what" | "which" | "your"
    )
}
