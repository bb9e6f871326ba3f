use crate::fetcher::PageFetcher;
use crate::store::DocumentStore;
use select::document::Document;
use select::node::Node;
use select::predicate::{Attr, Class, Name, Predicate};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fragments shorter than this are navigation chrome, bylines or captions,
/// not article text.
const MIN_FRAGMENT_LEN: usize = 20;

const BOILERPLATE_PHRASES: &[&str] = &["Click here", "Subscribe now", "Advertisement"];

/// Elements whose text never belongs to the article body.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "svg", "iframe", "form", "input", "button", "meta",
];

/// Container tags/classes that mark navigation, ads and comment sections.
const EXCLUDED_SECTION_TAGS: &[&str] = &["nav", "header", "footer", "aside", "form"];
const EXCLUDED_SECTION_CLASSES: &[&str] = &["sidebar", "advertisement", "social-share", "comments"];

/// Fetches article pages and reduces their markup to plain text, consulting
/// the content cache first so each distinct link is fetched at most once.
pub struct Scraper {
    fetcher: PageFetcher,
    store: Arc<dyn DocumentStore>,
}

impl Scraper {
    pub fn new(fetcher: PageFetcher, store: Arc<dyn DocumentStore>) -> Self {
        Self { fetcher, store }
    }

    /// Scrape one article link. Never fails: network errors, non-200
    /// responses and store errors all degrade to a diagnostic string so the
    /// rest of the pipeline keeps going.
    pub async fn scrape(&self, link: &str) -> String {
        let cached = match self.store.cached_content(link).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Cache lookup failed for {}: {}", link, e);
                return format!("Error scraping {}: {}", link, e);
            }
        };
        if let Some(cached) = cached {
            debug!("Content cache hit: {}", link);
            return cached.content;
        }

        let html = match self.fetcher.get_text(link).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Scrape fetch failed for {}: {}", link, e);
                return format!("Error scraping {}: {}", link, e);
            }
        };

        let text = extract_text(&html);
        if text.is_empty() {
            return "No meaningful content found".to_string();
        }

        // Cache write failure is not worth losing the scrape over.
        if let Err(e) = self.store.put_cached_content(link, &text).await {
            warn!("Failed to cache content for {}: {}", link, e);
        }

        text
    }
}

/// Reduce raw markup to the article's meaningful text: locate the primary
/// content container, keep substantial paragraph/heading fragments, drop
/// chrome and boilerplate, and join what survives with blank lines.
pub fn extract_text(html: &str) -> String {
    let doc = Document::from(html);

    let container = find_container(&doc);

    let mut fragments = Vec::new();
    let paragraph_nodes: Vec<Node> = match container {
        Some(node) => collect_paragraph_nodes(&node),
        None => return String::new(),
    };

    for node in paragraph_nodes {
        if in_excluded_section(&node) {
            continue;
        }

        let mut raw = String::new();
        collect_text(&node, &mut raw);
        let trimmed = raw.trim();
        if trimmed.len() <= MIN_FRAGMENT_LEN {
            continue;
        }

        let mut text = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
        for phrase in BOILERPLATE_PHRASES {
            text = text.replace(phrase, "");
        }
        let text = text.trim().to_string();
        if !text.is_empty() {
            fragments.push(text);
        }
    }

    fragments.join("\n\n")
}

/// Try the ordered list of known content selectors, then fall back to the
/// document body.
fn find_container<'a>(doc: &'a Document) -> Option<Node<'a>> {
    if let Some(node) = doc.find(Name("article")).next() {
        return Some(node);
    }
    if let Some(node) = doc.find(Name("main")).next() {
        return Some(node);
    }
    for class in ["post-content", "entry-content", "blog-content", "article-content"] {
        if let Some(node) = doc.find(Class(class)).next() {
            return Some(node);
        }
    }
    if let Some(node) = doc.find(Attr("id", "main-content")).next() {
        return Some(node);
    }
    doc.find(Name("body")).next()
}

fn collect_paragraph_nodes<'a>(container: &Node<'a>) -> Vec<Node<'a>> {
    container
        .find(
            Name("p")
                .or(Name("h1"))
                .or(Name("h2"))
                .or(Name("h3"))
                .or(Name("h4"))
                .or(Name("h5"))
                .or(Name("h6")),
        )
        .collect()
}

/// Gather text descendants, skipping script/style and other non-content
/// elements nested inside the paragraph.
fn collect_text(node: &Node, out: &mut String) {
    for child in node.children() {
        match child.name() {
            Some(tag) if SKIPPED_TAGS.contains(&tag) => continue,
            Some(_) => collect_text(&child, out),
            None => {
                if let Some(text) = child.as_text() {
                    out.push_str(text);
                }
            }
        }
    }
}

/// A paragraph inside a nav bar, sidebar or comment section is chrome, even
/// when it is long enough to pass the length filter.
fn in_excluded_section(node: &Node) -> bool {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if let Some(tag) = ancestor.name() {
            if EXCLUDED_SECTION_TAGS.contains(&tag) {
                return true;
            }
        }
        if let Some(classes) = ancestor.attr("class") {
            if classes
                .split_whitespace()
                .any(|c| EXCLUDED_SECTION_CLASSES.contains(&c))
            {
                return true;
            }
        }
        current = ancestor.parent();
    }
    false
}
