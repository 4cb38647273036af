//! Web page loading.
//!
//! Each configured URL is fetched once with the configured User-Agent and
//! timeout, then reduced to plain text with `scraper`. A page that cannot
//! be fetched is logged and skipped; it never aborts loading.

use anyhow::{bail, Context, Result};
use scraper::{Html, Node, Selector};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SourcesConfig;
use crate::models::{Document, Metadata};

/// Elements whose text never reaches the index.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

pub struct WebLoader {
    client: reqwest::Client,
}

impl WebLoader {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.effective_user_agent())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    /// Fetch one page as a Document with `source` and `title` metadata.
    pub async fn fetch(&self, url: &str) -> Result<Document> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!("timed out fetching {}", url)
            } else {
                anyhow::anyhow!("request to {} failed: {}", url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {} for {}", status.as_u16(), url);
        }

        let html = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok(html_to_document(url, &html))
    }

    /// Fetch every URL in order, skipping the ones that fail.
    pub async fn load_all(&self, urls: &[String]) -> Vec<Document> {
        let mut docs = Vec::with_capacity(urls.len());
        for url in urls {
            match self.fetch(url).await {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!(url = %url, error = %e, "Skipping web source"),
            }
        }
        docs
    }
}

/// Reduce an HTML page to a Document.
pub fn html_to_document(url: &str, html: &str) -> Document {
    let page = Html::parse_document(html);
    let mut metadata = Metadata::new();
    metadata.insert("source".into(), json!(url));
    if let Some(title) = extract_title(&page) {
        metadata.insert("title".into(), json!(title));
    }
    Document::new(extract_body_text(&page), metadata)
}

fn extract_title(page: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    page.select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Text of `<body>` (or the whole document), one trimmed line per text node.
fn extract_body_text(page: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|s| page.select(&s).next())
        .unwrap_or_else(|| page.root_element());

    let mut lines = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| SKIPPED_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if skipped {
            continue;
        }
        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}
