//! Fetch a web page and reduce it to readable text.

use std::time::Duration;

use reqwest::Client;
use scraper::Html;

use crate::types::{AppError, Result};
use crate::utils::toml_config::ScraperConfig;

/// Elements whose text never reaches the output
const SKIPPED_ELEMENTS: [&str; 2] = ["script", "style"];

pub struct PageScraper {
    client: Client,
}

impl PageScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// GET `url` and return its cleaned text.
    ///
    /// Network failures and non-2xx responses are `Scrape` errors.
    pub async fn scrape(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Scrape(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Scrape(format!("{} returned {}", url, status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::Scrape(format!("Failed to read body of {}: {}", url, e)))?;

        let text = extract_text(&html);
        tracing::debug!(url = %url, bytes = html.len(), chars = text.chars().count(), "Scraped page");
        Ok(text)
    }
}

/// Visible text of an HTML document.
///
/// Text inside `<script>` and `<style>` is dropped. The remaining text is
/// split into lines, each line into phrases on double spaces, and the
/// trimmed non-empty phrases are joined with newlines.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut raw = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            raw.push_str(text);
        }
    }

    clean_text(&raw)
}

fn clean_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|phrase| !phrase.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
