//! Re-ingest configured sources through a running backend.
//!
//! Each `[[sources]]` entry is posted to `{backend}/ingest` in order. A failing
//! source is reported and skipped; the rest still run.

use crate::cli::output::Output;
use crate::types::{IngestRequest, IngestResponse};
use crate::utils::toml_config::SourceConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Ingestion can include a scrape and an embedding batch.
const INGEST_TIMEOUT: Duration = Duration::from_secs(300);

/// What happened to a single source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Ingested { url: String, chunks: usize },
    Failed { url: String, reason: String },
}

/// Totals for a refresh run.
#[derive(Debug, Default, Clone)]
pub struct RefreshReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl RefreshReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SourceOutcome::Ingested { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn total_chunks(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                SourceOutcome::Ingested { chunks, .. } => *chunks,
                SourceOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

impl From<&SourceConfig> for IngestRequest {
    fn from(source: &SourceConfig) -> Self {
        IngestRequest {
            url: source.url.clone(),
            jurisdiction: source.jurisdiction.clone(),
            section_title: source.title.clone(),
            effective_date: source.effective_date.clone(),
        }
    }
}

/// Posts configured sources to a backend's `/ingest` endpoint.
pub struct Refresher {
    client: reqwest::Client,
    backend_url: String,
}

impl Refresher {
    pub fn new(backend_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(INGEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            backend_url: backend_url.trim_end_matches('/').to_string(),
        })
    }

    async fn ingest_one(&self, source: &SourceConfig) -> std::result::Result<usize, String> {
        let response = self
            .client
            .post(format!("{}/ingest", self.backend_url))
            .json(&IngestRequest::from(source))
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = match response.json::<ErrorBody>().await {
                Ok(body) => body.detail,
                Err(_) => status.to_string(),
            };
            return Err(format!("{} ({})", reason, status.as_u16()));
        }

        response
            .json::<IngestResponse>()
            .await
            .map(|body| body.chunks_ingested)
            .map_err(|e| format!("unexpected response: {}", e))
    }

    /// Ingest every source, printing one line per source.
    pub async fn run(&self, sources: &[SourceConfig], output: &Output) -> RefreshReport {
        let mut report = RefreshReport::default();

        for (i, source) in sources.iter().enumerate() {
            output.step(i + 1, sources.len(), &format!("{} ({})", source.title, source.url));

            let outcome = match self.ingest_one(source).await {
                Ok(chunks) => {
                    output.success(&format!("{} chunks ingested", chunks));
                    SourceOutcome::Ingested {
                        url: source.url.clone(),
                        chunks,
                    }
                }
                Err(reason) => {
                    tracing::warn!(url = %source.url, %reason, "source refresh failed");
                    output.error(&reason);
                    SourceOutcome::Failed {
                        url: source.url.clone(),
                        reason,
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(url: &str, title: &str) -> SourceConfig {
        SourceConfig {
            url: url.to_string(),
            jurisdiction: "US".to_string(),
            title: title.to_string(),
            effective_date: None,
        }
    }

    #[test]
    fn test_source_maps_title_to_section_title() {
        let mut src = source("https://example.gov/a", "Visas");
        src.effective_date = Some("2024-01-01".to_string());
        let req = IngestRequest::from(&src);
        assert_eq!(req.section_title, "Visas");
        assert_eq!(req.effective_date.as_deref(), Some("2024-01-01"));
    }

    #[tokio::test]
    async fn test_refresh_continues_past_failures() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ingest"))
            .and(body_partial_json(json!({"url": "https://example.gov/good"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "chunks_ingested": 4})),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/ingest"))
            .and(body_partial_json(json!({"url": "https://example.gov/bad"})))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"detail": "Failed to scrape content from URL"})),
            )
            .mount(&server)
            .await;

        let refresher = Refresher::new(&format!("{}/", server.uri())).unwrap();
        let sources = vec![
            source("https://example.gov/bad", "Bad"),
            source("https://example.gov/good", "Good"),
        ];

        let report = refresher.run(&sources, &Output::no_color()).await;

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total_chunks(), 4);
        match &report.outcomes[0] {
            SourceOutcome::Failed { reason, .. } => {
                assert!(reason.contains("Failed to scrape content from URL"));
                assert!(reason.contains("400"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_unreachable_backend() {
        let refresher = Refresher::new("http://127.0.0.1:9").unwrap();
        let report = refresher
            .run(&[source("https://example.gov/a", "A")], &Output::no_color())
            .await;
        assert_eq!(report.failed(), 1);
    }
}
