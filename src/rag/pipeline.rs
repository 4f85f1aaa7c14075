//! Request/answer orchestration.
//!
//! ```text
//! ingest:  scrape → chunk → embed (one batch) → upsert → audit → clear cache
//! search:  embed query → vector search (jurisdiction filter) → hits
//! answer:  cache? → search → context + prompt → generate → audit → cache
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::instrument;

use crate::audit::{actions, AuditLog};
use crate::db::{MetadataFilter, VectorStore, VectorStoreProvider};
use crate::llm::{GenerationParams, LLMClient, Provider};
use crate::rag::cache::{answer_key, CacheStats, ResponseCache};
use crate::rag::chunker::{chunk_id, TextChunker};
use crate::rag::context::{build_context, build_prompt, citations, extract_answer, NO_CONTEXT_ANSWER};
use crate::rag::embeddings::{Embedder, EmbeddingProvider};
use crate::rag::scraper::PageScraper;
use crate::types::{
    AnswerRequest, AnswerResponse, AppError, Document, IngestRequest, Result, SearchHit,
    SearchRequest, SearchResult, SourceMetadata,
};
use crate::utils::toml_config::CairnConfigManager;

/// Message of the 400 returned when a page yields no text.
pub const SCRAPE_FAILED: &str = "Failed to scrape content from URL";

pub struct RagPipeline {
    config: CairnConfigManager,
    scraper: PageScraper,
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LLMClient>,
    cache: ResponseCache,
    audit: AuditLog,
    collection: String,
}

/// The swappable model and storage backends of a pipeline.
pub struct Backends {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LLMClient>,
}

impl Backends {
    /// Create the backends named by the configuration.
    pub async fn from_config(config: &CairnConfigManager) -> Result<Self> {
        let cfg = config.config();

        let embedder = EmbeddingProvider::from_config(&cfg.embeddings)?.create_embedder()?;
        let store: Arc<dyn VectorStore> = VectorStoreProvider::from_config(&cfg.rag)
            .create_store()
            .await?
            .into();
        let provider = Provider::from_config(&cfg.llm)?;
        let llm: Arc<dyn LLMClient> = provider.create_client()?.into();

        tracing::info!(
            embedder = embedder.model_name(),
            store = store.provider_name(),
            llm = provider.name(),
            model = llm.model_name(),
            "Backends ready"
        );

        Ok(Self { embedder, store, llm })
    }
}

impl RagPipeline {
    /// Assemble a pipeline around the given backends; the remaining pieces
    /// (scraper, chunker, cache, audit log) come from the configuration.
    pub fn new(config: CairnConfigManager, backends: Backends) -> Result<Self> {
        let cfg = config.config();

        Ok(Self {
            scraper: PageScraper::new(&cfg.scraper)?,
            chunker: TextChunker::new(cfg.rag.chunk_size, cfg.rag.chunk_overlap)?,
            embedder: backends.embedder,
            store: backends.store,
            llm: backends.llm,
            cache: ResponseCache::new(&cfg.cache)?,
            audit: AuditLog::from_config(&cfg.audit),
            collection: cfg.rag.collection.clone(),
            config,
        })
    }

    pub async fn from_config(config: CairnConfigManager) -> Result<Self> {
        let backends = Backends::from_config(&config).await?;
        Self::new(config, backends)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Scrape a page, chunk, embed and store it. Returns the number of chunks.
    #[instrument(skip(self, request), fields(url = %request.url, jurisdiction = %request.jurisdiction))]
    pub async fn ingest(&self, request: &IngestRequest) -> Result<usize> {
        let start = Instant::now();

        let text = match self.scraper.scrape(&request.url).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!("Page contained no text");
                return Err(AppError::Scrape(SCRAPE_FAILED.to_string()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Scrape failed");
                return Err(AppError::Scrape(SCRAPE_FAILED.to_string()));
            }
        };

        let chunks = self.chunker.chunk(&text);
        let embeddings = self.embedder.embed_texts(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(AppError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        if let Some(first) = embeddings.first() {
            self.ensure_collection(first.len()).await?;
        }

        let metadata = SourceMetadata::verified_now(request);
        let documents: Vec<Document> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (content, embedding))| Document {
                id: chunk_id(&request.jurisdiction, &request.section_title, i),
                content,
                metadata: metadata.clone(),
                embedding: Some(embedding),
            })
            .collect();

        let count = self.store.upsert(&self.collection, &documents).await?;
        let removed = self
            .remove_stale_chunks(&request.jurisdiction, &request.section_title, count)
            .await?;

        self.audit
            .record(
                actions::INGEST,
                json!({
                    "url": request.url,
                    "jurisdiction": request.jurisdiction,
                    "chunks": count,
                }),
            )
            .await?;

        // Cached answers may cite the text that was just replaced
        self.cache.clear();

        tracing::info!(
            chunks = count,
            removed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Ingested page"
        );

        Ok(count)
    }

    /// Nearest chunks to `request.query`, optionally within one jurisdiction.
    #[instrument(skip(self, request), fields(top_k = request.top_k))]
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let results = self
            .retrieve(&request.query, request.jurisdiction.as_deref(), request.top_k)
            .await?;
        Ok(results.into_iter().map(SearchResult::into_hit).collect())
    }

    /// Answer a question from retrieved context, with citations.
    #[instrument(skip(self, request), fields(jurisdiction = ?request.jurisdiction))]
    pub async fn answer(&self, request: &AnswerRequest) -> Result<AnswerResponse> {
        let start = Instant::now();
        validate_query(&request.query)?;
        let jurisdiction = normalize_jurisdiction(request.jurisdiction.as_deref());

        let key = answer_key(jurisdiction, &request.query);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("Answer served from cache");
            return Ok(cached);
        }

        // Answers computed across a refresh must not be cached
        let generation = self.cache.generation();

        // Request-time settings follow the live config
        let cfg = self.config.config();
        let results = self
            .retrieve(&request.query, jurisdiction, cfg.rag.top_k)
            .await?;

        if results.is_empty() {
            tracing::info!("No context found");
            return Ok(AnswerResponse {
                answer: NO_CONTEXT_ANSWER.to_string(),
                citations: Vec::new(),
            });
        }

        let context = build_context(&results);
        let prompt = build_prompt(&cfg.rag.persona, &context, &request.query);
        let params = GenerationParams::from(&cfg.generation);

        let generated = self.llm.generate(&prompt, &params).await?;
        let response = AnswerResponse {
            answer: extract_answer(&generated),
            citations: citations(&results),
        };

        self.audit
            .record(
                actions::ANSWER,
                json!({
                    "query": request.query,
                    "jurisdiction": jurisdiction,
                    "num_citations": response.citations.len(),
                }),
            )
            .await?;

        if !self.cache.put_if_current(key, response.clone(), generation) {
            tracing::debug!("Sources refreshed during generation; answer not cached");
        }

        tracing::info!(
            citations = response.citations.len(),
            model = self.llm.model_name(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Answer generated"
        );

        Ok(response)
    }

    async fn retrieve(
        &self,
        query: &str,
        jurisdiction: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        validate_query(query)?;
        if top_k == 0 {
            return Err(AppError::InvalidInput(
                "top_k must be greater than 0".to_string(),
            ));
        }

        // Nothing ingested yet
        if !self.store.collection_exists(&self.collection).await? {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_text(query).await?;
        let filter = normalize_jurisdiction(jurisdiction).map(MetadataFilter::jurisdiction);

        let results = self
            .store
            .search(&self.collection, &embedding, top_k, filter.as_ref())
            .await?;

        tracing::debug!(results = results.len(), "Retrieved chunks");
        Ok(results)
    }

    /// Delete chunks of a section beyond `keep`, left over from a longer
    /// previous version of the page.
    async fn remove_stale_chunks(
        &self,
        jurisdiction: &str,
        section_title: &str,
        keep: usize,
    ) -> Result<usize> {
        let mut stale = Vec::new();
        for index in keep.. {
            let id = chunk_id(jurisdiction, section_title, index);
            if self.store.get(&self.collection, &id).await?.is_none() {
                break;
            }
            stale.push(id);
        }

        if stale.is_empty() {
            return Ok(0);
        }
        self.store.delete(&self.collection, &stale).await
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        if self.store.collection_exists(&self.collection).await? {
            return Ok(());
        }

        match self.store.create_collection(&self.collection, dimensions).await {
            Ok(()) => Ok(()),
            // A concurrent ingest may have created it in the meantime
            Err(_) if self.store.collection_exists(&self.collection).await? => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(AppError::InvalidInput("query must not be empty".to_string()));
    }
    Ok(())
}

/// An empty jurisdiction means "no filter".
fn normalize_jurisdiction(jurisdiction: Option<&str>) -> Option<&str> {
    jurisdiction.filter(|j| !j.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_jurisdiction() {
        assert_eq!(normalize_jurisdiction(Some("UK")), Some("UK"));
        assert_eq!(normalize_jurisdiction(Some("  ")), None);
        assert_eq!(normalize_jurisdiction(None), None);
    }

    #[test]
    fn test_validate_query() {
        assert!(validate_query("visa").is_ok());
        assert!(matches!(validate_query(" \n"), Err(AppError::InvalidInput(_))));
    }
}
