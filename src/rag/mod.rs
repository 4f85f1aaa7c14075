//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! # Module Structure
//!
//! - [`rag::scraper`](crate::rag::scraper) - Fetch pages and extract visible text
//! - [`rag::chunker`](crate::rag::chunker) - Fixed-stride character chunking
//! - [`rag::embeddings`](crate::rag::embeddings) - Embedding models (Ollama, fastembed)
//! - [`rag::context`](crate::rag::context) - Context assembly, prompt and citations
//! - [`rag::cache`](crate::rag::cache) - LRU cache of generated answers
//! - [`rag::pipeline`](crate::rag::pipeline) - Orchestration of the above
//!
//! # RAG Pipeline
//!
//! 1. **Ingestion** - Pages are scraped, chunked and embedded
//! 2. **Storage** - Embeddings stored in the vector database with source metadata
//! 3. **Retrieval** - Query embedded, nearest chunks retrieved (optionally per jurisdiction)
//! 4. **Generation** - LLM answers from the numbered context, citing `[n]`
//!
//! # Example
//!
//! ```ignore
//! use cairn::rag::pipeline::RagPipeline;
//! use cairn::types::{AnswerRequest, IngestRequest};
//!
//! let pipeline = RagPipeline::from_config(config_manager).await?;
//! pipeline.ingest(&IngestRequest { /* ... */ }).await?;
//! let answer = pipeline.answer(&AnswerRequest {
//!     query: "How long can I stay?".into(),
//!     jurisdiction: Some("UK".into()),
//! }).await?;
//! ```

pub mod cache;
pub mod chunker;
pub mod context;
pub mod embeddings;
pub mod pipeline;
pub mod scraper;

pub use pipeline::{Backends, RagPipeline};
