//! # Cairn - cited answers from scraped sources
//!
//! A small retrieval augmented generation server: it scrapes web pages,
//! chunks and embeds them into a vector index, and answers questions with a
//! local language model, citing the chunks it was given.
//!
//! ## Overview
//!
//! Cairn can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `cairn-server` binary
//! 2. **As a library** - Build a [`RagPipeline`] with your own backends
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use cairn::{build_state, create_app, CairnConfigManager};
//! use std::sync::Arc;
//!
//! let config_manager = Arc::new(CairnConfigManager::new("cairn.toml")?);
//! let state = build_state(config_manager).await?;
//! let app = create_app(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, app).await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama chat and embeddings (default) |
//! | `ares-vector` | Embedded HNSW vector store (default) |
//! | `local-embeddings` | In-process fastembed embeddings |
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`audit`] - Append-only JSONL audit log
//! - [`cli`] - Command line parsing and output
//! - [`db`] - Vector stores
//! - [`llm`] - LLM client implementations
//! - [`rag`] - Scraping, chunking, embeddings, context, cache and the pipeline
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration with hot reload

#![cfg_attr(docsrs, feature(doc_cfg))]

/// HTTP API handlers and routes.
pub mod api;
/// Append-only audit trail.
pub mod audit;
/// Command line interface.
pub mod cli;
/// Vector stores.
pub mod db;
/// LLM provider clients and abstractions.
pub mod llm;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use llm::{GenerationParams, LLMClient, Prompt, Provider};
pub use rag::{Backends, RagPipeline};
pub use types::{AppError, Result};
pub use utils::toml_config::{CairnConfig, CairnConfigManager};

use axum::Router;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config_manager: Arc<CairnConfigManager>,
    /// Ingestion and answer pipeline
    pub pipeline: Arc<RagPipeline>,
}

/// Build the state for the configured backends.
pub async fn build_state(config_manager: Arc<CairnConfigManager>) -> Result<AppState> {
    let pipeline = RagPipeline::from_config((*config_manager).clone()).await?;
    Ok(AppState {
        config_manager,
        pipeline: Arc::new(pipeline),
    })
}

/// The HTTP application with all routes and layers.
pub fn create_app(state: AppState) -> Router {
    api::routes::create_router().with_state(state)
}
