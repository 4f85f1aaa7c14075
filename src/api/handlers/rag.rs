//! RAG API handlers.
//!
//! Provides endpoints for:
//! - Page ingestion (scrape, chunk, embed, store)
//! - Similarity search over stored chunks
//! - Cited answers generated from retrieved context

use crate::{
    rag::cache::CacheStats,
    types::{
        AnswerRequest, AnswerResponse, HealthResponse, IngestRequest, IngestResponse, Result,
        SearchHit, SearchRequest,
    },
    AppState,
};
use axum::{extract::State, Json};

// ============================================================================
// Health
// ============================================================================

/// Liveness check.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Cairn RAG backend is running".to_string(),
        status: "healthy".to_string(),
    })
}

// ============================================================================
// Ingest Endpoint
// ============================================================================

/// Scrape a page and index its text.
///
/// Re-ingesting the same jurisdiction and section title overwrites the
/// previous chunks.
#[utoipa::path(
    post,
    path = "/ingest",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Page ingested successfully", body = IngestResponse),
        (status = 400, description = "Page could not be scraped"),
        (status = 500, description = "Internal server error")
    ),
    tag = "rag"
)]
pub async fn ingest(
    State(state): State<AppState>,
    Json(payload): Json<IngestRequest>,
) -> Result<Json<IngestResponse>> {
    let chunks = state.pipeline.ingest(&payload).await?;
    Ok(Json(IngestResponse::success(chunks)))
}

// ============================================================================
// Search Endpoint
// ============================================================================

/// Nearest chunks to a query.
#[utoipa::path(
    post,
    path = "/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Matching chunks, closest first", body = [SearchHit]),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    ),
    tag = "rag"
)]
pub async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<Vec<SearchHit>>> {
    let hits = state.pipeline.search(&payload).await?;
    Ok(Json(hits))
}

// ============================================================================
// Answer Endpoint
// ============================================================================

/// Answer a question from indexed sources.
///
/// Citation `[n]` in the answer refers to `citations[n - 1]`.
#[utoipa::path(
    post,
    path = "/answer",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Generated answer with citations", body = AnswerResponse),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Model or store failure")
    ),
    tag = "rag"
)]
pub async fn answer(
    State(state): State<AppState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>> {
    let response = state.pipeline.answer(&payload).await?;
    Ok(Json(response))
}

// ============================================================================
// Cache Statistics
// ============================================================================

/// Response cache counters.
#[utoipa::path(
    get,
    path = "/cache/stats",
    responses(
        (status = 200, description = "Cache statistics", body = CacheStats)
    ),
    tag = "rag"
)]
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.pipeline.cache_stats())
}
