use crate::AppState;
use crate::api::{docs::ApiDoc, handlers::rag};
use axum::{
    Json, Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use utoipa::OpenApi;

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(rag::health))
        .route("/ingest", post(rag::ingest))
        .route("/search", post(rag::search))
        .route("/answer", post(rag::answer))
        .route("/cache/stats", get(rag::cache_stats))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
