use crate::api::handlers::rag;
use crate::rag::cache::CacheStats;
use crate::types::{
    AnswerRequest, AnswerResponse, HealthResponse, IngestRequest, IngestResponse, SearchHit,
    SearchRequest, SourceMetadata,
};
use utoipa::OpenApi;

/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(title = "Cairn", description = "Retrieval augmented answers with citations"),
    paths(rag::health, rag::ingest, rag::search, rag::answer, rag::cache_stats),
    components(schemas(
        IngestRequest,
        IngestResponse,
        SearchRequest,
        SearchHit,
        AnswerRequest,
        AnswerResponse,
        HealthResponse,
        SourceMetadata,
        CacheStats
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "rag", description = "Ingestion, retrieval and answers")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_all_paths() {
        let doc = ApiDoc::openapi();
        for path in ["/", "/ingest", "/search", "/answer", "/cache/stats"] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
