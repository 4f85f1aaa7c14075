//! Vector Store Abstraction Layer
//!
//! This module provides a unified interface for vector database operations so
//! the RAG pipeline does not care where chunk embeddings live.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      VectorStore Trait                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  create_collection  │  search  │  upsert  │  delete  │ ... │
//! └─────────────────────────────────────────────────────────────┘
//!                 ▲                              ▲
//!                 │                              │
//!        ┌────────┴────────┐            ┌────────┴────────┐
//!        │   ares-vector   │            │    In-memory    │
//!        │ (HNSW, default) │            │ (brute force)   │
//!        └─────────────────┘            └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cairn::db::vectorstore::{MetadataFilter, VectorStore, VectorStoreProvider};
//!
//! let store = VectorStoreProvider::AresVector {
//!     path: Some("./data/vectors".into()),
//! }.create_store().await?;
//!
//! store.create_collection("documents", 384).await?;
//! store.upsert("documents", &documents).await?;
//!
//! let filter = MetadataFilter::jurisdiction("UK");
//! let results = store.search("documents", &query_embedding, 5, Some(&filter)).await?;
//! ```

use crate::types::{AppError, Document, Result, SearchResult, SourceMetadata};
use crate::utils::toml_config::RagConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Vector Store Provider Configuration
// ============================================================================

/// Configuration for vector store providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum VectorStoreProvider {
    /// AresVector - Pure Rust embedded vector database with HNSW (default).
    ///
    /// Data stored locally with optional persistence.
    #[cfg(feature = "ares-vector")]
    AresVector {
        /// Path to the data directory (None for in-memory).
        path: Option<String>,
    },

    /// In-memory vector store.
    ///
    /// Data is not persisted and will be lost when the process exits.
    InMemory,
}

impl VectorStoreProvider {
    /// Create a vector store instance from this provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing database cannot be opened.
    pub async fn create_store(&self) -> Result<Box<dyn VectorStore>> {
        match self {
            #[cfg(feature = "ares-vector")]
            VectorStoreProvider::AresVector { path } => {
                let store = super::ares_vector::AresVectorStore::new(path.clone()).await?;
                Ok(Box::new(store))
            }

            VectorStoreProvider::InMemory => {
                let store = InMemoryVectorStore::new();
                Ok(Box::new(store))
            }
        }
    }

    /// Pick the provider for the `[rag]` section.
    ///
    /// Uses ares-vector when the feature is enabled, persisting under
    /// a non-empty `vector_path`. Falls back to the in-memory store.
    pub fn from_config(config: &RagConfig) -> Self {
        #[cfg(feature = "ares-vector")]
        return VectorStoreProvider::AresVector {
            path: config
                .vector_path
                .clone()
                .filter(|p| !p.trim().is_empty()),
        };

        #[cfg(not(feature = "ares-vector"))]
        {
            let _ = config;
            VectorStoreProvider::InMemory
        }
    }
}

// ============================================================================
// Metadata Filtering
// ============================================================================

/// Exact-match restriction on chunk metadata applied during search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub jurisdiction: Option<String>,
}

impl MetadataFilter {
    pub fn jurisdiction(jurisdiction: impl Into<String>) -> Self {
        Self {
            jurisdiction: Some(jurisdiction.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.jurisdiction.is_none()
    }

    pub fn matches(&self, metadata: &SourceMetadata) -> bool {
        self.jurisdiction
            .as_deref()
            .is_none_or(|j| metadata.jurisdiction == j)
    }
}

// ============================================================================
// Vector Store Trait
// ============================================================================

/// Abstract trait for vector database operations.
///
/// # Implementors
///
/// - `AresVectorStore` - Embedded HNSW index (default)
/// - `InMemoryVectorStore` - Brute-force cosine, tests and ephemeral runs
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Get the name of this vector store provider.
    fn provider_name(&self) -> &'static str;

    /// Create a new collection with the specified vector dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection already exists or creation fails.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Check if a collection exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Upsert documents with their embeddings into a collection.
    ///
    /// Documents are identified by their `id` field. If a document with
    /// the same ID already exists, it is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if any document is missing an embedding or the
    /// collection does not exist.
    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<usize>;

    /// Search for the `limit` most similar chunks, optionally restricted by
    /// `filter`.
    ///
    /// # Returns
    ///
    /// Search results sorted by cosine similarity (descending). Returned
    /// documents do not carry their embeddings.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Delete documents by their IDs, returning how many were removed.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize>;

    /// Get a document by ID.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Count documents in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Sort by similarity, best first.
pub(crate) fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

// ============================================================================
// In-Memory Vector Store
// ============================================================================

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory vector store.
///
/// Data is not persisted and will be lost when the process exits.
/// Uses cosine similarity for vector comparisons.
pub struct InMemoryVectorStore {
    collections: Arc<RwLock<HashMap<String, InMemoryCollection>>>,
}

struct InMemoryCollection {
    dimensions: usize,
    documents: HashMap<String, Document>,
}

impl InMemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Calculate cosine similarity between two vectors.
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn provider_name(&self) -> &'static str {
        "in-memory"
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(AppError::InvalidInput(format!(
                "Collection '{}' already exists",
                name
            )));
        }
        collections.insert(
            name.to_string(),
            InMemoryCollection {
                dimensions,
                documents: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write();
        collections
            .remove(name)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", name)))?;
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let collections = self.collections.read();
        Ok(collections.contains_key(name))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read();
        let col = collections
            .get(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))?;
        Ok(col.documents.len())
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<usize> {
        let mut collections = self.collections.write();
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))?;

        let mut count = 0;
        for doc in documents {
            match &doc.embedding {
                None => {
                    return Err(AppError::InvalidInput(format!(
                        "Document '{}' is missing embedding",
                        doc.id
                    )));
                }
                Some(e) if e.len() != col.dimensions => {
                    return Err(AppError::InvalidInput(format!(
                        "Document '{}' has {} dimensions, collection expects {}",
                        doc.id,
                        e.len(),
                        col.dimensions
                    )));
                }
                Some(_) => {}
            }
            col.documents.insert(doc.id.clone(), doc.clone());
            count += 1;
        }

        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read();
        let col = collections
            .get(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))?;

        let mut results: Vec<SearchResult> = col
            .documents
            .values()
            .filter(|doc| filter.is_none_or(|f| f.matches(&doc.metadata)))
            .filter_map(|doc| {
                let doc_embedding = doc.embedding.as_ref()?;
                Some(SearchResult {
                    document: Document {
                        id: doc.id.clone(),
                        content: doc.content.clone(),
                        metadata: doc.metadata.clone(),
                        embedding: None, // Don't return embeddings in results
                    },
                    score: Self::cosine_similarity(embedding, doc_embedding),
                })
            })
            .collect();

        sort_by_score(&mut results);
        results.truncate(limit);

        Ok(results)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize> {
        let mut collections = self.collections.write();
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))?;

        let mut count = 0;
        for id in ids {
            if col.documents.remove(id).is_some() {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read();
        let col = collections
            .get(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))?;

        Ok(col.documents.get(id).cloned())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_document(
        id: &str,
        content: &str,
        jurisdiction: &str,
        embedding: Vec<f32>,
    ) -> Document {
        Document {
            id: id.to_string(),
            content: content.to_string(),
            metadata: SourceMetadata {
                url: format!("https://example.gov/{}", id),
                jurisdiction: jurisdiction.to_string(),
                title: format!("Test Doc {}", id),
                date: "Unknown".to_string(),
                last_verified: "2026-01-01T00:00:00Z".to_string(),
            },
            embedding: Some(embedding),
        }
    }

    #[tokio::test]
    async fn test_inmemory_create_collection() {
        let store = InMemoryVectorStore::new();

        store.create_collection("test", 384).await.unwrap();

        assert!(store.collection_exists("test").await.unwrap());
    }

    #[tokio::test]
    async fn test_inmemory_duplicate_collection_error() {
        let store = InMemoryVectorStore::new();

        store.create_collection("test", 384).await.unwrap();
        let result = store.create_collection("test", 384).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_inmemory_upsert_and_search() {
        let store = InMemoryVectorStore::new();
        store.create_collection("test", 3).await.unwrap();

        let doc1 = create_test_document("doc1", "Hello world", "UK", vec![1.0, 0.0, 0.0]);
        let doc2 = create_test_document("doc2", "Goodbye world", "UK", vec![0.0, 1.0, 0.0]);
        let doc3 = create_test_document("doc3", "Hello again", "USA", vec![0.9, 0.1, 0.0]);

        store.upsert("test", &[doc1, doc2, doc3]).await.unwrap();

        let results = store
            .search("test", &[1.0, 0.0, 0.0], 2, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.id, "doc1"); // Exact match first
        assert_eq!(results[1].document.id, "doc3"); // Similar second
        assert!(results[0].document.embedding.is_none());
    }

    #[tokio::test]
    async fn test_inmemory_search_with_filter() {
        let store = InMemoryVectorStore::new();
        store.create_collection("test", 3).await.unwrap();

        store
            .upsert(
                "test",
                &[
                    create_test_document("uk", "UK text", "UK", vec![1.0, 0.0, 0.0]),
                    create_test_document("usa", "USA text", "USA", vec![0.9, 0.1, 0.0]),
                ],
            )
            .await
            .unwrap();

        let filter = MetadataFilter::jurisdiction("USA");
        let results = store
            .search("test", &[1.0, 0.0, 0.0], 5, Some(&filter))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "usa");

        let filter = MetadataFilter::jurisdiction("Uzbekistan");
        let results = store
            .search("test", &[1.0, 0.0, 0.0], 5, Some(&filter))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_inmemory_upsert_replaces_same_id() {
        let store = InMemoryVectorStore::new();
        store.create_collection("test", 3).await.unwrap();

        let doc = create_test_document("doc1", "old", "UK", vec![1.0, 0.0, 0.0]);
        store.upsert("test", &[doc]).await.unwrap();
        let doc = create_test_document("doc1", "new", "UK", vec![0.0, 1.0, 0.0]);
        store.upsert("test", &[doc]).await.unwrap();

        assert_eq!(store.count("test").await.unwrap(), 1);
        let stored = store.get("test", "doc1").await.unwrap().unwrap();
        assert_eq!(stored.content, "new");
    }

    #[tokio::test]
    async fn test_inmemory_rejects_missing_or_wrong_embedding() {
        let store = InMemoryVectorStore::new();
        store.create_collection("test", 3).await.unwrap();

        let mut doc = create_test_document("doc1", "x", "UK", vec![1.0, 0.0]);
        assert!(store.upsert("test", std::slice::from_ref(&doc)).await.is_err());

        doc.embedding = None;
        assert!(store.upsert("test", &[doc]).await.is_err());
    }

    #[tokio::test]
    async fn test_inmemory_delete() {
        let store = InMemoryVectorStore::new();
        store.create_collection("test", 3).await.unwrap();

        let doc = create_test_document("doc1", "Test", "UK", vec![1.0, 0.0, 0.0]);
        store.upsert("test", &[doc]).await.unwrap();

        assert_eq!(store.count("test").await.unwrap(), 1);

        let deleted = store
            .delete("test", &["doc1".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        assert_eq!(store.count("test").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inmemory_search_missing_collection() {
        let store = InMemoryVectorStore::new();
        let result = store.search("nope", &[1.0], 5, None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_metadata_filter_matches() {
        let doc = create_test_document("d", "c", "UK", vec![]);
        assert!(MetadataFilter::default().matches(&doc.metadata));
        assert!(MetadataFilter::jurisdiction("UK").matches(&doc.metadata));
        assert!(!MetadataFilter::jurisdiction("uk").matches(&doc.metadata));
    }

    #[test]
    fn test_cosine_similarity() {
        // Identical vectors
        assert!((InMemoryVectorStore::cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);

        // Orthogonal vectors
        assert!(InMemoryVectorStore::cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);

        // Opposite vectors
        assert!((InMemoryVectorStore::cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_empty_vector_path_is_not_persisted() {
        for vector_path in [None, Some(String::new()), Some("  ".to_string())] {
            let config = RagConfig {
                vector_path,
                ..RagConfig::default()
            };
            let provider = VectorStoreProvider::from_config(&config);
            #[cfg(feature = "ares-vector")]
            assert!(matches!(provider, VectorStoreProvider::AresVector { path: None }));
            #[cfg(not(feature = "ares-vector"))]
            assert!(matches!(provider, VectorStoreProvider::InMemory));
        }
    }
}
