//! AresVector - Pure Rust Vector Store Implementation
//!
//! This module provides the default vector store, backed by the embedded
//! HNSW index from the `ares-vector` crate.
//!
//! # Persistence
//!
//! When a path is configured the HNSW index is written with
//! `VectorDb::persist`, and the chunk text plus its source metadata are kept
//! next to it in `documents.json`. Both are reloaded on startup.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = AresVectorStore::new(Some("./data/vectors".into())).await?;
//! store.create_collection("documents", 384).await?;
//! store.upsert("documents", &docs).await?;
//! let results = store.search("documents", &embedding, 5, None).await?;
//! ```

use crate::types::{AppError, Document, Result, SearchResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::vectorstore::{sort_by_score, MetadataFilter, VectorStore};
use ares_vector::types::MetadataValue;
use ares_vector::{Config, DistanceMetric, VectorDb, VectorMetadata};

const DOCUMENTS_FILE: &str = "documents.json";
const DOCUMENTS_TMP_FILE: &str = "documents.json.tmp";

// ============================================================================
// AresVector Store Implementation
// ============================================================================

/// Pure Rust vector store using the HNSW algorithm.
pub struct AresVectorStore {
    /// The underlying vector database (VectorDb is Clone and uses Arc internally)
    db: VectorDb,
    /// Storage path (None for in-memory)
    path: Option<PathBuf>,
    /// Chunk text and metadata per collection, keyed by document id
    documents: Arc<RwLock<HashMap<String, HashMap<String, Document>>>>,
    /// Held for a whole persist so the newest snapshot is the last one written
    persist_lock: Mutex<()>,
}

impl AresVectorStore {
    /// Create a new AresVector store.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to persist data. If None, operates in-memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized or loaded.
    pub async fn new(path: Option<String>) -> Result<Self> {
        let path_buf = path.map(PathBuf::from);

        let config = if let Some(ref p) = path_buf {
            Config::persistent(p.clone())
        } else {
            Config::memory()
        };

        let db = VectorDb::open(config).await.map_err(|e| {
            AppError::Configuration(format!("Failed to initialize AresVector: {}", e))
        })?;

        let store = Self {
            db,
            path: path_buf,
            documents: Arc::new(RwLock::new(HashMap::new())),
            persist_lock: Mutex::new(()),
        };

        if let Some(ref path) = store.path {
            store.load_documents(path).await?;
        }

        tracing::info!(
            persistent = store.path.is_some(),
            collections = store.db.list_collections().len(),
            "AresVector store opened"
        );

        Ok(store)
    }

    /// Load document metadata from disk.
    async fn load_documents(&self, path: &Path) -> Result<()> {
        let docs_path = path.join(DOCUMENTS_FILE);
        if docs_path.exists() {
            let data = tokio::fs::read_to_string(&docs_path).await.map_err(|e| {
                AppError::Configuration(format!("Failed to read documents file: {}", e))
            })?;

            let loaded: HashMap<String, HashMap<String, Document>> = serde_json::from_str(&data)
                .map_err(|e| {
                    AppError::Configuration(format!("Failed to parse documents file: {}", e))
                })?;

            let mut docs = self.documents.write();
            *docs = loaded;
        }
        Ok(())
    }

    /// Write the index and the document map to disk (no-op in memory).
    async fn persist(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let _guard = self.persist_lock.lock().await;

        // Snapshot under the persist lock; the map lock is not held across await
        let data = {
            let docs = self.documents.read();
            serde_json::to_string_pretty(&*docs)
                .map_err(|e| AppError::Internal(format!("Failed to serialize documents: {}", e)))?
        };

        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create data directory: {}", e)))?;

        // Write then rename, so a crash never leaves a truncated file
        let tmp = path.join(DOCUMENTS_TMP_FILE);
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write documents file: {}", e)))?;
        tokio::fs::rename(&tmp, path.join(DOCUMENTS_FILE))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to replace documents file: {}", e)))?;

        self.db
            .persist()
            .await
            .map_err(|e| AppError::Database(format!("Failed to persist vector index: {}", e)))?;

        Ok(())
    }

    fn to_vector_metadata(doc: &Document) -> VectorMetadata {
        VectorMetadata::from_pairs([
            ("url", MetadataValue::String(doc.metadata.url.clone())),
            (
                "jurisdiction",
                MetadataValue::String(doc.metadata.jurisdiction.clone()),
            ),
            ("title", MetadataValue::String(doc.metadata.title.clone())),
        ])
    }
}

#[async_trait]
impl VectorStore for AresVectorStore {
    fn provider_name(&self) -> &'static str {
        "ares-vector"
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        if self.db.collection_exists(name) {
            return Err(AppError::InvalidInput(format!(
                "Collection '{}' already exists",
                name
            )));
        }

        self.db
            .create_collection(name, dimensions, DistanceMetric::Cosine)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create collection: {}", e)))?;

        self.documents
            .write()
            .entry(name.to_string())
            .or_default();

        tracing::info!(collection = %name, dimensions, "Created collection");
        self.persist().await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.db
            .delete_collection(name)
            .await
            .map_err(|_| AppError::NotFound(format!("Collection '{}' not found", name)))?;

        self.documents.write().remove(name);

        self.persist().await
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.db.collection_exists(name))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.db
            .count(collection)
            .map_err(|_| AppError::NotFound(format!("Collection '{}' not found", collection)))
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        if !self.db.collection_exists(collection) {
            return Err(AppError::NotFound(format!(
                "Collection '{}' not found",
                collection
            )));
        }

        let mut upserted = 0;

        for doc in documents {
            let embedding = doc.embedding.as_ref().ok_or_else(|| {
                AppError::InvalidInput(format!("Document '{}' is missing embedding", doc.id))
            })?;

            // Insert replaces an existing vector with the same id
            self.db
                .insert(collection, &doc.id, embedding, Some(Self::to_vector_metadata(doc)))
                .await
                .map_err(|e| AppError::Database(format!("Failed to insert vector: {}", e)))?;

            // The text lives in the side map; drop the embedding to keep the file small
            let stored = Document {
                embedding: None,
                ..doc.clone()
            };
            self.documents
                .write()
                .entry(collection.to_string())
                .or_default()
                .insert(doc.id.clone(), stored);

            upserted += 1;
        }

        self.persist().await?;

        Ok(upserted)
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let filter = filter.filter(|f| !f.is_empty());

        // A filtered search ranks the whole collection, then filters
        let fetch = match filter {
            Some(_) => self
                .db
                .count(collection)
                .map_err(|_| AppError::NotFound(format!("Collection '{}' not found", collection)))?,
            None => limit,
        };
        if fetch == 0 || limit == 0 {
            return Ok(Vec::new());
        }

        let vector_results = self
            .db
            .search(collection, embedding, fetch)
            .await
            .map_err(|e| AppError::Database(format!("Search failed: {}", e)))?;

        let docs = self.documents.read();
        let collection_docs = docs
            .get(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))?;

        let mut results: Vec<SearchResult> = vector_results
            .into_iter()
            .filter_map(|result| {
                let doc = collection_docs.get(&result.id)?;
                if filter.is_some_and(|f| !f.matches(&doc.metadata)) {
                    return None;
                }
                Some(SearchResult {
                    document: doc.clone(),
                    score: result.score,
                })
            })
            .collect();

        sort_by_score(&mut results);
        results.truncate(limit);

        Ok(results)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut deleted = 0;

        for id in ids {
            if let Ok(true) = self.db.delete(collection, id).await {
                let mut docs = self.documents.write();
                if let Some(collection_docs) = docs.get_mut(collection) {
                    if collection_docs.remove(id).is_some() {
                        deleted += 1;
                    }
                }
            }
        }

        self.persist().await?;

        Ok(deleted)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let docs = self.documents.read();

        let collection_docs = docs
            .get(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))?;

        Ok(collection_docs.get(id).cloned())
    }
}
