//! Vector store integration tests
//!
//! The same behaviour is checked against every store implementation.

#[cfg(feature = "ares-vector")]
use cairn::db::VectorStoreProvider;
use cairn::db::{InMemoryVectorStore, MetadataFilter, VectorStore};
use cairn::types::{Document, SourceMetadata};

const COLLECTION: &str = "documents";

fn doc(id: &str, jurisdiction: &str, embedding: Vec<f32>) -> Document {
    Document {
        id: id.to_string(),
        content: format!("content of {}", id),
        metadata: SourceMetadata {
            url: format!("https://example.gov/{}", id),
            jurisdiction: jurisdiction.to_string(),
            title: "Section".to_string(),
            date: "Unknown".to_string(),
            last_verified: "2024-01-01T00:00:00Z".to_string(),
        },
        embedding: Some(embedding),
    }
}

async fn stores() -> Vec<Box<dyn VectorStore>> {
    #[allow(unused_mut)]
    let mut stores: Vec<Box<dyn VectorStore>> = vec![Box::new(InMemoryVectorStore::new())];

    #[cfg(feature = "ares-vector")]
    stores.push(
        VectorStoreProvider::AresVector { path: None }
            .create_store()
            .await
            .expect("Failed to create ares-vector store"),
    );

    stores
}

async fn seeded(store: &dyn VectorStore) {
    store.create_collection(COLLECTION, 3).await.unwrap();
    store
        .upsert(
            COLLECTION,
            &[
                doc("uk_a", "UK", vec![1.0, 0.0, 0.0]),
                doc("uk_b", "UK", vec![0.9, 0.1, 0.0]),
                doc("us_a", "US", vec![0.0, 1.0, 0.0]),
                doc("ca_a", "CA", vec![0.0, 0.0, 1.0]),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_search_orders_by_similarity() {
    for store in stores().await {
        seeded(store.as_ref()).await;

        let results = store
            .search(COLLECTION, &[1.0, 0.0, 0.0], 2, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 2, "{}", store.provider_name());
        assert_eq!(results[0].document.id, "uk_a");
        assert_eq!(results[1].document.id, "uk_b");
        assert!(results[0].score >= results[1].score);
        assert!(results[0].document.embedding.is_none());
    }
}

#[tokio::test]
async fn test_search_with_jurisdiction_filter() {
    for store in stores().await {
        seeded(store.as_ref()).await;

        // Query points at UK documents, but only US may be returned
        let filter = MetadataFilter::jurisdiction("US");
        let results = store
            .search(COLLECTION, &[1.0, 0.0, 0.0], 5, Some(&filter))
            .await
            .unwrap();

        assert_eq!(results.len(), 1, "{}", store.provider_name());
        assert_eq!(results[0].document.metadata.jurisdiction, "US");
    }
}

#[tokio::test]
async fn test_filter_with_no_matches() {
    for store in stores().await {
        seeded(store.as_ref()).await;

        let filter = MetadataFilter::jurisdiction("FR");
        let results = store
            .search(COLLECTION, &[1.0, 0.0, 0.0], 5, Some(&filter))
            .await
            .unwrap();
        assert!(results.is_empty(), "{}", store.provider_name());
    }
}

#[tokio::test]
async fn test_upsert_replaces_by_id() {
    for store in stores().await {
        seeded(store.as_ref()).await;

        let mut replacement = doc("us_a", "US", vec![0.0, 1.0, 0.0]);
        replacement.content = "updated".to_string();
        store.upsert(COLLECTION, &[replacement]).await.unwrap();

        assert_eq!(store.count(COLLECTION).await.unwrap(), 4);
        let stored = store.get(COLLECTION, "us_a").await.unwrap().unwrap();
        assert_eq!(stored.content, "updated");
    }
}

#[tokio::test]
async fn test_delete_and_get() {
    for store in stores().await {
        seeded(store.as_ref()).await;

        let removed = store
            .delete(COLLECTION, &["ca_a".to_string(), "nope".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1, "{}", store.provider_name());
        assert!(store.get(COLLECTION, "ca_a").await.unwrap().is_none());
        assert_eq!(store.count(COLLECTION).await.unwrap(), 3);
    }
}

#[tokio::test]
async fn test_collection_lifecycle() {
    for store in stores().await {
        assert!(!store.collection_exists(COLLECTION).await.unwrap());
        seeded(store.as_ref()).await;
        assert!(store.collection_exists(COLLECTION).await.unwrap());

        // Creating it again is an error
        assert!(store.create_collection(COLLECTION, 3).await.is_err());

        assert_eq!(store.count(COLLECTION).await.unwrap(), 4);

        store.delete_collection(COLLECTION).await.unwrap();
        assert!(!store.collection_exists(COLLECTION).await.unwrap());
    }
}

#[tokio::test]
async fn test_upsert_without_embedding_fails() {
    for store in stores().await {
        store.create_collection(COLLECTION, 3).await.unwrap();
        let mut missing = doc("x", "UK", vec![]);
        missing.embedding = None;
        assert!(store.upsert(COLLECTION, &[missing]).await.is_err());
    }
}

#[cfg(feature = "ares-vector")]
#[tokio::test]
async fn test_ares_vector_persists_across_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = Some(dir.path().join("vectors").to_string_lossy().to_string());

    {
        let store = VectorStoreProvider::AresVector { path: path.clone() }
            .create_store()
            .await
            .unwrap();
        seeded(store.as_ref()).await;
    }

    let reopened = VectorStoreProvider::AresVector { path }
        .create_store()
        .await
        .unwrap();

    assert!(reopened.collection_exists(COLLECTION).await.unwrap());
    let filter = MetadataFilter::jurisdiction("CA");
    let results = reopened
        .search(COLLECTION, &[0.0, 0.0, 1.0], 1, Some(&filter))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.content, "content of ca_a");
    assert_eq!(results[0].document.metadata.url, "https://example.gov/ca_a");
}
