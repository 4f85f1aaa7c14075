//! Vector stores for chunk embeddings.
//!
//! - `ares-vector` (default) - Pure Rust embedded HNSW vector database
//! - in-memory - brute-force cosine similarity, for tests and throwaway runs
//!
//! Enable providers via Cargo features:
//! ```toml
//! cairn-server = { version = "*", features = ["ares-vector"] }
//! ```

#![allow(missing_docs)]

// Vector store abstraction layer
pub mod vectorstore;

#[cfg(feature = "ares-vector")]
pub mod ares_vector;

pub use vectorstore::{InMemoryVectorStore, MetadataFilter, VectorStore, VectorStoreProvider};

#[cfg(feature = "ares-vector")]
pub use ares_vector::AresVectorStore;
