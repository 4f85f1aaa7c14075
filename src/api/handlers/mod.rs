//! API request handlers.

/// Health, ingestion, search and answer handlers.
pub mod rag;
