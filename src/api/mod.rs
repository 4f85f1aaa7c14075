//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for Cairn, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//! - [`api::docs`](crate::api::docs) - OpenAPI document
//!
//! # API Endpoints
//!
//! - `GET /` - Health check
//! - `POST /ingest` - Scrape and index a page
//! - `POST /search` - Nearest chunks to a query (bare JSON array)
//! - `POST /answer` - Cited answer generated from retrieved chunks
//! - `GET /cache/stats` - Response cache counters
//! - `GET /api-docs/openapi.json` - OpenAPI document
//!
//! Errors are returned as `{"detail": "<message>"}`.

/// OpenAPI document.
pub mod docs;
/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
