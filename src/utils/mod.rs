//! Configuration utilities.

/// TOML configuration (`cairn.toml`) with hot reloading.
pub mod toml_config;
