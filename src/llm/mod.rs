//! LLM Provider Clients and Abstractions
//!
//! Answer generation sits behind the [`LLMClient`] trait so the pipeline can
//! run against Ollama, a text-generation-inference server, or a test double.
//!
//! # Supported Providers
//!
//! - `ollama` (feature, default) - Local Ollama server
//! - TGI - Any text-generation-inference compatible `/generate` endpoint
//!
//! # Example
//!
//! ```ignore
//! use cairn::llm::{GenerationParams, Prompt, Provider};
//!
//! let client = Provider::from_config(&config.llm)?.create_client()?;
//! let prompt = Prompt::new("You are concise.", "What is 2+2?");
//! let text = client.generate(&prompt, &GenerationParams::default()).await?;
//! ```

/// Core LLM client trait, prompt template and sampling parameters.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

pub mod tgi;

pub use client::{GenerationParams, LLMClient, Prompt, Provider, ASSISTANT_MARKER};
