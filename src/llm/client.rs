//! LLM Client abstractions and provider management
//!
//! This module provides a unified interface for answer generation:
//! - **Ollama**: Local inference through the Ollama chat API
//! - **TGI**: A text-generation-inference server, typically serving a merged
//!   LoRA model produced by `cairn-lora`

use crate::types::Result;
use crate::utils::toml_config::{GenerationConfig, LlmConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling parameters for a single generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            temperature: 0.7,
            top_k: 50,
            top_p: 0.95,
        }
    }
}

impl From<&GenerationConfig> for GenerationParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
        }
    }
}

/// A system instruction plus the user's turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Marker that opens the assistant's turn in the chat template
pub const ASSISTANT_MARKER: &str = "<|assistant|>\n";

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Render the Zephyr-style chat template used by TinyLlama chat models.
    pub fn render_chat_template(&self) -> String {
        format!(
            "<|system|>\n{}</s>\n<|user|>\n{}</s>\n{}",
            self.system, self.user, ASSISTANT_MARKER
        )
    }
}

/// Generic LLM client trait for provider abstraction
///
/// All LLM providers implement this trait, allowing for easy swapping
/// between providers without changing application code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate the assistant's reply to `prompt`
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "tinyllama".to_string(),
    /// };
    /// ```
    #[cfg(feature = "ollama")]
    Ollama { base_url: String, model: String },

    /// text-generation-inference server
    Tgi { base_url: String },
}

impl Provider {
    /// Map the `[llm]` config section to a provider
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match config {
            #[cfg(feature = "ollama")]
            LlmConfig::Ollama { base_url, model } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
            }),
            #[cfg(not(feature = "ollama"))]
            LlmConfig::Ollama { .. } => Err(crate::types::AppError::Configuration(
                "Ollama provider requires the 'ollama' feature".to_string(),
            )),
            LlmConfig::Tgi { base_url } => Ok(Provider::Tgi {
                base_url: base_url.clone(),
            }),
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url, model.clone())?,
            )),

            Provider::Tgi { base_url } => {
                Ok(Box::new(super::tgi::TgiClient::new(base_url.clone())?))
            }
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "ollama")]
            Provider::Ollama { .. } => "Ollama",
            Provider::Tgi { .. } => "TGI",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_template() {
        let prompt = Prompt::new("Be brief.", "What is a visa?");
        assert_eq!(
            prompt.render_chat_template(),
            "<|system|>\nBe brief.</s>\n<|user|>\nWhat is a visa?</s>\n<|assistant|>\n"
        );
    }

    #[test]
    fn test_params_from_config() {
        let config = GenerationConfig {
            max_new_tokens: 64,
            ..Default::default()
        };
        let params = GenerationParams::from(&config);
        assert_eq!(params.max_new_tokens, 64);
        assert_eq!(params.top_k, 50);
        assert_eq!(GenerationParams::from(&GenerationConfig::default()), GenerationParams::default());
    }

    #[test]
    fn test_provider_from_config() {
        let provider = Provider::from_config(&LlmConfig::Tgi {
            base_url: "http://localhost:8080".to_string(),
        })
        .unwrap();
        assert_eq!(provider.name(), "TGI");
        assert!(provider.create_client().is_ok());
    }
}
