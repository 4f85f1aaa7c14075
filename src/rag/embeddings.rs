//! Dense text embeddings for chunks and queries.
//!
//! - [`OllamaEmbedder`] - embeddings from an Ollama server (default `all-minilm`)
//! - [`FastEmbedder`] - in-process ONNX model via fastembed (feature `local-embeddings`)

use crate::types::{AppError, Result};
use crate::utils::toml_config::EmbeddingsConfig;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; the output is index-aligned with the input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("Embedding model returned no vectors".to_string()))
    }

    fn model_name(&self) -> &str;
}

// ============= Ollama =============

#[cfg(feature = "ollama")]
pub use self::ollama_embedder::OllamaEmbedder;

#[cfg(feature = "ollama")]
mod ollama_embedder {
    use super::*;
    use ollama_rs::Ollama;
    use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};

    pub struct OllamaEmbedder {
        client: Ollama,
        model: String,
    }

    impl OllamaEmbedder {
        pub fn new(base_url: &str, model: String) -> Result<Self> {
            Ok(Self {
                client: crate::llm::ollama::connect(base_url)?,
                model,
            })
        }
    }

    #[async_trait]
    impl Embedder for OllamaEmbedder {
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let request = GenerateEmbeddingsRequest::new(
                self.model.clone(),
                EmbeddingsInput::Multiple(texts.to_vec()),
            );

            let response = self
                .client
                .generate_embeddings(request)
                .await
                .map_err(|e| AppError::Embedding(format!("Ollama embedding error: {}", e)))?;

            if response.embeddings.len() != texts.len() {
                return Err(AppError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    response.embeddings.len()
                )));
            }

            Ok(response.embeddings)
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }
}

// ============= fastembed =============

#[cfg(feature = "local-embeddings")]
pub use self::local::FastEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::*;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use parking_lot::Mutex;

    /// all-MiniLM-L6-v2 running on the CPU.
    pub struct FastEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
    }

    impl FastEmbedder {
        pub fn new() -> Result<Self> {
            let model = TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(true),
            )
            .map_err(|e| AppError::Embedding(e.to_string()))?;

            Ok(Self {
                model: Arc::new(Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();

            // ONNX inference is CPU bound
            tokio::task::spawn_blocking(move || model.lock().embed(texts, None))
                .await
                .map_err(|e| AppError::Internal(format!("Embedding task failed: {}", e)))?
                .map_err(|e| AppError::Embedding(e.to_string()))
        }

        fn model_name(&self) -> &str {
            "all-MiniLM-L6-v2"
        }
    }
}

// ============= Provider =============

/// Runtime selection of the embedding backend.
#[derive(Debug, Clone)]
pub enum EmbeddingProvider {
    #[cfg(feature = "ollama")]
    Ollama { base_url: String, model: String },
    #[cfg(feature = "local-embeddings")]
    FastEmbed,
}

impl EmbeddingProvider {
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        match config {
            #[cfg(feature = "ollama")]
            EmbeddingsConfig::Ollama { base_url, model } => Ok(EmbeddingProvider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
            }),
            #[cfg(feature = "local-embeddings")]
            EmbeddingsConfig::FastEmbed => Ok(EmbeddingProvider::FastEmbed),
            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "Embedding provider {:?} not enabled. Check feature flags.",
                other
            ))),
        }
    }

    pub fn create_embedder(&self) -> Result<Arc<dyn Embedder>> {
        match self {
            #[cfg(feature = "ollama")]
            EmbeddingProvider::Ollama { base_url, model } => {
                Ok(Arc::new(OllamaEmbedder::new(base_url, model.clone())?))
            }
            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::FastEmbed => Ok(Arc::new(FastEmbedder::new()?)),
            #[allow(unreachable_patterns)]
            _ => Err(AppError::Configuration(
                "No embedding provider enabled. Check feature flags.".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl Embedder for Fixed {
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_embed_text_uses_batch() {
        assert_eq!(Fixed.embed_text("abcd").await.unwrap(), vec![4.0]);
    }

    #[cfg(feature = "ollama")]
    #[test]
    fn test_provider_from_default_config() {
        let provider = EmbeddingProvider::from_config(&EmbeddingsConfig::default()).unwrap();
        assert!(matches!(provider, EmbeddingProvider::Ollama { ref model, .. } if model == "all-minilm"));
        assert!(provider.create_embedder().is_ok());
    }
}
