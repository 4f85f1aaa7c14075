use crate::llm::client::{GenerationParams, LLMClient, Prompt};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
    models::ModelOptions,
};
use reqwest::Url;

const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Build an ollama-rs handle from a base URL such as `http://localhost:11434`.
///
/// A missing port falls back to Ollama's default rather than the scheme's.
pub(crate) fn connect(base_url: &str) -> Result<Ollama> {
    let (host, port) = split_base_url(base_url)?;
    Ok(Ollama::new(host, port))
}

fn split_base_url(base_url: &str) -> Result<(String, u16)> {
    let url = Url::parse(base_url)
        .map_err(|e| AppError::Configuration(format!("Invalid Ollama URL '{}': {}", base_url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| AppError::Configuration(format!("Ollama URL '{}' has no host", base_url)))?;

    Ok((
        format!("{}://{}", url.scheme(), host),
        url.port().unwrap_or(DEFAULT_OLLAMA_PORT),
    ))
}

pub struct OllamaClient {
    client: Ollama,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: String) -> Result<Self> {
        Ok(Self {
            client: connect(base_url)?,
            model,
        })
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String> {
        let messages = vec![
            ChatMessage::system(prompt.system.clone()),
            ChatMessage::user(prompt.user.clone()),
        ];

        let options = ModelOptions::default()
            .temperature(params.temperature)
            .top_k(params.top_k)
            .top_p(params.top_p)
            .num_predict(params.max_new_tokens as i32);

        let request = ChatMessageRequest::new(self.model.clone(), messages).options(options);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_parsing_full() {
        let (host, port) = split_base_url("http://localhost:11434").unwrap();
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn test_url_parsing_no_port() {
        let (host, port) = split_base_url("http://localhost").unwrap();
        assert_eq!(host, "http://localhost");
        assert_eq!(port, DEFAULT_OLLAMA_PORT);
    }

    #[test]
    fn test_url_parsing_custom_port() {
        let (host, port) = split_base_url("https://192.168.1.100:8080/").unwrap();
        assert_eq!(host, "https://192.168.1.100");
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_url_parsing_invalid() {
        assert!(matches!(
            split_base_url("not a url"),
            Err(AppError::Configuration(_))
        ));
    }
}
