//! text-generation-inference client
//!
//! Sends the rendered chat template to `POST {base_url}/generate`, the way a
//! merged fine-tuned model is usually served.

use crate::llm::client::{GenerationParams, LLMClient, Prompt};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParameters,
}

#[derive(Debug, Serialize)]
struct GenerateParameters {
    max_new_tokens: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    do_sample: bool,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    generated_text: String,
}

pub struct TgiClient {
    base_url: String,
    client: Client,
}

impl TgiClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::LLM(format!("Failed to build TGI client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl LLMClient for TgiClient {
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String> {
        let url = format!("{}/generate", self.base_url);
        let inputs = prompt.render_chat_template();

        let body = GenerateRequest {
            inputs: &inputs,
            parameters: GenerateParameters {
                max_new_tokens: params.max_new_tokens,
                temperature: params.temperature,
                top_k: params.top_k,
                top_p: params.top_p,
                do_sample: true,
                return_full_text: false,
            },
        };

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLM(format!("TGI request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(AppError::LLM(format!("TGI error ({}): {}", status, text)));
        }

        let payload: GenerateResponse = res
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Invalid TGI response: {}", e)))?;

        Ok(payload.generated_text)
    }

    fn model_name(&self) -> &str {
        "tgi"
    }
}
