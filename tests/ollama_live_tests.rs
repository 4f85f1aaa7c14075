//! Live tests against a running Ollama server
//!
//! These are ignored by default. Run them with:
//!
//! ```bash
//! OLLAMA_URL=http://localhost:11434 cargo test --test ollama_live_tests -- --ignored
//! ```
//!
//! The server needs the `tinyllama` and `all-minilm` models pulled
//! (override with `OLLAMA_MODEL` / `OLLAMA_EMBED_MODEL`).

#![cfg(feature = "ollama")]

use cairn::llm::ollama::OllamaClient;
use cairn::llm::{GenerationParams, LLMClient};
use cairn::rag::context::{build_prompt, extract_answer};
use cairn::rag::embeddings::{Embedder, OllamaEmbedder};

fn ollama_url() -> String {
    std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
}

fn chat_model() -> String {
    std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "tinyllama".to_string())
}

fn embed_model() -> String {
    std::env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| "all-minilm".to_string())
}

#[tokio::test]
#[ignore = "requires a running Ollama server"]
async fn test_live_generate_answer() {
    let client = OllamaClient::new(&ollama_url(), chat_model()).unwrap();
    let prompt = build_prompt(
        "You are a careful research assistant.",
        "[1] Standard visitors can stay in the UK for up to 6 months. (Source: https://www.gov.uk/standard-visitor)",
        "How long can a standard visitor stay in the UK?",
    );

    let params = GenerationParams {
        max_new_tokens: 64,
        temperature: 0.1,
        ..GenerationParams::default()
    };
    let generated = client.generate(&prompt, &params).await.unwrap();
    let answer = extract_answer(&generated);

    println!("answer: {}", answer);
    assert!(!answer.is_empty());
}

#[tokio::test]
#[ignore = "requires a running Ollama server"]
async fn test_live_embeddings_are_consistent() {
    let embedder = OllamaEmbedder::new(&ollama_url(), embed_model()).unwrap();
    let texts = vec![
        "Skilled Worker visa requirements".to_string(),
        "Skilled Worker visa requirements".to_string(),
        "Opening hours of the embassy".to_string(),
    ];

    let vectors = embedder.embed_texts(&texts).await.unwrap();
    assert_eq!(vectors.len(), 3);
    assert!(!vectors[0].is_empty());
    assert_eq!(vectors[0].len(), vectors[2].len());

    let same: f32 = vectors[0].iter().zip(&vectors[1]).map(|(a, b)| (a - b).abs()).sum();
    assert!(same < 1e-3);
}
