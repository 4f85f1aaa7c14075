//! Tests for LLM client implementations
//!
//! These tests verify provider selection and the TGI client against a mocked
//! `/generate` endpoint.

use cairn::llm::{GenerationParams, LLMClient, Prompt, Provider, ASSISTANT_MARKER};
use cairn::rag::context::{build_prompt, extract_answer};
use cairn::types::AppError;
use cairn::utils::toml_config::LlmConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_provider_from_tgi_config() {
    let provider = Provider::from_config(&LlmConfig::Tgi {
        base_url: "http://localhost:8080".to_string(),
    })
    .unwrap();

    match &provider {
        Provider::Tgi { base_url } => assert_eq!(base_url, "http://localhost:8080"),
        #[allow(unreachable_patterns)]
        _ => panic!("Expected TGI provider"),
    }
    assert_eq!(provider.name(), "TGI");
}

#[cfg(feature = "ollama")]
#[test]
fn test_provider_from_default_config_is_ollama() {
    let provider = Provider::from_config(&LlmConfig::default()).unwrap();
    assert_eq!(provider.name(), "Ollama");

    let client = provider.create_client().unwrap();
    assert_eq!(client.model_name(), "tinyllama");
}

#[tokio::test]
async fn test_tgi_generate_sends_chat_template() {
    let mock_server = MockServer::start().await;
    let prompt = Prompt::new("You are concise.", "How long is a visitor visa?");

    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_partial_json(json!({
            "inputs": prompt.render_chat_template(),
            "parameters": {
                "max_new_tokens": 256,
                "top_k": 50,
                "do_sample": true,
                "return_full_text": false
            }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"generated_text": "Up to 6 months [1]."})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Provider::Tgi {
        base_url: format!("{}/", mock_server.uri()),
    }
    .create_client()
    .unwrap();

    let text = client
        .generate(&prompt, &GenerationParams::default())
        .await
        .unwrap();

    assert_eq!(text, "Up to 6 months [1].");
    assert_eq!(client.model_name(), "tgi");
}

#[tokio::test]
async fn test_tgi_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .mount(&mock_server)
        .await;

    let client = Provider::Tgi {
        base_url: mock_server.uri(),
    }
    .create_client()
    .unwrap();

    let err = client
        .generate(&Prompt::new("s", "u"), &GenerationParams::default())
        .await
        .unwrap_err();

    match err {
        AppError::LLM(msg) => {
            assert!(msg.contains("503"));
            assert!(msg.contains("model loading"));
        }
        other => panic!("Expected LLM error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tgi_echoed_prompt_is_stripped() {
    let mock_server = MockServer::start().await;
    let prompt = build_prompt("Persona.", "[1] Text (Source: http://x)", "Question?");
    let echoed = format!("{}Answer [1].", prompt.render_chat_template());

    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"generated_text": echoed})))
        .mount(&mock_server)
        .await;

    let client = Provider::Tgi {
        base_url: mock_server.uri(),
    }
    .create_client()
    .unwrap();

    let text = client
        .generate(&prompt, &GenerationParams::default())
        .await
        .unwrap();

    assert!(text.contains(ASSISTANT_MARKER));
    assert_eq!(extract_answer(&text), "Answer [1].");
}
