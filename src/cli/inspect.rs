//! `config` and `audit` subcommand output.

use crate::audit::AuditEntry;
use crate::cli::output::Output;
use crate::utils::toml_config::{CairnConfig, EmbeddingsConfig, LlmConfig};

pub fn describe_llm(llm: &LlmConfig) -> String {
    match llm {
        LlmConfig::Ollama { base_url, model } => format!("ollama {} @ {}", model, base_url),
        LlmConfig::Tgi { base_url } => format!("tgi @ {}", base_url),
    }
}

pub fn describe_embeddings(embeddings: &EmbeddingsConfig) -> String {
    match embeddings {
        EmbeddingsConfig::Ollama { base_url, model } => format!("ollama {} @ {}", model, base_url),
        EmbeddingsConfig::FastEmbed => "fastembed (all-MiniLM-L6-v2)".to_string(),
    }
}

/// Print the effective configuration.
pub fn print_config(config: &CairnConfig, output: &Output) {
    output.header("Configuration");

    output.subheader("Server");
    output.kv("bind", &config.bind_address());
    output.kv("log", &format!("{} ({})", config.server.log_level, config.server.log_format));

    output.subheader("Retrieval");
    output.kv(
        "chunking",
        &format!("{} chars, {} overlap", config.rag.chunk_size, config.rag.chunk_overlap),
    );
    output.kv("top_k", &config.rag.top_k.to_string());
    output.kv("collection", &config.rag.collection);
    output.kv(
        "vectors",
        config.rag.vector_path.as_deref().unwrap_or("in-memory"),
    );
    output.kv("embeddings", &describe_embeddings(&config.embeddings));

    output.subheader("Generation");
    output.kv("llm", &describe_llm(&config.llm));
    output.kv(
        "sampling",
        &format!(
            "max_new_tokens={} temperature={} top_k={} top_p={}",
            config.generation.max_new_tokens,
            config.generation.temperature,
            config.generation.top_k,
            config.generation.top_p
        ),
    );

    output.subheader("Cache");
    if config.cache.enabled {
        let ttl = config
            .cache
            .ttl_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "none".to_string());
        output.kv("capacity", &config.cache.capacity.to_string());
        output.kv("ttl", &ttl);
    } else {
        output.kv("enabled", "false");
    }

    output.subheader("Audit");
    output.kv("enabled", &config.audit.enabled.to_string());
    output.kv("path", &config.audit.path.display().to_string());

    output.subheader(&format!("Sources ({})", config.sources.len()));
    for source in &config.sources {
        output.list_item(&format!("[{}] {} - {}", source.jurisdiction, source.title, source.url));
    }
}

/// One line per audit entry.
pub fn format_entry(entry: &AuditEntry) -> String {
    format!(
        "{} {:<7} {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.action,
        entry.details
    )
}

pub fn print_audit(entries: &[AuditEntry], output: &Output) {
    output.header(&format!("Audit log ({} entries)", entries.len()));
    if entries.is_empty() {
        output.info("No entries recorded yet");
        return;
    }
    for entry in entries {
        output.list_item(&format_entry(entry));
    }
}
