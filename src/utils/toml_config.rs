//! TOML-based configuration for Cairn
//!
//! This module provides declarative configuration for the server, the RAG
//! pipeline, model providers, the response cache and the audit log via a TOML
//! file (`cairn.toml`).
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use `CairnConfigManager` for thread-safe access to the current configuration.
//! Request-time settings (generation parameters, persona, retrieval depth) are
//! picked up immediately; components built at startup (vector store, cache
//! capacity, providers) keep the values they were created with.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Root configuration structure loaded from cairn.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CairnConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Chunking and retrieval settings
    #[serde(default)]
    pub rag: RagConfig,

    /// Embedding provider
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    /// Answer generation provider
    #[serde(default)]
    pub llm: LlmConfig,

    /// Sampling parameters used for every answer
    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Sources re-ingested by `cairn-server refresh`
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============= RAG Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of chunks retrieved as context for `/answer`
    #[serde(default = "default_answer_top_k")]
    pub top_k: usize,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Directory for the embedded vector store (`""` for in-memory)
    #[serde(default = "default_vector_path")]
    pub vector_path: Option<String>,

    /// Opening line of the system prompt
    #[serde(default = "default_persona")]
    pub persona: String,
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_answer_top_k() -> usize {
    5
}

fn default_collection() -> String {
    "documents".to_string()
}

fn default_vector_path() -> Option<String> {
    Some("./data/vectors".to_string())
}

fn default_persona() -> String {
    "You are a careful research assistant.".to_string()
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_answer_top_k(),
            collection: default_collection(),
            vector_path: default_vector_path(),
            persona: default_persona(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmbeddingsConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default = "default_embedding_model")]
        model: String,
    },
    /// In-process ONNX model (requires the `local-embeddings` feature)
    FastEmbed,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        EmbeddingsConfig::Ollama {
            base_url: default_ollama_url(),
            model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LlmConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default = "default_llm_model")]
        model: String,
    },
    /// text-generation-inference server, e.g. one serving a merged LoRA model
    Tgi { base_url: String },
}

fn default_llm_model() -> String {
    "tinyllama".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig::Ollama {
            base_url: default_ollama_url(),
            model: default_llm_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_sampling_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_max_new_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.7
}

fn default_sampling_top_k() -> u32 {
    50
}

fn default_top_p() -> f32 {
    0.95
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            top_k: default_sampling_top_k(),
            top_p: default_top_p(),
        }
    }
}

// ============= Cache / Audit / Scraper =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of cached answers
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Optional expiry for cached answers
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    100
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
            ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("audit_log.jsonl")
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_audit_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36"
        .to_string()
}

fn default_scrape_timeout() -> u64 {
    15
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_scrape_timeout(),
        }
    }
}

/// A page that `refresh` re-ingests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    pub jurisdiction: String,
    pub title: String,
    #[serde(default)]
    pub effective_date: Option<String>,
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' has an invalid value")]
    InvalidEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl CairnConfig {
    /// Load configuration from a TOML file, apply environment overrides and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config: CairnConfig = toml::from_str(&content)?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise start from defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        warn!(path = %path.display(), "Config file not found, using defaults");
        let mut config = CairnConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override a few deployment settings from the environment
    /// (`CAIRN_HOST`, `CAIRN_PORT`, `CAIRN_OLLAMA_URL`).
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("CAIRN_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("CAIRN_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar("CAIRN_PORT".to_string()))?;
        }
        if let Ok(url) = std::env::var("CAIRN_OLLAMA_URL") {
            if let EmbeddingsConfig::Ollama { base_url, .. } = &mut self.embeddings {
                *base_url = url.clone();
            }
            if let LlmConfig::Ollama { base_url, .. } = &mut self.llm {
                *base_url = url;
            }
        }
        Ok(())
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "rag.top_k must be greater than 0".to_string(),
            ));
        }
        if self.rag.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "rag.collection must not be empty".to_string(),
            ));
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache.capacity must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.generation.top_p) {
            return Err(ConfigError::ValidationError(format!(
                "generation.top_p must be within [0, 1], got {}",
                self.generation.top_p
            )));
        }
        if self.generation.temperature < 0.0 {
            return Err(ConfigError::ValidationError(
                "generation.temperature must not be negative".to_string(),
            ));
        }
        if self.scraper.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "scraper.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if let LlmConfig::Tgi { base_url } = &self.llm {
            if base_url.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "llm.base_url is required for the tgi provider".to_string(),
                ));
            }
        }

        for (i, source) in self.sources.iter().enumerate() {
            if source.url.trim().is_empty() || source.jurisdiction.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "sources[{}] needs both url and jurisdiction",
                    i
                )));
            }
        }

        Ok(())
    }

    /// Socket address string for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// ============= Hot Reloading Configuration Manager =============

const DEBOUNCE_MS: u64 = 150;

/// Whether a watcher event on the config's directory concerns the config file.
fn touches_config(event: &Event, config_path: &Path) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some() && p.file_name() == config_path.file_name())
}

/// Thread-safe configuration manager with hot reloading support
pub struct CairnConfigManager {
    config: Arc<ArcSwap<CairnConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
    reload_tx: Option<mpsc::UnboundedSender<()>>,
}

impl CairnConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Convert to absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = CairnConfig::load_or_default(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
            reload_tx: None,
        })
    }

    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: CairnConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("cairn.toml"),
            watcher: RwLock::new(None),
            reload_tx: None,
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<CairnConfig> {
        self.config.load_full()
    }

    /// Path of the file backing this manager
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Replace the configuration in place (validated first)
    pub fn store(&self, config: CairnConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config.store(Arc::new(config));
        Ok(())
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = CairnConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&mut self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        self.reload_tx = Some(tx.clone());

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);

        let watched_path = self.config_path.clone();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    // The directory also holds other files (audit log, data)
                    if touches_config(&event, &watched_path) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Watch the config file's parent directory
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let settle = Duration::from_millis(DEBOUNCE_MS);

            while rx.recv().await.is_some() {
                // Let the write finish, then fold the burst of events into
                // one reload of the latest contents
                tokio::time::sleep(settle).await;
                while rx.try_recv().is_ok() {}

                match CairnConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for CairnConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
            reload_tx: self.reload_tx.clone(),
        }
    }
}
