//! # cairn-lora - adapter tooling for Cairn's answer model
//!
//! Two jobs around a causal language model served to Cairn through TGI:
//!
//! - **finetune**: turn an instruction/response JSONL file into tokenized
//!   training rows, write a PEFT-compatible `adapter_config.json` plus the
//!   training arguments, and optionally hand them to an external trainer
//! - **merge**: fold a trained LoRA adapter back into the base weights
//!   (`W + scaling * B * A`) and write a standalone model directory
//!
//! ## Quick Start
//!
//! ```bash
//! # Prepare data and launch a trainer
//! cairn-lora finetune --base-model TinyLlama/TinyLlama-1.1B-Chat-v1.0 \
//!     --dataset train.jsonl --output-dir ./adapter --trainer ./train.sh
//!
//! # Merge the adapter into the base model
//! cairn-lora merge --base-model ./tinyllama --adapter ./adapter --output-dir ./merged
//! ```

pub mod config;
pub mod dataset;
pub mod merge;
pub mod train;

pub use config::{LoraConfig, TrainingArgs};
pub use dataset::{Example, PreparedExample};
pub use merge::{merge_adapter, MergeReport};
pub use train::{prepare_run, run_trainer, PreparedRun};

use std::path::PathBuf;

/// Error types for cairn-lora
#[derive(Debug, thiserror::Error)]
pub enum LoraError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Model download failed: {0}")]
    Hub(String),

    #[error("Dataset line {line}: {message}")]
    Dataset { line: usize, message: String },

    #[error("Dataset {} has no examples", .0.display())]
    EmptyDataset(PathBuf),

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Missing file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Trainer failed: {0}")]
    Trainer(String),
}

/// Result type alias for cairn-lora operations
pub type Result<T> = std::result::Result<T, LoraError>;
