//! Adapter and training hyperparameters.
//!
//! [`LoraConfig`] serializes to the `adapter_config.json` layout PEFT reads,
//! so the same file drives the external trainer and [`crate::merge`].

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ADAPTER_CONFIG_FILE: &str = "adapter_config.json";
pub const TRAINING_ARGS_FILE: &str = "training_args.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraConfig {
    /// Rank of the update matrices
    #[serde(default = "default_r")]
    pub r: usize,

    #[serde(default = "default_alpha")]
    pub lora_alpha: f64,

    #[serde(default = "default_target_modules")]
    pub target_modules: Vec<String>,

    #[serde(default = "default_dropout")]
    pub lora_dropout: f64,

    #[serde(default = "default_bias")]
    pub bias: String,

    #[serde(default = "default_task_type")]
    pub task_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_model_name_or_path: Option<String>,

    #[serde(default = "default_peft_type")]
    pub peft_type: String,
}

fn default_r() -> usize {
    8
}

fn default_alpha() -> f64 {
    32.0
}

fn default_target_modules() -> Vec<String> {
    ["q_proj", "k_proj", "v_proj", "o_proj"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_dropout() -> f64 {
    0.05
}

fn default_bias() -> String {
    "none".to_string()
}

fn default_task_type() -> String {
    "CAUSAL_LM".to_string()
}

fn default_peft_type() -> String {
    "LORA".to_string()
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            r: default_r(),
            lora_alpha: default_alpha(),
            target_modules: default_target_modules(),
            lora_dropout: default_dropout(),
            bias: default_bias(),
            task_type: default_task_type(),
            base_model_name_or_path: None,
            peft_type: default_peft_type(),
        }
    }
}

impl LoraConfig {
    /// Multiplier applied to `B * A` when merging.
    pub fn scaling(&self) -> f64 {
        self.lora_alpha / self.r as f64
    }

    /// Whether `module` (a dotted weight path) ends in one of the target modules.
    pub fn targets(&self, module: &str) -> bool {
        let last = module.rsplit('.').next().unwrap_or(module);
        self.target_modules.iter().any(|t| t == last)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArgs {
    pub num_train_epochs: u32,
    pub per_device_train_batch_size: u32,
    pub learning_rate: f64,
    pub max_length: usize,
    pub logging_steps: u32,
    pub save_strategy: String,
    /// Where the trainer writes the adapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Pad id for batching; the EOS id when the tokenizer has no pad token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pad_token_id: Option<u32>,
}

impl Default for TrainingArgs {
    fn default() -> Self {
        Self {
            num_train_epochs: 1,
            per_device_train_batch_size: 4,
            learning_rate: 2e-4,
            max_length: 512,
            logging_steps: 10,
            save_strategy: "epoch".to_string(),
            output_dir: None,
            pad_token_id: None,
        }
    }
}

impl TrainingArgs {
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
