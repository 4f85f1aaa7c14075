//! Fine-tuning preparation and trainer launch.
//!
//! Gradient descent happens in an external trainer process. This module
//! produces everything it needs in one directory and runs it:
//!
//! ```text
//! <output_dir>/
//!   train.prepared.jsonl   tokenized rows (input_ids, attention_mask)
//!   adapter_config.json    LoRA hyperparameters (PEFT layout)
//!   training_args.json     epochs, batch size, learning rate, ...
//! ```
//!
//! The trainer is invoked as
//! `<trainer> --base-model M --dataset D --adapter-config A --training-args T --output-dir O`.

use crate::config::{LoraConfig, TrainingArgs, ADAPTER_CONFIG_FILE, TRAINING_ARGS_FILE};
use crate::dataset::{load_tokenizer, pad_token_id, read_examples, resolve_tokenizer, tokenize, write_prepared};
use crate::{LoraError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

pub const PREPARED_DATASET_FILE: &str = "train.prepared.jsonl";

/// Paths written by [`prepare_run`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRun {
    pub base_model: String,
    pub output_dir: PathBuf,
    pub dataset: PathBuf,
    pub adapter_config: PathBuf,
    pub training_args: PathBuf,
    pub examples: usize,
}

/// Tokenize `dataset` for `base_model` and write the run files into `output_dir`.
pub fn prepare_run(
    base_model: &str,
    dataset: &Path,
    output_dir: &Path,
    lora: &LoraConfig,
    args: &TrainingArgs,
) -> Result<PreparedRun> {
    let examples = read_examples(dataset)?;
    if examples.is_empty() {
        return Err(LoraError::EmptyDataset(dataset.to_path_buf()));
    }

    let tokenizer = load_tokenizer(&resolve_tokenizer(base_model)?)?;
    let rows = tokenize(&tokenizer, &examples, args.max_length)?;

    std::fs::create_dir_all(output_dir)?;

    let prepared = output_dir.join(PREPARED_DATASET_FILE);
    write_prepared(&prepared, &rows)?;

    let adapter_config = output_dir.join(ADAPTER_CONFIG_FILE);
    LoraConfig {
        base_model_name_or_path: Some(base_model.to_string()),
        ..lora.clone()
    }
    .save(&adapter_config)?;

    let training_args = output_dir.join(TRAINING_ARGS_FILE);
    TrainingArgs {
        output_dir: Some(output_dir.display().to_string()),
        pad_token_id: pad_token_id(&tokenizer),
        ..args.clone()
    }
    .save(&training_args)?;

    let truncated = rows.iter().filter(|r| r.input_ids.len() == args.max_length).count();
    tracing::info!(
        examples = rows.len(),
        truncated,
        max_length = args.max_length,
        path = %prepared.display(),
        "Prepared training data"
    );

    Ok(PreparedRun {
        base_model: base_model.to_string(),
        output_dir: output_dir.to_path_buf(),
        dataset: prepared,
        adapter_config,
        training_args,
        examples: rows.len(),
    })
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, is_stderr: bool) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            tracing::warn!(target: "trainer", "{}", line);
        } else {
            tracing::info!(target: "trainer", "{}", line);
        }
    }
}

/// Run the external trainer on a prepared run, streaming its output into the log.
pub async fn run_trainer(trainer: &Path, run: &PreparedRun) -> Result<()> {
    tracing::info!(trainer = %trainer.display(), "Launching trainer");

    let mut child = Command::new(trainer)
        .arg("--base-model")
        .arg(&run.base_model)
        .arg("--dataset")
        .arg(&run.dataset)
        .arg("--adapter-config")
        .arg(&run.adapter_config)
        .arg("--training-args")
        .arg(&run.training_args)
        .arg("--output-dir")
        .arg(&run.output_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| LoraError::Trainer(format!("failed to start {}: {}", trainer.display(), e)))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (_, _, status) = tokio::join!(
        async {
            if let Some(out) = stdout {
                forward_lines(out, false).await;
            }
        },
        async {
            if let Some(err) = stderr {
                forward_lines(err, true).await;
            }
        },
        child.wait()
    );

    let status = status?;
    if !status.success() {
        return Err(LoraError::Trainer(format!("{} exited with {}", trainer.display(), status)));
    }

    tracing::info!("Trainer finished");
    Ok(())
}
