//! cairn-lora CLI Entry Point
//!
//! - `cairn-lora finetune` - Tokenize a dataset, write adapter/training configs, run a trainer
//! - `cairn-lora merge` - Merge a trained adapter into the base model weights

use anyhow::{Context, Result};
use cairn_lora::{merge_adapter, prepare_run, run_trainer, LoraConfig, TrainingArgs};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "cairn-lora")]
#[command(
    version,
    about = "LoRA fine-tuning preparation and adapter merging for Cairn's answer model"
)]
#[command(long_about = r#"
Prepares instruction/response data for LoRA fine-tuning and merges trained
adapters back into the base model so it can be served by a
text-generation-inference server.

Examples:
  cairn-lora finetune --base-model TinyLlama/TinyLlama-1.1B-Chat-v1.0 \
      --dataset train.jsonl --output-dir ./adapter --trainer ./train.sh
  cairn-lora merge --base-model ./tinyllama --adapter ./adapter --output-dir ./merged
"#)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare a fine-tuning run and optionally launch the trainer
    Finetune {
        /// Local model directory or Hugging Face hub id (for the tokenizer)
        #[arg(long)]
        base_model: String,

        /// JSONL file with `instruction` and `response` per line
        #[arg(long)]
        dataset: PathBuf,

        /// Directory for the prepared data, configs and adapter
        #[arg(long, default_value = "./lora-adapter")]
        output_dir: PathBuf,

        /// Trainer executable to launch with the prepared files
        #[arg(long)]
        trainer: Option<PathBuf>,

        /// LoRA rank
        #[arg(long, default_value = "8")]
        r: usize,

        /// LoRA alpha
        #[arg(long, default_value = "32")]
        alpha: f64,

        #[arg(long, default_value = "1")]
        epochs: u32,

        #[arg(long, default_value = "4")]
        batch_size: u32,

        #[arg(long, default_value = "0.0002")]
        learning_rate: f64,

        /// Maximum tokens per example
        #[arg(long, default_value = "512")]
        max_length: usize,
    },

    /// Merge an adapter into the base weights
    Merge {
        /// Base model directory (model.safetensors or a sharded index)
        #[arg(long)]
        base_model: PathBuf,

        /// Adapter directory (adapter_model.safetensors + adapter_config.json)
        #[arg(long)]
        adapter: PathBuf,

        /// Where to write the merged model
        #[arg(long, default_value = "./merged-model")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "cairn_lora={0},trainer={0}",
                default_level
            ))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Finetune {
            base_model,
            dataset,
            output_dir,
            trainer,
            r,
            alpha,
            epochs,
            batch_size,
            learning_rate,
            max_length,
        } => {
            anyhow::ensure!(r > 0, "--r must be greater than 0");

            let lora = LoraConfig {
                r,
                lora_alpha: alpha,
                ..LoraConfig::default()
            };
            let args = TrainingArgs {
                num_train_epochs: epochs,
                per_device_train_batch_size: batch_size,
                learning_rate,
                max_length,
                ..TrainingArgs::default()
            };

            let prepared = tokio::task::spawn_blocking(move || {
                prepare_run(&base_model, &dataset, &output_dir, &lora, &args)
            })
            .await
            .context("Preparation task panicked")?
            .context("Failed to prepare fine-tuning run")?;

            println!(
                "{} {} examples prepared in {}",
                "✓".green().bold(),
                prepared.examples,
                prepared.output_dir.display()
            );

            match trainer {
                Some(trainer) => {
                    run_trainer(&trainer, &prepared)
                        .await
                        .context("Training failed")?;
                    println!("{} Adapter written to {}", "✓".green().bold(), prepared.output_dir.display());
                }
                None => println!(
                    "  {} pass --trainer to launch training with these files",
                    "→".dimmed()
                ),
            }
        }

        Commands::Merge {
            base_model,
            adapter,
            output_dir,
        } => {
            let report = tokio::task::spawn_blocking(move || {
                merge_adapter(&base_model, &adapter, &output_dir).map(|r| (r, output_dir))
            })
            .await
            .context("Merge task panicked")?
            .context("Failed to merge adapter")?;

            let (report, output_dir) = report;
            println!(
                "{} Merged {} tensors (scaling {}) into {} shard(s) at {}",
                "✓".green().bold(),
                report.merged,
                report.scaling,
                report.shards.len(),
                output_dir.display()
            );
        }
    }

    Ok(())
}
