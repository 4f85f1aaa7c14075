//! Instruction/response datasets and their tokenized form.

use crate::{LoraError, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

const TOKENIZER_FILE: &str = "tokenizer.json";
const PAD_TOKENS: [&str; 3] = ["<pad>", "[PAD]", "<|pad|>"];
const EOS_TOKENS: [&str; 4] = ["</s>", "<|endoftext|>", "<eos>", "<|eot_id|>"];

/// One line of the training file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub instruction: String,
    pub response: String,
}

impl Example {
    /// The text the model is trained on.
    pub fn render(&self) -> String {
        format!("Instruction: {}\n\nResponse: {}", self.instruction, self.response)
    }
}

/// A tokenized training row, written one per line to `train.prepared.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedExample {
    pub text: String,
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

/// Read a JSONL dataset. Blank lines are skipped; line numbers in errors are 1-based.
pub fn read_examples(path: &Path) -> Result<Vec<Example>> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoraError::MissingFile(path.to_path_buf()),
        _ => LoraError::Io(e),
    })?;

    let mut examples = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let example = serde_json::from_str(&line).map_err(|e| LoraError::Dataset {
            line: i + 1,
            message: e.to_string(),
        })?;
        examples.push(example);
    }

    Ok(examples)
}

/// Find `tokenizer.json` for a local model directory, a tokenizer file, or a
/// Hugging Face hub id (downloaded into the hub cache).
pub fn resolve_tokenizer(base_model: &str) -> Result<PathBuf> {
    let local = Path::new(base_model);
    if local.is_file() {
        return Ok(local.to_path_buf());
    }
    if local.is_dir() {
        let path = local.join(TOKENIZER_FILE);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(LoraError::MissingFile(path))
        };
    }

    tracing::info!(repo = base_model, "Fetching tokenizer from the Hugging Face hub");
    let api = hf_hub::api::sync::Api::new().map_err(|e| LoraError::Hub(e.to_string()))?;
    api.model(base_model.to_string())
        .get(TOKENIZER_FILE)
        .map_err(|e| LoraError::Hub(format!("{}: {}", base_model, e)))
}

pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| LoraError::Tokenizer(format!("{}: {}", path.display(), e)))
}

/// Pad id for batching. Falls back to the EOS token when there is no pad token.
pub fn pad_token_id(tokenizer: &Tokenizer) -> Option<u32> {
    if let Some(padding) = tokenizer.get_padding() {
        return Some(padding.pad_id);
    }
    PAD_TOKENS
        .iter()
        .chain(EOS_TOKENS.iter())
        .find_map(|token| tokenizer.token_to_id(token))
}

/// Tokenize every example, truncating to `max_length` tokens.
pub fn tokenize(
    tokenizer: &Tokenizer,
    examples: &[Example],
    max_length: usize,
) -> Result<Vec<PreparedExample>> {
    examples
        .iter()
        .map(|example| {
            let text = example.render();
            let encoding = tokenizer
                .encode(text.as_str(), true)
                .map_err(|e| LoraError::Tokenizer(e.to_string()))?;

            let mut input_ids = encoding.get_ids().to_vec();
            let mut attention_mask = encoding.get_attention_mask().to_vec();
            input_ids.truncate(max_length);
            attention_mask.truncate(max_length);

            Ok(PreparedExample {
                text,
                input_ids,
                attention_mask,
            })
        })
        .collect()
}

pub fn write_prepared(path: &Path, rows: &[PreparedExample]) -> Result<()> {
    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::json;
    use std::path::{Path, PathBuf};

    /// A whitespace word-level tokenizer with a `</s>` token and no pad token.
    pub fn write_tokenizer(dir: &Path) -> PathBuf {
        let words = [
            "[UNK]", "</s>", "Instruction", "Response", ":", "What", "is", "a", "visa", "?",
            "A", "permit", "to", "enter", ".",
        ];
        let vocab: serde_json::Map<String, serde_json::Value> = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.to_string(), json!(i)))
            .collect();

        let tokenizer = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": null,
            "decoder": null,
            "model": {"type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]"}
        });

        let path = dir.join("tokenizer.json");
        std::fs::write(&path, tokenizer.to_string()).unwrap();
        path
    }
}
