//! Fold a LoRA adapter into its base model.
//!
//! For every adapted module `W ← W + scaling · (B · A)`, computed in f32 and
//! cast back to the base tensor's dtype. The output directory is a complete
//! model: merged weight shards under their original names plus the config,
//! index and tokenizer files of the base model.

use crate::config::{LoraConfig, ADAPTER_CONFIG_FILE};
use crate::{LoraError, Result};
use candle_core::{safetensors, DType, Device, Tensor};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

pub const ADAPTER_WEIGHTS_FILE: &str = "adapter_model.safetensors";
const SINGLE_WEIGHTS_FILE: &str = "model.safetensors";
const INDEX_FILE: &str = "model.safetensors.index.json";
const ADAPTER_PREFIX: &str = "base_model.model.";

/// Files carried over from the base model unchanged.
const COPIED_FILES: [&str; 7] = [
    "config.json",
    "generation_config.json",
    INDEX_FILE,
    "tokenizer.json",
    "tokenizer_config.json",
    "special_tokens_map.json",
    "tokenizer.model",
];

#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    /// Base tensors that received an update
    pub merged: usize,
    /// Weight files written, in order
    pub shards: Vec<String>,
    pub scaling: f64,
}

#[derive(Debug)]
pub(crate) struct LoraPair {
    pub a: Tensor,
    pub b: Tensor,
}

#[derive(Deserialize)]
struct ShardIndex {
    weight_map: HashMap<String, String>,
}

enum BaseLayout {
    Single,
    Sharded(HashMap<String, String>),
}

impl BaseLayout {
    fn detect(base_dir: &Path) -> Result<Self> {
        let index_path = base_dir.join(INDEX_FILE);
        if index_path.is_file() {
            let index: ShardIndex = serde_json::from_str(&std::fs::read_to_string(&index_path)?)?;
            return Ok(BaseLayout::Sharded(index.weight_map));
        }
        if base_dir.join(SINGLE_WEIGHTS_FILE).is_file() {
            return Ok(BaseLayout::Single);
        }
        Err(LoraError::MissingFile(base_dir.join(SINGLE_WEIGHTS_FILE)))
    }

    fn shard_files(&self) -> Vec<String> {
        match self {
            BaseLayout::Single => vec![SINGLE_WEIGHTS_FILE.to_string()],
            BaseLayout::Sharded(map) => map
                .values()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }
}

/// Base weight name for an adapter tensor, and which half of the pair it is.
///
/// `base_model.model.<module>.lora_A.weight` → (`<module>.weight`, `'A'`)
pub(crate) fn parse_adapter_key(key: &str) -> Option<(String, char)> {
    let key = key.strip_prefix(ADAPTER_PREFIX).unwrap_or(key);
    for (suffix, half) in [
        (".lora_A.weight", 'A'),
        (".lora_B.weight", 'B'),
        (".lora_A.default.weight", 'A'),
        (".lora_B.default.weight", 'B'),
    ] {
        if let Some(module) = key.strip_suffix(suffix) {
            return Some((format!("{}.weight", module), half));
        }
    }
    None
}

/// Group adapter tensors into A/B pairs keyed by base weight name.
pub(crate) fn adapter_pairs(tensors: HashMap<String, Tensor>) -> Result<BTreeMap<String, LoraPair>> {
    let mut halves: BTreeMap<String, (Option<Tensor>, Option<Tensor>)> = BTreeMap::new();

    for (key, tensor) in tensors {
        match parse_adapter_key(&key) {
            Some((base_key, 'A')) => halves.entry(base_key).or_default().0 = Some(tensor),
            Some((base_key, _)) => halves.entry(base_key).or_default().1 = Some(tensor),
            None => tracing::debug!(key = %key, "Ignoring non-LoRA adapter tensor"),
        }
    }

    halves
        .into_iter()
        .map(|(base_key, halves)| match halves {
            (Some(a), Some(b)) => Ok((base_key, LoraPair { a, b })),
            _ => Err(LoraError::Adapter(format!(
                "Incomplete lora_A/lora_B pair for {}",
                base_key
            ))),
        })
        .collect()
}

pub(crate) fn merge_weight(weight: &Tensor, pair: &LoraPair, scaling: f64) -> Result<Tensor> {
    let dtype = weight.dtype();
    let a = pair.a.to_dtype(DType::F32)?;
    let b = pair.b.to_dtype(DType::F32)?;
    let delta = b.matmul(&a)?.affine(scaling, 0.0)?;

    if delta.dims() != weight.dims() {
        return Err(LoraError::Adapter(format!(
            "B·A has shape {:?} but the base weight has {:?}",
            delta.dims(),
            weight.dims()
        )));
    }

    Ok(weight.to_dtype(DType::F32)?.add(&delta)?.to_dtype(dtype)?)
}

fn missing_base(pairs: &BTreeMap<String, LoraPair>, present: impl Fn(&str) -> bool) -> Result<()> {
    let missing: Vec<&str> = pairs
        .keys()
        .map(String::as_str)
        .filter(|key| !present(*key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoraError::Adapter(format!(
            "No base tensor for adapter modules: {}",
            missing.join(", ")
        )))
    }
}

/// Merge the adapter in `adapter_dir` into the model in `base_dir`, writing
/// the result to `output_dir`.
pub fn merge_adapter(base_dir: &Path, adapter_dir: &Path, output_dir: &Path) -> Result<MergeReport> {
    let config_path = adapter_dir.join(ADAPTER_CONFIG_FILE);
    if !config_path.is_file() {
        return Err(LoraError::MissingFile(config_path));
    }
    let config = LoraConfig::load(&config_path)?;
    let scaling = config.scaling();

    let weights_path = adapter_dir.join(ADAPTER_WEIGHTS_FILE);
    if !weights_path.is_file() {
        return Err(LoraError::MissingFile(weights_path));
    }

    let device = Device::Cpu;
    let pairs = adapter_pairs(safetensors::load(&weights_path, &device)?)?;
    if pairs.is_empty() {
        return Err(LoraError::Adapter(format!(
            "{} contains no LoRA weights",
            weights_path.display()
        )));
    }
    for key in pairs.keys() {
        let module = key.strip_suffix(".weight").unwrap_or(key);
        if !config.targets(module) {
            tracing::warn!(module, "Adapter module is not in target_modules");
        }
    }

    let layout = BaseLayout::detect(base_dir)?;
    if let BaseLayout::Sharded(weight_map) = &layout {
        missing_base(&pairs, |key| weight_map.contains_key(key))?;
    }

    tracing::info!(
        modules = pairs.len(),
        scaling,
        r = config.r,
        "Merging adapter"
    );

    std::fs::create_dir_all(output_dir)?;

    let mut merged = 0;
    let shards = layout.shard_files();
    for shard in &shards {
        let mut tensors = safetensors::load(base_dir.join(shard), &device)?;
        if matches!(layout, BaseLayout::Single) {
            missing_base(&pairs, |key| tensors.contains_key(key))?;
        }

        for (key, pair) in &pairs {
            if let Some(weight) = tensors.get(key) {
                let updated = merge_weight(weight, pair, scaling)?;
                tensors.insert(key.clone(), updated);
                merged += 1;
            }
        }

        safetensors::save(&tensors, output_dir.join(shard))?;
        tracing::info!(shard = %shard, tensors = tensors.len(), "Wrote merged shard");
    }

    for file in COPIED_FILES {
        let source = base_dir.join(file);
        if source.is_file() {
            std::fs::copy(&source, output_dir.join(file))?;
        }
    }

    Ok(MergeReport {
        merged,
        shards,
        scaling,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("base_model.model.model.layers.0.self_attn.q_proj.lora_A.weight", "model.layers.0.self_attn.q_proj.weight", 'A')]
    #[case("base_model.model.model.layers.3.self_attn.v_proj.lora_B.weight", "model.layers.3.self_attn.v_proj.weight", 'B')]
    #[case("base_model.model.layers.1.o_proj.lora_A.default.weight", "layers.1.o_proj.weight", 'A')]
    fn test_parse_adapter_key(#[case] key: &str, #[case] base: &str, #[case] half: char) {
        assert_eq!(parse_adapter_key(key), Some((base.to_string(), half)));
    }

    #[test]
    fn test_parse_adapter_key_ignores_other_tensors() {
        assert_eq!(parse_adapter_key("base_model.model.lm_head.weight"), None);
    }

    #[test]
    fn test_merge_weight() {
        let device = Device::Cpu;
        let weight = Tensor::new(&[[1f32, 0.], [0., 1.]], &device).unwrap();
        let pair = LoraPair {
            a: Tensor::new(&[[1f32, 2.]], &device).unwrap(),
            b: Tensor::new(&[[1f32], [3.]], &device).unwrap(),
        };

        let merged = merge_weight(&weight, &pair, 0.5).unwrap();
        // B·A = [[1, 2], [3, 6]]
        assert_eq!(
            merged.to_vec2::<f32>().unwrap(),
            vec![vec![1.5, 1.0], vec![1.5, 4.0]]
        );
    }

    #[test]
    fn test_merge_weight_keeps_dtype() {
        let device = Device::Cpu;
        let weight = Tensor::new(&[[1f32, 0.], [0., 1.]], &device)
            .unwrap()
            .to_dtype(DType::F16)
            .unwrap();
        let pair = LoraPair {
            a: Tensor::new(&[[1f32, 1.]], &device).unwrap(),
            b: Tensor::new(&[[1f32], [1.]], &device).unwrap(),
        };

        let merged = merge_weight(&weight, &pair, 1.0).unwrap();
        assert_eq!(merged.dtype(), DType::F16);
    }

    #[test]
    fn test_merge_weight_shape_mismatch() {
        let device = Device::Cpu;
        let weight = Tensor::new(&[[1f32, 0., 0.], [0., 1., 0.]], &device).unwrap();
        let pair = LoraPair {
            a: Tensor::new(&[[1f32, 1.]], &device).unwrap(),
            b: Tensor::new(&[[1f32], [1.]], &device).unwrap(),
        };
        assert!(matches!(
            merge_weight(&weight, &pair, 1.0),
            Err(LoraError::Adapter(_))
        ));
    }

    #[test]
    fn test_incomplete_pair() {
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert(
            "base_model.model.q_proj.lora_A.weight".to_string(),
            Tensor::new(&[[1f32]], &device).unwrap(),
        );
        assert!(matches!(adapter_pairs(tensors), Err(LoraError::Adapter(_))));
    }
}
