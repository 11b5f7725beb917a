//! Model checkpoints: `VarMap` weights plus a JSON metadata sidecar.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use candle_nn::VarMap;
use dialact_core::{StateComponent, TargetVocab};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TrainConfig;

/// Target-vocabulary fields shared by the sequence families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceMeta {
    pub tgt_vocab_size: usize,
    pub sos_id: u32,
    pub eos_id: u32,
    pub token2id: HashMap<String, u32>,
    pub id2token: Vec<String>,
}

impl SequenceMeta {
    pub fn from_vocab(vocab: &TargetVocab) -> Self {
        Self {
            tgt_vocab_size: vocab.len(),
            sos_id: vocab.sos_id(),
            eos_id: vocab.eos_id(),
            token2id: vocab.token2id(),
            id2token: vocab.tokens().to_vec(),
        }
    }
}

/// Family-specific checkpoint fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelFamily {
    Classifier {
        num_tags: usize,
    },
    SequenceGenerator {
        sequence: SequenceMeta,
    },
    StateToSequence {
        sequence: SequenceMeta,
        slot_num: usize,
        diaact_num: usize,
        embedded_v_size: usize,
        state_v_component: Vec<StateComponent>,
    },
}

/// Shape of a model, as reported by the model itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub input_size: usize,
    pub hidden_size: usize,
    pub family: ModelFamily,
}

/// Everything stored next to the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub input_size: usize,
    pub hidden_size: usize,
    pub config: TrainConfig,
    pub use_accelerator: bool,
    pub epoch: usize,
    pub valid_f1: f64,
    pub model: ModelFamily,
}

impl CheckpointMeta {
    pub fn new(spec: ModelSpec, config: &TrainConfig, use_accelerator: bool, epoch: usize, valid_f1: f64) -> Self {
        Self {
            input_size: spec.input_size,
            hidden_size: spec.hidden_size,
            config: config.clone(),
            use_accelerator,
            epoch,
            valid_f1,
            model: spec.family,
        }
    }
}

/// `<dir>/<name>.safetensors` and `<dir>/<name>.json`.
pub fn checkpoint_paths(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{name}.safetensors")),
        dir.join(format!("{name}.json")),
    )
}

/// Write weights and metadata, replacing any previous checkpoint of the same name.
pub fn save_checkpoint(dir: &Path, name: &str, varmap: &VarMap, meta: &CheckpointMeta) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating model dir {}", dir.display()))?;
    let (weights, sidecar) = checkpoint_paths(dir, name);

    varmap
        .save(&weights)
        .with_context(|| format!("saving weights to {}", weights.display()))?;
    let json = serde_json::to_string_pretty(meta)?;
    fs::write(&sidecar, json).with_context(|| format!("writing {}", sidecar.display()))?;

    info!(
        "Saved checkpoint {} (epoch {}, valid_f1 {:.4})",
        weights.display(),
        meta.epoch,
        meta.valid_f1
    );
    Ok(weights)
}

/// Read back the metadata sidecar.
pub fn load_meta(dir: &Path, name: &str) -> anyhow::Result<CheckpointMeta> {
    let (_, sidecar) = checkpoint_paths(dir, name);
    let json = fs::read_to_string(&sidecar).with_context(|| format!("reading {}", sidecar.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", sidecar.display()))
}
