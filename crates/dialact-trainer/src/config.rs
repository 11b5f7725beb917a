//! Training configuration.

use std::fmt;
use std::path::PathBuf;

use anyhow::bail;
use clap::ValueEnum;
use dialact_core::{STATE_SCHEMA_V1, StateComponent};
use serde::{Deserialize, Serialize};

/// Which network and label style a run trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// Feed-forward multi-label classifier over the current state.
    Classifier,
    /// Recurrent multi-label classifier over a window of states.
    #[value(alias = "lstm")]
    LstmClassifier,
    /// Sequence generator without attention.
    #[value(alias = "ssg", alias = "seq2seq-gen")]
    Seq2seq,
    /// Sequence generator with attention over the encoded states.
    #[value(alias = "ssag", alias = "seq2seq-att-gen")]
    Seq2seqAtt,
    /// Sequence generator reading one encoder step per state component.
    #[value(alias = "sv2s", alias = "state-v2seq")]
    State2seq,
    /// Same as [`ModelKind::State2seq`] without attention.
    State2seqNoAtt,
}

impl ModelKind {
    /// Whether the model emits token sequences rather than multi-hot vectors.
    pub fn is_generative(&self) -> bool {
        !matches!(self, ModelKind::Classifier | ModelKind::LstmClassifier)
    }

    pub fn uses_attention(&self) -> bool {
        matches!(self, ModelKind::Seq2seqAtt | ModelKind::State2seq)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Classifier => "classifier",
            ModelKind::LstmClassifier => "lstm-classifier",
            ModelKind::Seq2seq => "seq2seq",
            ModelKind::Seq2seqAtt => "seq2seq-att",
            ModelKind::State2seq => "state2seq",
            ModelKind::State2seqNoAtt => "state2seq-no-att",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every knob of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub train_path: PathBuf,
    pub dev_path: PathBuf,
    pub test_path: PathBuf,
    pub dict_path: PathBuf,
    /// Prediction dump (JSON lines), rewritten on every evaluation.
    pub output: Option<PathBuf>,
    pub model_dir: PathBuf,
    pub model_name: String,

    pub model: ModelKind,
    /// Feed only the current turn to sequence generators.
    pub single_turn: bool,
    /// Window length for history-based inputs.
    pub history_turns: usize,
    /// History depth for state-component inputs. Only 1 is supported.
    pub state_history_turns: i32,

    pub batch_size: usize,
    pub hidden_dim: usize,
    /// Stacked recurrent layers in encoders.
    pub depth: usize,
    pub dropout: f32,
    /// Longest generated sequence at evaluation time.
    pub max_len: usize,
    /// Projection size of every state component for `state2seq`.
    pub embedded_v_size: usize,

    pub lr: f64,
    /// Multiplied into the learning rate after every epoch when positive.
    pub lr_decay: f64,
    pub max_epoch: usize,
    /// Global gradient-norm ceiling. Non-positive disables clipping.
    pub clip_grad: f64,
    pub teacher_forcing_ratio: f64,

    /// CUDA ordinal, negative for CPU.
    pub gpu: i32,
    pub seed: u64,
    pub state_schema: Vec<StateComponent>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("data/train.json"),
            dev_path: PathBuf::from("data/dev.json"),
            test_path: PathBuf::from("data/test.json"),
            dict_path: PathBuf::from("data/dict.json"),
            output: None,
            model_dir: PathBuf::from("models"),
            model_name: "action_generator".to_string(),
            model: ModelKind::Seq2seqAtt,
            single_turn: false,
            history_turns: 5,
            state_history_turns: 1,
            batch_size: 32,
            hidden_dim: 128,
            depth: 1,
            dropout: 0.1,
            max_len: 20,
            embedded_v_size: 32,
            lr: 1e-3,
            lr_decay: 0.0,
            max_epoch: 100,
            clip_grad: 5.0,
            teacher_forcing_ratio: 0.5,
            gpu: -1,
            seed: 1234,
            state_schema: STATE_SCHEMA_V1.to_vec(),
        }
    }
}

impl TrainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    /// Point train/dev/test/dictionary at `<dir>/{train,dev,test,dict}.json`.
    pub fn with_data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        let dir = dir.into();
        self.train_path = dir.join("train.json");
        self.dev_path = dir.join("dev.json");
        self.test_path = dir.join("test.json");
        self.dict_path = dir.join("dict.json");
        self
    }

    pub fn with_model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.model_dir = dir.into();
        self
    }

    pub fn with_model_name<S: Into<String>>(mut self, name: S) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn with_output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_hidden_dim(mut self, hidden_dim: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self
    }

    pub fn with_max_epoch(mut self, max_epoch: usize) -> Self {
        self.max_epoch = max_epoch;
        self
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    /// Set the dropout probability, clamped to `[0, 0.95]`.
    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout.clamp(0.0, 0.95);
        self
    }

    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub fn with_single_turn(mut self, single_turn: bool) -> Self {
        self.single_turn = single_turn;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject settings no run can start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if self.history_turns == 0 {
            bail!("history_turns must be positive");
        }
        if self.lr.is_nan() || self.lr <= 0.0 {
            bail!("learning rate must be positive, got {}", self.lr);
        }
        if !(0.0..1.0).contains(&self.dropout) {
            bail!("dropout must be in [0, 1), got {}", self.dropout);
        }
        if self.model.is_generative() && self.max_len == 0 {
            bail!("max_len must be positive for {}", self.model);
        }
        if self.model_name.is_empty() {
            bail!("model_name must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TrainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.state_schema, STATE_SCHEMA_V1);
        assert_eq!(config.history_turns, 5);
    }

    #[test]
    fn test_validate_rejects() {
        assert!(TrainConfig::new().with_batch_size(0).validate().is_err());
        assert!(TrainConfig::new().with_history_turns(0).validate().is_err());
        assert!(TrainConfig::new().with_lr(0.0).validate().is_err());
        assert!(TrainConfig::new().with_lr(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = TrainConfig::new()
            .with_data_dir("/tmp/run")
            .with_model(ModelKind::Classifier)
            .with_dropout(3.0);
        assert_eq!(config.dict_path, PathBuf::from("/tmp/run/dict.json"));
        assert_eq!(config.model, ModelKind::Classifier);
        assert_eq!(config.dropout, 0.95);
    }

    #[test]
    fn test_model_kind_names() {
        assert_eq!(ModelKind::from_str("seq2seq-att", true).unwrap(), ModelKind::Seq2seqAtt);
        assert_eq!(ModelKind::from_str("sv2s", true).unwrap(), ModelKind::State2seq);
        assert_eq!(ModelKind::State2seqNoAtt.to_string(), "state2seq-no-att");
        assert!(ModelKind::State2seq.uses_attention());
        assert!(!ModelKind::LstmClassifier.is_generative());
    }

    #[test]
    fn test_serde_round_trip_partial() {
        let config: TrainConfig =
            serde_json::from_str(r#"{"model": "lstm-classifier", "batch_size": 8}"#).unwrap();
        assert_eq!(config.model, ModelKind::LstmClassifier);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.max_len, 20);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"goal_inform_slots_v\""));
    }
}
