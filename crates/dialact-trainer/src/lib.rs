//! # Dialact Trainer
//!
//! Trains dialogue-action predictors on top of `dialact-core`: split loading
//! and input shaping, candle models (multi-label classifiers and
//! sequence generators), best-on-dev checkpointing and the `train` binary.
//!
//! Every model kind goes through [`pipeline::run`], which picks the history
//! policy, label style and network from the [`TrainConfig`].

pub mod checkpoint;
pub mod config;
pub mod data;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod trainer;

pub use checkpoint::{CheckpointMeta, ModelFamily, ModelSpec, SequenceMeta};
pub use config::{ModelKind, TrainConfig};
pub use data::{Frames, SampleStyle, Split, TurnRecord, history_windows, to_state_frames};
pub use labels::{LabelCodec, MultiHotLabels, SequenceLabels};
pub use model::{ActionModel, ForwardMode, ModelOutput};
pub use pipeline::{HistoryPolicy, run};
pub use trainer::{BestTracker, CancelFlag, EpochMetrics, TrainReport, Trainer};
