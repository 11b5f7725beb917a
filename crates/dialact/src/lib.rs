//! # Dialact
//!
//! Dialogue-action modelling for user simulators.
//!
//! - [`core`]: state/action codecs, sequence labels, scoring, batching.
//! - [`trainer`]: candle models and the training pipeline.
//!
//! ```no_run
//! use dialact::trainer::{CancelFlag, ModelKind, TrainConfig, run};
//!
//! let config = TrainConfig::new()
//!     .with_data_dir("data")
//!     .with_model(ModelKind::Classifier)
//!     .with_max_epoch(10);
//! let report = run(&config, CancelFlag::new()).unwrap();
//! println!("best dev F1: {:.4}", report.best_valid_f1);
//! ```

pub use dialact_core as core;
pub use dialact_trainer as trainer;

pub use dialact_core::{
    DecodedAction, DialactError, DictionarySet, Prf, STATE_SCHEMA_V1, StateComponent, TargetVocab,
};
pub use dialact_trainer::{CancelFlag, ModelKind, TrainConfig, TrainReport};
