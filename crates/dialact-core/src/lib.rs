//! # Dialact Core
//!
//! Data representation and evaluation core of the dialogue-action trainer:
//! the state-vector schema, the state/action codec, the token-sequence label
//! codec, the multi-label P/R/F1 scorer and the batch builder. Everything
//! here works on plain vectors; no tensor engine is involved.
//!
//! ## Quick Start
//!
//! ```rust
//! use dialact_core::{DictionarySet, Vocab, decode_action, score_multi_hot};
//!
//! let dict = DictionarySet::new(
//!     Vocab::new(["request", "inform", "confirm"]),
//!     Vocab::new(["name", "phone"]),
//!     Vocab::new(["area", "food"]),
//!     Vocab::new(["name"]),
//!     Vocab::new(["people"]),
//! );
//!
//! let action = decode_action(&[0, 1, 0, 1, 0, 0, 1], &dict).unwrap();
//! assert_eq!(action.diaact(), "inform");
//! assert_eq!(action.inform_slots, vec!["name".to_string()]);
//!
//! let prf = score_multi_hot(&[vec![0, 1, 0, 1]], &[vec![0, 1, 0, 1]]).unwrap();
//! assert_eq!(prf.f1, 1.0);
//! ```
pub mod batch;
pub mod codec;
pub mod dictionary;
pub mod error;
pub mod schema;
pub mod scoring;
pub mod sequence;

// Re-export primary API
pub use batch::{Batch, BatchOptions, build_batches, shuffle};
pub use codec::{
    ActionField, DecodedAction, DecodedState, DialogStatus, action_width, decode_action,
    decode_state, encode_action, encode_slots,
};
pub use dictionary::{DictionarySet, Vocab, VocabKind};
pub use error::{DialactError, Result};
pub use schema::{Arity, SCHEMA_VERSION, STATE_SCHEMA_V1, StateComponent};
pub use scoring::{
    Confusion, PredictionRecord, Prf, score_generated, score_multi_hot, score_records,
};
pub use sequence::{
    TargetVocab, ValueCheck, decode_sequence_to_action, encode_action_as_sequence, pad_sequences,
};
