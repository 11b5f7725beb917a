//! Data loading and input shaping.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use dialact_core::{DialactError, DictionarySet, StateComponent, decode_state};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Model input of one sample: one or more equally shaped frames.
pub type Frames = Vec<Vec<i32>>;

/// One `[state, label, turn_id]` triple of a split file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord(pub Vec<i32>, pub Vec<i32>, pub usize);

/// A split file, column-wise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub states: Vec<Vec<i32>>,
    pub labels: Vec<Vec<i32>>,
    pub turn_ids: Vec<usize>,
}

impl Split {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Width of the first state vector, 0 for an empty split.
    pub fn state_width(&self) -> usize {
        self.states.first().map_or(0, Vec::len)
    }

    /// Width of the first label vector, 0 for an empty split.
    pub fn label_width(&self) -> usize {
        self.labels.first().map_or(0, Vec::len)
    }
}

impl FromIterator<TurnRecord> for Split {
    fn from_iter<I: IntoIterator<Item = TurnRecord>>(iter: I) -> Self {
        let mut split = Split::default();
        for TurnRecord(state, label, turn_id) in iter {
            split.states.push(state);
            split.labels.push(label);
            split.turn_ids.push(turn_id);
        }
        split
    }
}

/// Load a split file (a JSON array of turn records).
pub fn load_split<P: AsRef<Path>>(path: P) -> anyhow::Result<Split> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening split {}", path.display()))?;
    let records: Vec<TurnRecord> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing split {}", path.display()))?;
    info!("Loaded {} turns from {}", records.len(), path.display());
    Ok(records.into_iter().collect())
}

/// Load the dictionary file.
pub fn load_dictionary<P: AsRef<Path>>(path: P) -> anyhow::Result<DictionarySet> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("opening dictionary {}", path.display()))?;
    DictionarySet::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing dictionary {}", path.display()))
}

/// Every state as a one-frame sample.
pub fn single_turn(states: &[Vec<i32>]) -> Vec<Frames> {
    states.iter().map(|s| vec![s.clone()]).collect()
}

/// Every state together with the states that preceded it in its dialogue.
///
/// A turn id of 0 opens a new dialogue. Windows shorter than `history_turns`
/// are front-padded with copies of the current state, so every sample has
/// exactly `history_turns` frames.
pub fn history_windows(states: &[Vec<i32>], turn_ids: &[usize], history_turns: usize) -> Vec<Frames> {
    let history_turns = history_turns.max(1);
    let mut buffer: VecDeque<Vec<i32>> = VecDeque::with_capacity(history_turns);
    let mut samples = Vec::with_capacity(states.len());

    for (state, &turn_id) in states.iter().zip(turn_ids) {
        if turn_id == 0 {
            buffer.clear();
        }
        if buffer.len() < history_turns - 1 {
            buffer.clear();
            buffer.extend(std::iter::repeat_n(state.clone(), history_turns - 1));
        }
        buffer.push_back(state.clone());
        while buffer.len() > history_turns {
            buffer.pop_front();
        }
        samples.push(buffer.iter().cloned().collect());
    }
    samples
}

/// How a state vector is presented to a state-component encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStyle {
    /// Raw multi-hot component sub-vectors.
    MultiHot,
    /// Decoded slot names per component.
    Structured,
}

impl fmt::Display for SampleStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SampleStyle::MultiHot => "multi-hot",
            SampleStyle::Structured => "structured",
        })
    }
}

/// Split every state into one frame per schema component.
///
/// Only `MultiHot` with a history of one turn is supported.
pub fn to_state_frames(
    states: &[Vec<i32>],
    dict: &DictionarySet,
    schema: &[StateComponent],
    style: SampleStyle,
    history_turns: i32,
) -> dialact_core::Result<Vec<Frames>> {
    if style != SampleStyle::MultiHot || history_turns != 1 {
        return Err(DialactError::UnsupportedInputStyle {
            style: style.to_string(),
            history_turns,
        });
    }
    states
        .iter()
        .map(|state| decode_state(state, dict, schema).map(|decoded| decoded.frames()))
        .collect()
}
