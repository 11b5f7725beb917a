//! # State Vector Schema
//!
//! The fixed, ordered list of components that make up a dialogue-state
//! vector. Each component takes its width from one vocabulary of the
//! [`DictionarySet`]; `dialog_status_v` is a single code.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dictionary::{DictionarySet, VocabKind};
use crate::error::{DialactError, Result};

/// Version of [`STATE_SCHEMA_V1`].
pub const SCHEMA_VERSION: u32 = 1;

/// Width of the `dialog_status_v` component.
pub const STATUS_WIDTH: usize = 1;

/// One named segment of the state vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateComponent {
    /// Slots the user goal informs. 1 = in goal, 0 = irrelevant.
    #[serde(rename = "goal_inform_slots_v")]
    GoalInformSlots,
    /// Slots the user goal requests. 1 = in goal, 0 = irrelevant.
    #[serde(rename = "goal_request_slots_v")]
    GoalRequestSlots,
    /// 1 = informed, 0 = irrelevant, -1 = not informed.
    #[serde(rename = "history_slots_v")]
    HistorySlots,
    /// 1 = still to request, 0 = irrelevant, -1 = already answered.
    #[serde(rename = "rest_slots_v")]
    RestSlots,
    #[serde(rename = "system_diaact_v")]
    SystemDiaact,
    #[serde(rename = "system_inform_slots_v")]
    SystemInformSlots,
    #[serde(rename = "system_request_slots_v")]
    SystemRequestSlots,
    /// 1 = consistent, 0 = irrelevant or not requested, -1 = inconsistent.
    #[serde(rename = "consistency_v")]
    Consistency,
    /// -1 failed, 0 no outcome, 1 success.
    #[serde(rename = "dialog_status_v")]
    DialogStatus,
}

/// Value set a component is allowed to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// {-1, 0, 1}
    Three,
    /// {0, 1}
    Two,
    /// A single status code.
    Status,
}

/// The reference component order. Decoding refuses any other schema.
pub const STATE_SCHEMA_V1: &[StateComponent] = &[
    StateComponent::GoalInformSlots,
    StateComponent::GoalRequestSlots,
    StateComponent::HistorySlots,
    StateComponent::RestSlots,
    StateComponent::SystemDiaact,
    StateComponent::SystemInformSlots,
    StateComponent::SystemRequestSlots,
    StateComponent::Consistency,
    StateComponent::DialogStatus,
];

impl StateComponent {
    /// Total number of components.
    pub const NUM_COMPONENTS: usize = 9;

    pub fn all() -> &'static [StateComponent] {
        STATE_SCHEMA_V1
    }

    /// Wire name, e.g. `history_slots_v`.
    pub fn name(&self) -> &'static str {
        match self {
            StateComponent::GoalInformSlots => "goal_inform_slots_v",
            StateComponent::GoalRequestSlots => "goal_request_slots_v",
            StateComponent::HistorySlots => "history_slots_v",
            StateComponent::RestSlots => "rest_slots_v",
            StateComponent::SystemDiaact => "system_diaact_v",
            StateComponent::SystemInformSlots => "system_inform_slots_v",
            StateComponent::SystemRequestSlots => "system_request_slots_v",
            StateComponent::Consistency => "consistency_v",
            StateComponent::DialogStatus => "dialog_status_v",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            StateComponent::HistorySlots | StateComponent::RestSlots | StateComponent::Consistency => {
                Arity::Three
            }
            StateComponent::DialogStatus => Arity::Status,
            _ => Arity::Two,
        }
    }

    /// Vocabulary that names each position, `None` for the status code.
    pub fn vocab(&self) -> Option<VocabKind> {
        match self {
            StateComponent::GoalInformSlots
            | StateComponent::HistorySlots
            | StateComponent::Consistency => Some(VocabKind::UserInformSlot),
            StateComponent::GoalRequestSlots | StateComponent::RestSlots => {
                Some(VocabKind::UserRequestSlot)
            }
            StateComponent::SystemDiaact => Some(VocabKind::Diaact),
            StateComponent::SystemInformSlots => Some(VocabKind::SysInformSlot),
            StateComponent::SystemRequestSlots => Some(VocabKind::SysRequestSlot),
            StateComponent::DialogStatus => None,
        }
    }

    /// Number of vector positions this component occupies.
    pub fn width(&self, dict: &DictionarySet) -> usize {
        match self.vocab() {
            Some(kind) => dict.vocab(kind).len(),
            None => STATUS_WIDTH,
        }
    }
}

impl fmt::Display for StateComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StateComponent {
    type Err = DialactError;

    fn from_str(s: &str) -> Result<Self> {
        StateComponent::all()
            .iter()
            .copied()
            .find(|c| c.name() == s.trim())
            .ok_or_else(|| DialactError::UnknownComponent(s.to_string()))
    }
}

/// Fail unless `schema` is exactly [`STATE_SCHEMA_V1`].
pub fn ensure_supported(schema: &[StateComponent]) -> Result<()> {
    if schema == STATE_SCHEMA_V1 {
        return Ok(());
    }
    Err(DialactError::SchemaMismatch {
        version: SCHEMA_VERSION,
        expected: STATE_SCHEMA_V1.iter().map(|c| c.name().to_string()).collect(),
        found: schema.iter().map(|c| c.name().to_string()).collect(),
    })
}

/// Position range of every component, in schema order.
pub fn component_ranges(
    schema: &[StateComponent],
    dict: &DictionarySet,
) -> Vec<(StateComponent, Range<usize>)> {
    let mut start = 0;
    schema
        .iter()
        .map(|&component| {
            let end = start + component.width(dict);
            let range = start..end;
            start = end;
            (component, range)
        })
        .collect()
}

/// Full state-vector length for a schema.
pub fn state_width(schema: &[StateComponent], dict: &DictionarySet) -> usize {
    schema.iter().map(|c| c.width(dict)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::fixtures::small_dict;

    #[test]
    fn test_name_roundtrip() {
        for component in StateComponent::all() {
            let parsed: StateComponent = component.name().parse().unwrap();
            assert_eq!(*component, parsed);
        }
        assert_eq!(StateComponent::all().len(), StateComponent::NUM_COMPONENTS);
    }

    #[test]
    fn test_unknown_name_rejected() {
        assert!("belief_v".parse::<StateComponent>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(STATE_SCHEMA_V1).unwrap();
        assert!(json.starts_with(r#"["goal_inform_slots_v","goal_request_slots_v""#));
        let back: Vec<StateComponent> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, STATE_SCHEMA_V1);
    }

    #[test]
    fn test_arity() {
        assert_eq!(StateComponent::HistorySlots.arity(), Arity::Three);
        assert_eq!(StateComponent::SystemDiaact.arity(), Arity::Two);
        assert_eq!(StateComponent::DialogStatus.arity(), Arity::Status);
    }

    #[test]
    fn test_widths_concatenate() {
        let dict = small_dict();
        // inform 3, request 3, inform 3, request 3, acts 3, sys inform 2, sys request 1, inform 3, status 1
        assert_eq!(state_width(STATE_SCHEMA_V1, &dict), 22);

        let ranges = component_ranges(STATE_SCHEMA_V1, &dict);
        assert_eq!(ranges[0].1, 0..3);
        assert_eq!(ranges[5], (StateComponent::SystemInformSlots, 15..17));
        assert_eq!(ranges[8], (StateComponent::DialogStatus, 21..22));
    }

    #[test]
    fn test_ensure_supported() {
        assert!(ensure_supported(STATE_SCHEMA_V1).is_ok());

        let mut swapped = STATE_SCHEMA_V1.to_vec();
        swapped.swap(2, 3);
        let err = ensure_supported(&swapped).unwrap_err();
        assert!(matches!(err, DialactError::SchemaMismatch { version: 1, .. }));

        assert!(ensure_supported(&STATE_SCHEMA_V1[..8]).is_err());
    }
}
