//! # State/Action Codec
//!
//! Converts between the multi-hot state and action vectors and the
//! structured objects they encode.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dictionary::{DictionarySet, Vocab, VocabKind};
use crate::error::{DialactError, Result};
use crate::schema::{self, StateComponent};

/// The three fields of a dialogue action, in sequence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionField {
    Diaact,
    InformSlots,
    RequestSlots,
}

impl ActionField {
    /// Field order used by both action vectors and token sequences.
    pub const ORDER: [ActionField; 3] = [
        ActionField::Diaact,
        ActionField::InformSlots,
        ActionField::RequestSlots,
    ];

    /// Field-name token, e.g. `inform_slots`.
    pub fn token(&self) -> &'static str {
        match self {
            ActionField::Diaact => "diaact",
            ActionField::InformSlots => "inform_slots",
            ActionField::RequestSlots => "request_slots",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|f| f.token() == token)
    }

    /// Vocabulary a value of this field must belong to.
    pub fn vocab(&self) -> VocabKind {
        match self {
            ActionField::Diaact => VocabKind::Diaact,
            ActionField::InformSlots => VocabKind::UserInformSlot,
            ActionField::RequestSlots => VocabKind::UserRequestSlot,
        }
    }
}

impl fmt::Display for ActionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A user action: dialogue act(s) plus inform/request slot lists.
///
/// Actions decoded from label vectors carry at most one act. Actions decoded
/// from generated sequences may carry several, and each one counts when scored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedAction {
    pub diaacts: Vec<String>,
    pub inform_slots: Vec<String>,
    pub request_slots: Vec<String>,
}

impl DecodedAction {
    /// Build an action with a single act label. An empty label means no act.
    pub fn new<S: Into<String>>(diaact: S, inform_slots: Vec<String>, request_slots: Vec<String>) -> Self {
        let diaact = diaact.into();
        Self {
            diaacts: if diaact.is_empty() { Vec::new() } else { vec![diaact] },
            inform_slots,
            request_slots,
        }
    }

    /// The primary act label, or `""` when no act fired.
    pub fn diaact(&self) -> &str {
        self.diaacts.first().map(String::as_str).unwrap_or("")
    }

    /// Values of one field.
    pub fn values(&self, field: ActionField) -> &[String] {
        match field {
            ActionField::Diaact => &self.diaacts,
            ActionField::InformSlots => &self.inform_slots,
            ActionField::RequestSlots => &self.request_slots,
        }
    }

    pub(crate) fn push(&mut self, field: ActionField, value: String) {
        match field {
            ActionField::Diaact => self.diaacts.push(value),
            ActionField::InformSlots => self.inform_slots.push(value),
            ActionField::RequestSlots => self.request_slots.push(value),
        }
    }
}

/// Dialogue outcome carried by `dialog_status_v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogStatus {
    Fail,
    NoOutcome,
    Success,
}

impl DialogStatus {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            -1 => Ok(DialogStatus::Fail),
            0 => Ok(DialogStatus::NoOutcome),
            1 => Ok(DialogStatus::Success),
            other => Err(DialactError::UnknownStatusCode(other)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            DialogStatus::Fail => -1,
            DialogStatus::NoOutcome => 0,
            DialogStatus::Success => 1,
        }
    }
}

impl fmt::Display for DialogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialogStatus::Fail => write!(f, "fail"),
            DialogStatus::NoOutcome => write!(f, "no_outcome"),
            DialogStatus::Success => write!(f, "success"),
        }
    }
}

/// Partition of a {0, 1} component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TwoValued {
    pub pos: Vec<String>,
    pub irr: Vec<String>,
}

/// Partition of a {-1, 0, 1} component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreeValued {
    pub pos: Vec<String>,
    pub neg: Vec<String>,
    pub irr: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserGoal {
    pub inform_slots: Vec<String>,
    pub request_slots: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistorySlots {
    pub informed: Vec<String>,
    pub not_informed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestSlots {
    pub remaining: Vec<String>,
    pub satisfied: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Consistency {
    pub consistent: Vec<String>,
    pub inconsistent: Vec<String>,
}

/// Structured view of one state vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedState {
    /// Raw sub-vector of every component, in schema order.
    pub components: Vec<(StateComponent, Vec<i32>)>,
    pub user_goal: UserGoal,
    /// Every fired system act is kept, the first one is `sys_action.diaact()`.
    pub sys_action: DecodedAction,
    pub history_slots: HistorySlots,
    pub rest_slots: RestSlots,
    pub consistency: Consistency,
    pub dialog_status: DialogStatus,
}

impl DecodedState {
    /// Raw sub-vector of one component.
    pub fn component(&self, component: StateComponent) -> Option<&[i32]> {
        self.components
            .iter()
            .find(|(c, _)| *c == component)
            .map(|(_, v)| v.as_slice())
    }

    /// Raw sub-vectors in schema order, one frame per component.
    pub fn frames(&self) -> Vec<Vec<i32>> {
        self.components.iter().map(|(_, v)| v.clone()).collect()
    }
}

fn lookup(vocab: &Vocab, kind: VocabKind, id: usize) -> Result<String> {
    vocab
        .token(id)
        .map(str::to_string)
        .ok_or(DialactError::UnknownId {
            vocab: kind.name(),
            id,
            size: vocab.len(),
        })
}

fn decode_two_valued(
    component: StateComponent,
    values: &[i32],
    vocab: &Vocab,
    kind: VocabKind,
) -> Result<TwoValued> {
    let mut out = TwoValued::default();
    for (index, &value) in values.iter().enumerate() {
        match value {
            1 => out.pos.push(lookup(vocab, kind, index)?),
            0 => out.irr.push(lookup(vocab, kind, index)?),
            _ => {
                return Err(DialactError::InvalidComponentValue {
                    component: component.name(),
                    index,
                    value,
                });
            }
        }
    }
    Ok(out)
}

fn decode_three_valued(
    component: StateComponent,
    values: &[i32],
    vocab: &Vocab,
    kind: VocabKind,
) -> Result<ThreeValued> {
    let mut out = ThreeValued::default();
    for (index, &value) in values.iter().enumerate() {
        match value {
            1 => out.pos.push(lookup(vocab, kind, index)?),
            -1 => out.neg.push(lookup(vocab, kind, index)?),
            0 => out.irr.push(lookup(vocab, kind, index)?),
            _ => {
                return Err(DialactError::InvalidComponentValue {
                    component: component.name(),
                    index,
                    value,
                });
            }
        }
    }
    Ok(out)
}

/// Decode a state vector against `dict`.
///
/// `schema` must equal [`schema::STATE_SCHEMA_V1`]; anything else fails before
/// a single value is read.
pub fn decode_state(
    vector: &[i32],
    dict: &DictionarySet,
    schema: &[StateComponent],
) -> Result<DecodedState> {
    schema::ensure_supported(schema)?;

    let expected = schema::state_width(schema, dict);
    if vector.len() != expected {
        return Err(DialactError::StateLengthMismatch {
            expected,
            found: vector.len(),
        });
    }

    let mut components = Vec::with_capacity(schema.len());
    let mut user_goal = UserGoal::default();
    let mut sys_action = DecodedAction::default();
    let mut history_slots = HistorySlots::default();
    let mut rest_slots = RestSlots::default();
    let mut consistency = Consistency::default();
    let mut dialog_status = DialogStatus::NoOutcome;

    for (component, range) in schema::component_ranges(schema, dict) {
        let values = &vector[range];
        components.push((component, values.to_vec()));

        let Some(kind) = component.vocab() else {
            dialog_status = DialogStatus::from_code(values[0])?;
            continue;
        };
        let vocab = dict.vocab(kind);

        match component {
            StateComponent::GoalInformSlots => {
                user_goal.inform_slots = decode_two_valued(component, values, vocab, kind)?.pos;
            }
            StateComponent::GoalRequestSlots => {
                user_goal.request_slots = decode_two_valued(component, values, vocab, kind)?.pos;
            }
            StateComponent::HistorySlots => {
                let part = decode_three_valued(component, values, vocab, kind)?;
                history_slots = HistorySlots {
                    informed: part.pos,
                    not_informed: part.neg,
                };
            }
            StateComponent::RestSlots => {
                let part = decode_three_valued(component, values, vocab, kind)?;
                rest_slots = RestSlots {
                    remaining: part.pos,
                    satisfied: part.neg,
                };
            }
            StateComponent::SystemDiaact => {
                let mut acts = decode_two_valued(component, values, vocab, kind)?.pos.into_iter();
                sys_action.diaacts = acts.next().into_iter().collect();
                for act in acts {
                    warn!(kept = sys_action.diaact(), dropped = %act, "multiple system acts in state");
                }
            }
            StateComponent::SystemInformSlots => {
                sys_action.inform_slots = decode_two_valued(component, values, vocab, kind)?.pos;
            }
            StateComponent::SystemRequestSlots => {
                sys_action.request_slots = decode_two_valued(component, values, vocab, kind)?.pos;
            }
            StateComponent::Consistency => {
                let part = decode_three_valued(component, values, vocab, kind)?;
                consistency = Consistency {
                    consistent: part.pos,
                    inconsistent: part.neg,
                };
            }
            // handled above, status has no vocabulary
            StateComponent::DialogStatus => {}
        }
    }

    Ok(DecodedState {
        components,
        user_goal,
        sys_action,
        history_slots,
        rest_slots,
        consistency,
        dialog_status,
    })
}

/// Decode an action label vector.
///
/// Segments are `[0, |acts|)`, `[|acts|, |acts| + |user_request|)` and the
/// remainder. The inform boundary uses the request-slot vocabulary size; the
/// two sizes agree on every dataset this was built for.
pub fn decode_action(vector: &[i32], dict: &DictionarySet) -> Result<DecodedAction> {
    let act_end = dict.diaact.len().min(vector.len());
    let inform_end = (dict.diaact.len() + dict.user_request_slot.len()).min(vector.len());

    let mut action = DecodedAction::default();

    for (index, _) in vector[..act_end].iter().enumerate().filter(|(_, v)| **v == 1) {
        let act = lookup(&dict.diaact, VocabKind::Diaact, index)?;
        if action.diaacts.is_empty() {
            action.diaacts.push(act);
        } else {
            warn!(kept = action.diaact(), dropped = %act, "multiple dialogue acts predicted");
        }
    }

    for (index, _) in vector[act_end..inform_end]
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == 1)
    {
        let slot = lookup(&dict.user_inform_slot, VocabKind::UserInformSlot, index)?;
        action.inform_slots.push(slot);
    }

    for (index, _) in vector[inform_end..]
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == 1)
    {
        let slot = lookup(&dict.user_request_slot, VocabKind::UserRequestSlot, index)?;
        action.request_slots.push(slot);
    }

    Ok(action)
}

/// Multi-hot vector over `vocab` with a 1 at every listed token.
pub fn encode_slots<S: AsRef<str>>(tokens: &[S], vocab: &Vocab) -> Result<Vec<i32>> {
    let mut v = vec![0; vocab.len()];
    for token in tokens {
        let token = token.as_ref();
        let id = vocab
            .id(token)
            .ok_or_else(|| DialactError::UnknownToken(token.to_string()))?;
        v[id] = 1;
    }
    Ok(v)
}

/// Re-encode an action as `acts ++ user_inform ++ user_request` multi-hot.
pub fn encode_action(action: &DecodedAction, dict: &DictionarySet) -> Result<Vec<i32>> {
    let mut v = Vec::with_capacity(action_width(dict));
    for field in ActionField::ORDER {
        v.extend(encode_slots(action.values(field), dict.vocab(field.vocab()))?);
    }
    Ok(v)
}

/// Length of an action vector produced by [`encode_action`].
pub fn action_width(dict: &DictionarySet) -> usize {
    dict.diaact.len() + dict.user_inform_slot.len() + dict.user_request_slot.len()
}
