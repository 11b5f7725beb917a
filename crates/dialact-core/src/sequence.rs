//! # Sequence Label Codec
//!
//! Token-sequence form of a dialogue action, used as the supervision target
//! of generative models:
//!
//! ```text
//! <SOS> diaact inform inform_slots name inform_slots phone request_slots area <EOS> <PAD> ...
//! ```
//!
//! Decoding is deliberately forgiving: a generator may emit anything, and
//! ill-formed pairs are dropped instead of reported.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::codec::{ActionField, DecodedAction};
use crate::dictionary::{DictionarySet, Vocab};
use crate::error::{DialactError, Result};

pub const PAD_TOKEN: &str = "<PAD>";
pub const SOS_TOKEN: &str = "<SOS>";
pub const EOS_TOKEN: &str = "<EOS>";

/// Tokens that never count as a field value.
pub const RESERVED_TOKENS: [&str; 6] = [
    PAD_TOKEN,
    SOS_TOKEN,
    EOS_TOKEN,
    "diaact",
    "inform_slots",
    "request_slots",
];

/// Decides whether a generated value is type-consistent with its field.
pub trait ValueCheck {
    fn is_valid(&self, field: ActionField, value: &str) -> bool;
}

impl ValueCheck for DictionarySet {
    fn is_valid(&self, field: ActionField, value: &str) -> bool {
        self.vocab(field.vocab()).contains(value)
    }
}

/// Combined vocabulary of generative targets.
///
/// Order: reserved tokens, user inform slots, user request slots, dialogue
/// acts. A token keeps the id it got the first time it was seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetVocab {
    vocab: Vocab,
    pad_id: u32,
    sos_id: u32,
    eos_id: u32,
}

impl TargetVocab {
    pub fn build(dict: &DictionarySet) -> Self {
        let candidates = RESERVED_TOKENS
            .iter()
            .map(|t| t.to_string())
            .chain(dict.user_inform_slot.tokens().iter().cloned())
            .chain(dict.user_request_slot.tokens().iter().cloned())
            .chain(dict.diaact.tokens().iter().cloned());

        let mut seen = HashSet::new();
        let tokens: Vec<String> = candidates.filter(|t| seen.insert(t.clone())).collect();

        // reserved tokens occupy ids 0..6
        Self {
            vocab: Vocab::new(tokens),
            pad_id: 0,
            sos_id: 1,
            eos_id: 2,
        }
    }

    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    pub fn sos_id(&self) -> u32 {
        self.sos_id
    }

    pub fn eos_id(&self) -> u32 {
        self.eos_id
    }

    pub fn id(&self, token: &str) -> Option<u32> {
        self.vocab.id(token).map(|id| id as u32)
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.vocab.token(id as usize)
    }

    /// Tokens in id order.
    pub fn tokens(&self) -> &[String] {
        self.vocab.tokens()
    }

    /// Token -> id map, as persisted in checkpoints.
    pub fn token2id(&self) -> HashMap<String, u32> {
        self.tokens()
            .iter()
            .enumerate()
            .map(|(id, t)| (t.clone(), id as u32))
            .collect()
    }

    /// Whether `token` is a special or field-name token.
    pub fn is_reserved(token: &str) -> bool {
        RESERVED_TOKENS.contains(&token)
    }
}

/// Encode an action as `<SOS>`, field/value pairs, `<EOS>`.
///
/// List fields repeat the field-name token before every value; the act
/// field emits one pair. Any token missing from `vocab`, including an empty
/// act label, is an error.
pub fn encode_action_as_sequence(action: &DecodedAction, vocab: &TargetVocab) -> Result<Vec<u32>> {
    let mut tokens: Vec<&str> = vec![SOS_TOKEN];
    for field in ActionField::ORDER {
        match field {
            ActionField::Diaact => {
                tokens.push(field.token());
                tokens.push(action.diaact());
            }
            _ => {
                for value in action.values(field) {
                    tokens.push(field.token());
                    tokens.push(value);
                }
            }
        }
    }
    tokens.push(EOS_TOKEN);

    tokens
        .into_iter()
        .map(|t| vocab.id(t).ok_or_else(|| DialactError::UnknownToken(t.to_string())))
        .collect()
}

/// Right-pad every sequence to the longest one in `sequences`.
pub fn pad_sequences(sequences: &[Vec<u32>], pad_id: u32) -> Vec<Vec<u32>> {
    let max_len = sequences.iter().map(Vec::len).max().unwrap_or(0);
    sequences
        .iter()
        .map(|seq| {
            let mut padded = Vec::with_capacity(max_len);
            padded.extend_from_slice(seq);
            padded.resize(max_len, pad_id);
            padded
        })
        .collect()
}

/// Recover an action from a (possibly generated) token sequence.
///
/// Every adjacent `(field, value)` pair whose value is not reserved and
/// passes `checker` is kept. Everything else, including ids outside the
/// vocabulary, is skipped. Never fails.
pub fn decode_sequence_to_action<C: ValueCheck + ?Sized>(
    ids: &[u32],
    vocab: &TargetVocab,
    checker: &C,
) -> DecodedAction {
    let tokens: Vec<Option<&str>> = ids.iter().map(|&id| vocab.token(id)).collect();
    let mut action = DecodedAction::default();

    for pair in tokens.windows(2) {
        let (Some(head), Some(value)) = (pair[0], pair[1]) else {
            continue;
        };
        let Some(field) = ActionField::from_token(head) else {
            continue;
        };
        if TargetVocab::is_reserved(value) {
            continue;
        }
        if checker.is_valid(field, value) {
            action.push(field, value.to_string());
        } else {
            debug!(field = %field, value, "dropping type-inconsistent pair");
        }
    }

    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::fixtures::small_dict;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn ids(vocab: &TargetVocab, tokens: &[&str]) -> Vec<u32> {
        tokens.iter().map(|t| vocab.id(t).unwrap()).collect()
    }

    #[test]
    fn test_target_vocab_order() {
        let dict = small_dict();
        let vocab = TargetVocab::build(&dict);

        assert_eq!(&vocab.tokens()[..6], RESERVED_TOKENS);
        assert_eq!(vocab.id("name"), Some(6));
        assert_eq!(vocab.id("area"), Some(9));
        assert_eq!(vocab.id("request"), Some(12));
        assert_eq!(vocab.len(), 15);
        assert_eq!(vocab.pad_id(), vocab.id(PAD_TOKEN).unwrap());
        assert_eq!(vocab.sos_id(), vocab.id(SOS_TOKEN).unwrap());
        assert_eq!(vocab.eos_id(), vocab.id(EOS_TOKEN).unwrap());
    }

    #[test]
    fn test_target_vocab_dedupes_shared_tokens() {
        let mut dict = small_dict();
        dict.user_request_slot = Vocab::new(["name", "area"]);
        let vocab = TargetVocab::build(&dict);
        // "name" keeps the id from the inform vocabulary
        assert_eq!(vocab.id("name"), Some(6));
        assert_eq!(vocab.id("area"), Some(9));
        assert_eq!(vocab.len(), 13);
    }

    #[test]
    fn test_encode_layout() {
        let dict = small_dict();
        let vocab = TargetVocab::build(&dict);
        let action = DecodedAction::new("inform", strings(&["name", "phone"]), strings(&["area"]));

        let seq = encode_action_as_sequence(&action, &vocab).unwrap();
        let expected = ids(
            &vocab,
            &[
                SOS_TOKEN,
                "diaact",
                "inform",
                "inform_slots",
                "name",
                "inform_slots",
                "phone",
                "request_slots",
                "area",
                EOS_TOKEN,
            ],
        );
        assert_eq!(seq, expected);
    }

    #[test]
    fn test_encode_length_property() {
        let dict = small_dict();
        let vocab = TargetVocab::build(&dict);
        for (k_inform, k_request) in [(0, 0), (1, 0), (0, 3), (3, 2)] {
            let inform = dict.user_inform_slot.tokens()[..k_inform].to_vec();
            let request = dict.user_request_slot.tokens()[..k_request].to_vec();
            let action = DecodedAction::new("request", inform, request);
            let seq = encode_action_as_sequence(&action, &vocab).unwrap();

            assert_eq!(seq.len(), 2 * k_inform + 2 * k_request + 2 + 2);
            assert_eq!(seq.first(), Some(&vocab.sos_id()));
            assert_eq!(seq.last(), Some(&vocab.eos_id()));
            assert_eq!(seq.iter().filter(|&&id| id == vocab.sos_id()).count(), 1);
            assert_eq!(seq.iter().filter(|&&id| id == vocab.eos_id()).count(), 1);
        }
    }

    #[test]
    fn test_encode_unknown_token_is_fatal() {
        let dict = small_dict();
        let vocab = TargetVocab::build(&dict);

        let action = DecodedAction::new("inform", strings(&["colour"]), vec![]);
        let err = encode_action_as_sequence(&action, &vocab).unwrap_err();
        assert!(matches!(err, DialactError::UnknownToken(t) if t == "colour"));

        let no_act = DecodedAction::default();
        assert!(encode_action_as_sequence(&no_act, &vocab).is_err());
    }

    #[test]
    fn test_sequence_roundtrip() {
        let dict = small_dict();
        let vocab = TargetVocab::build(&dict);
        let action = DecodedAction::new("confirm", strings(&["price"]), strings(&["food", "time"]));

        let seq = encode_action_as_sequence(&action, &vocab).unwrap();
        let padded = pad_sequences(&[seq, vec![vocab.sos_id()]], vocab.pad_id());
        let decoded = decode_sequence_to_action(&padded[0], &vocab, &dict);
        assert_eq!(decoded, action);
    }

    #[test]
    fn test_pad_sequences() {
        let padded = pad_sequences(&[vec![1, 5, 2], vec![1, 2], vec![]], 0);
        assert_eq!(padded, vec![vec![1, 5, 2], vec![1, 2, 0], vec![0, 0, 0]]);
        assert!(pad_sequences(&[], 0).is_empty());
    }

    #[test]
    fn test_decode_drops_malformed_pairs() {
        let dict = small_dict();
        let vocab = TargetVocab::build(&dict);
        let seq = ids(
            &vocab,
            &[
                SOS_TOKEN,
                "diaact",
                "name", // slot in the act field
                "inform_slots",
                "inform", // act in the inform field
                "inform_slots",
                "inform_slots", // field followed by field
                "phone",
                "request_slots",
                EOS_TOKEN, // field followed by special
                "diaact",
                "request",
            ],
        );
        let mut with_garbage = seq.clone();
        with_garbage.insert(3, 999); // out-of-vocabulary id

        for s in [seq, with_garbage] {
            let decoded = decode_sequence_to_action(&s, &vocab, &dict);
            assert_eq!(decoded.diaacts, strings(&["request"]));
            assert_eq!(decoded.inform_slots, strings(&["phone"]));
            assert!(decoded.request_slots.is_empty());
        }
    }

    #[test]
    fn test_decode_keeps_every_generated_act() {
        let dict = small_dict();
        let vocab = TargetVocab::build(&dict);
        let seq = ids(&vocab, &["diaact", "inform", "diaact", "confirm"]);
        let decoded = decode_sequence_to_action(&seq, &vocab, &dict);
        assert_eq!(decoded.diaacts, strings(&["inform", "confirm"]));
        assert_eq!(decoded.diaact(), "inform");
    }

    #[test]
    fn test_decode_empty_sequence() {
        let dict = small_dict();
        let vocab = TargetVocab::build(&dict);
        assert_eq!(decode_sequence_to_action(&[], &vocab, &dict), DecodedAction::default());
    }
}
