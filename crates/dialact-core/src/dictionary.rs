//! # Dictionary Set
//!
//! Id/token vocabularies for dialogue acts and slots, loaded from the
//! dictionary JSON that accompanies every dataset split.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;

use serde::Deserialize;

use crate::error::{DialactError, Result};

/// Identifies one of the five vocabularies of a [`DictionarySet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VocabKind {
    Diaact,
    UserInformSlot,
    UserRequestSlot,
    SysInformSlot,
    SysRequestSlot,
}

impl VocabKind {
    /// Name used in error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            VocabKind::Diaact => "diaact",
            VocabKind::UserInformSlot => "user_inform_slot",
            VocabKind::UserRequestSlot => "user_request_slot",
            VocabKind::SysInformSlot => "sys_inform_slot",
            VocabKind::SysRequestSlot => "sys_request_slot",
        }
    }
}

impl fmt::Display for VocabKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered id -> token list with its reverse index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocab {
    tokens: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocab {
    /// Build a vocabulary where each token's id is its position.
    ///
    /// A repeated token keeps the id of its first occurrence in the reverse index.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(tokens.len());
        for (id, token) in tokens.iter().enumerate() {
            index.entry(token.clone()).or_insert(id);
        }
        Self { tokens, index }
    }

    /// Build a vocabulary from a JSON `id2token` object (`{"0": "name", ...}`).
    ///
    /// Ids must be the contiguous range `0..len`.
    pub fn from_id_map(kind: VocabKind, map: &HashMap<String, String>) -> Result<Self> {
        let mut slots: Vec<Option<String>> = vec![None; map.len()];
        for (key, token) in map {
            let id: usize = key.trim().parse().map_err(|_| {
                DialactError::MalformedDictionary(format!("{kind}: id {key:?} is not an integer"))
            })?;
            let slot = slots.get_mut(id).ok_or_else(|| {
                DialactError::MalformedDictionary(format!(
                    "{kind}: id {id} outside contiguous range 0..{}",
                    map.len()
                ))
            })?;
            *slot = Some(token.clone());
        }

        let tokens = slots
            .into_iter()
            .enumerate()
            .map(|(id, token)| {
                token.ok_or_else(|| {
                    DialactError::MalformedDictionary(format!("{kind}: id {id} is missing"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(tokens))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token for an id, if in range.
    pub fn token(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    /// Id for a token, if present.
    pub fn id(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    /// Tokens in id order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

#[derive(Debug, Deserialize)]
struct RawDictionary {
    id2diaact: HashMap<String, String>,
    id2user_inform_slot: HashMap<String, String>,
    id2user_request_slot: HashMap<String, String>,
    id2sys_inform_slot: HashMap<String, String>,
    id2sys_request_slot: HashMap<String, String>,
    #[serde(default)]
    diaact2id: Option<HashMap<String, usize>>,
    #[serde(default)]
    user_inform_slot2id: Option<HashMap<String, usize>>,
    #[serde(default)]
    user_request_slot2id: Option<HashMap<String, usize>>,
}

/// The five vocabularies that give every state and action segment its width.
///
/// Read-only once constructed; share it by reference across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionarySet {
    pub diaact: Vocab,
    pub user_inform_slot: Vocab,
    pub user_request_slot: Vocab,
    pub sys_inform_slot: Vocab,
    pub sys_request_slot: Vocab,
}

impl DictionarySet {
    pub fn new(
        diaact: Vocab,
        user_inform_slot: Vocab,
        user_request_slot: Vocab,
        sys_inform_slot: Vocab,
        sys_request_slot: Vocab,
    ) -> Self {
        Self {
            diaact,
            user_inform_slot,
            user_request_slot,
            sys_inform_slot,
            sys_request_slot,
        }
    }

    /// Parse the dictionary JSON object.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawDictionary = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Parse the dictionary JSON object from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let raw: RawDictionary = serde_json::from_reader(reader)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDictionary) -> Result<Self> {
        let set = Self {
            diaact: Vocab::from_id_map(VocabKind::Diaact, &raw.id2diaact)?,
            user_inform_slot: Vocab::from_id_map(
                VocabKind::UserInformSlot,
                &raw.id2user_inform_slot,
            )?,
            user_request_slot: Vocab::from_id_map(
                VocabKind::UserRequestSlot,
                &raw.id2user_request_slot,
            )?,
            sys_inform_slot: Vocab::from_id_map(VocabKind::SysInformSlot, &raw.id2sys_inform_slot)?,
            sys_request_slot: Vocab::from_id_map(
                VocabKind::SysRequestSlot,
                &raw.id2sys_request_slot,
            )?,
        };

        let reverse_maps = [
            (VocabKind::Diaact, &raw.diaact2id),
            (VocabKind::UserInformSlot, &raw.user_inform_slot2id),
            (VocabKind::UserRequestSlot, &raw.user_request_slot2id),
        ];
        for (kind, reverse) in reverse_maps {
            if let Some(reverse) = reverse {
                set.check_reverse(kind, reverse)?;
            }
        }

        Ok(set)
    }

    fn check_reverse(&self, kind: VocabKind, reverse: &HashMap<String, usize>) -> Result<()> {
        let vocab = self.vocab(kind);
        if reverse.len() != vocab.len() {
            return Err(DialactError::MalformedDictionary(format!(
                "{kind}: token2id has {} entries, id2token has {}",
                reverse.len(),
                vocab.len()
            )));
        }
        for (token, &id) in reverse {
            if vocab.token(id) != Some(token.as_str()) {
                return Err(DialactError::MalformedDictionary(format!(
                    "{kind}: token2id maps {token:?} to {id}, id2token disagrees"
                )));
            }
        }
        Ok(())
    }

    pub fn vocab(&self, kind: VocabKind) -> &Vocab {
        match kind {
            VocabKind::Diaact => &self.diaact,
            VocabKind::UserInformSlot => &self.user_inform_slot,
            VocabKind::UserRequestSlot => &self.user_request_slot,
            VocabKind::SysInformSlot => &self.sys_inform_slot,
            VocabKind::SysRequestSlot => &self.sys_request_slot,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Small dictionary shared by the unit tests of every module.
    pub fn small_dict() -> DictionarySet {
        DictionarySet::new(
            Vocab::new(["request", "inform", "confirm"]),
            Vocab::new(["name", "phone", "price"]),
            Vocab::new(["area", "food", "time"]),
            Vocab::new(["name", "address"]),
            Vocab::new(["people"]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DICT_JSON: &str = r#"{
        "id2diaact": {"0": "request", "1": "inform", "2": "confirm"},
        "diaact2id": {"request": 0, "inform": 1, "confirm": 2},
        "id2user_inform_slot": {"1": "phone", "0": "name"},
        "user_inform_slot2id": {"name": 0, "phone": 1},
        "id2user_request_slot": {"0": "area"},
        "id2sys_inform_slot": {"0": "name", "1": "address"},
        "id2sys_request_slot": {"0": "people"}
    }"#;

    #[test]
    fn test_parse_dictionary_json() {
        let dict = DictionarySet::from_json_str(DICT_JSON).unwrap();
        assert_eq!(dict.diaact.tokens(), ["request", "inform", "confirm"]);
        assert_eq!(dict.user_inform_slot.token(1), Some("phone"));
        assert_eq!(dict.user_request_slot.len(), 1);
        assert_eq!(dict.vocab(VocabKind::SysInformSlot).id("address"), Some(1));
    }

    #[test]
    fn test_non_contiguous_ids_rejected() {
        let json = DICT_JSON.replace(r#""1": "phone""#, r#""5": "phone""#);
        let err = DictionarySet::from_json_str(&json).unwrap_err();
        assert!(matches!(err, DialactError::MalformedDictionary(_)));
    }

    #[test]
    fn test_reverse_map_disagreement_rejected() {
        let json = DICT_JSON.replace(r#""inform": 1"#, r#""inform": 2"#);
        let err = DictionarySet::from_json_str(&json).unwrap_err();
        assert!(err.to_string().contains("diaact"));
    }

    #[test]
    fn test_vocab_first_occurrence_wins() {
        let vocab = Vocab::new(["a", "b", "a"]);
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.id("a"), Some(0));
        assert_eq!(vocab.token(2), Some("a"));
        assert!(vocab.token(3).is_none());
    }
}
