use serde::{Deserialize, Serialize};

use crate::codec::{DecodedAction, encode_action};
use crate::dictionary::DictionarySet;
use crate::error::Result;

use super::metrics::{Prf, score_multi_hot};

/// One line of a prediction dump: decoded prediction next to decoded gold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Split the sample came from (`dev`, `test`).
    pub split: String,
    pub pred: DecodedAction,
    pub gold: DecodedAction,
}

/// Re-score decoded records by encoding both sides as action vectors.
pub fn score_records<'a, I>(records: I, dict: &DictionarySet) -> Result<Prf>
where
    I: IntoIterator<Item = &'a PredictionRecord>,
{
    let mut predicted = Vec::new();
    let mut gold = Vec::new();
    for record in records {
        predicted.push(encode_action(&record.pred, dict)?);
        gold.push(encode_action(&record.gold, dict)?);
    }
    score_multi_hot(&predicted, &gold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::fixtures::small_dict;

    #[test]
    fn test_score_records() {
        let dict = small_dict();
        let line = r#"{"split":"dev","pred":{"diaacts":["inform"],"inform_slots":["name"],"request_slots":[]},
                      "gold":{"diaacts":["inform"],"inform_slots":["phone"],"request_slots":[]}}"#;
        let record: PredictionRecord = serde_json::from_str(line).unwrap();
        let prf = score_records([&record], &dict).unwrap();
        // tp 1 (inform), fp 1 (name), fn 1 (phone)
        assert!((prf.f1 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_slot_in_record_is_fatal() {
        let dict = small_dict();
        let record = PredictionRecord {
            split: "test".into(),
            pred: DecodedAction::new("inform", vec!["colour".into()], vec![]),
            gold: DecodedAction::default(),
        };
        assert!(score_records([&record], &dict).is_err());
    }
}
