//! Label styles: how gold labels are fed, scored and described.

use dialact_core::{
    DecodedAction, DictionarySet, Prf, TargetVocab, decode_action, decode_sequence_to_action,
    encode_action_as_sequence, score_generated, score_multi_hot,
};

/// Scoring and decoding side of a label style.
pub trait LabelCodec {
    type Label;
    type Prediction;

    /// Corpus-level P/R/F1 of `predictions` against `golds`.
    fn score(&self, predictions: &[Self::Prediction], golds: &[Self::Label]) -> dialact_core::Result<Prf>;

    fn describe_prediction(&self, prediction: &Self::Prediction) -> dialact_core::Result<DecodedAction>;

    fn describe_gold(&self, gold: &Self::Label) -> dialact_core::Result<DecodedAction>;
}

/// Labels used as-is: `acts ++ inform ++ request` multi-hot vectors.
pub struct MultiHotLabels<'a> {
    dict: &'a DictionarySet,
}

impl<'a> MultiHotLabels<'a> {
    pub fn new(dict: &'a DictionarySet) -> Self {
        Self { dict }
    }
}

impl LabelCodec for MultiHotLabels<'_> {
    type Label = Vec<i32>;
    type Prediction = Vec<i32>;

    fn score(&self, predictions: &[Vec<i32>], golds: &[Vec<i32>]) -> dialact_core::Result<Prf> {
        score_multi_hot(predictions, golds)
    }

    fn describe_prediction(&self, prediction: &Vec<i32>) -> dialact_core::Result<DecodedAction> {
        decode_action(prediction, self.dict)
    }

    fn describe_gold(&self, gold: &Vec<i32>) -> dialact_core::Result<DecodedAction> {
        decode_action(gold, self.dict)
    }
}

/// Labels rewritten as token sequences over the target vocabulary.
pub struct SequenceLabels<'a> {
    dict: &'a DictionarySet,
    vocab: &'a TargetVocab,
}

impl<'a> SequenceLabels<'a> {
    pub fn new(dict: &'a DictionarySet, vocab: &'a TargetVocab) -> Self {
        Self { dict, vocab }
    }

    /// Turn multi-hot action labels into unpadded token sequences.
    pub fn encode_labels(&self, labels: &[Vec<i32>]) -> dialact_core::Result<Vec<Vec<u32>>> {
        labels
            .iter()
            .map(|label| {
                let action = decode_action(label, self.dict)?;
                encode_action_as_sequence(&action, self.vocab)
            })
            .collect()
    }
}

impl LabelCodec for SequenceLabels<'_> {
    type Label = Vec<u32>;
    type Prediction = Vec<u32>;

    fn score(&self, predictions: &[Vec<u32>], golds: &[Vec<u32>]) -> dialact_core::Result<Prf> {
        score_generated(predictions, golds, self.vocab, self.dict)
    }

    fn describe_prediction(&self, prediction: &Vec<u32>) -> dialact_core::Result<DecodedAction> {
        Ok(decode_sequence_to_action(prediction, self.vocab, self.dict))
    }

    fn describe_gold(&self, gold: &Vec<u32>) -> dialact_core::Result<DecodedAction> {
        Ok(decode_sequence_to_action(gold, self.vocab, self.dict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialact_core::Vocab;

    fn dict() -> DictionarySet {
        DictionarySet::new(
            Vocab::new(["request", "inform"]),
            Vocab::new(["name", "phone"]),
            Vocab::new(["area", "food"]),
            Vocab::new(["name"]),
            Vocab::new(["people"]),
        )
    }

    #[test]
    fn test_sequence_labels_round_trip() {
        let dict = dict();
        let vocab = TargetVocab::build(&dict);
        let codec = SequenceLabels::new(&dict, &vocab);

        let labels = vec![vec![0, 1, 0, 1, 0, 0], vec![1, 0, 0, 0, 1, 0]];
        let sequences = codec.encode_labels(&labels).unwrap();
        assert_eq!(sequences[0].first(), Some(&vocab.sos_id()));
        assert_eq!(sequences[0].last(), Some(&vocab.eos_id()));

        let gold = codec.describe_gold(&sequences[1]).unwrap();
        assert_eq!(gold.diaact(), "request");
        assert_eq!(gold.request_slots, vec!["area".to_string()]);

        let prf = codec.score(&sequences, &sequences).unwrap();
        assert_eq!(prf.f1, 1.0);
    }

    #[test]
    fn test_multi_hot_labels() {
        let dict = dict();
        let codec = MultiHotLabels::new(&dict);
        let gold = vec![0, 1, 1, 0, 0, 0];
        let pred = vec![0, 1, 0, 0, 0, 0];
        let prf = codec.score(&[pred.clone()], &[gold]).unwrap();
        assert_eq!(prf.precision, 1.0);
        assert_eq!(prf.recall, 0.5);
        assert_eq!(codec.describe_prediction(&pred).unwrap().diaact(), "inform");
    }
}
