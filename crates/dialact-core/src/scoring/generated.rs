use crate::codec::encode_action;
use crate::dictionary::DictionarySet;
use crate::error::Result;
use crate::sequence::{TargetVocab, decode_sequence_to_action};

use super::metrics::{Prf, score_multi_hot};

/// Score generated token sequences against gold sequences.
///
/// Both sides go through [`decode_sequence_to_action`], are re-encoded as
/// `acts ++ inform ++ request` multi-hot vectors and then scored with
/// [`score_multi_hot`]. Padding and malformed pairs simply vanish during
/// decoding.
pub fn score_generated<P, G>(
    predictions: &[P],
    golds: &[G],
    vocab: &TargetVocab,
    dict: &DictionarySet,
) -> Result<Prf>
where
    P: AsRef<[u32]>,
    G: AsRef<[u32]>,
{
    let to_vector = |ids: &[u32]| encode_action(&decode_sequence_to_action(ids, vocab, dict), dict);

    let predicted = predictions
        .iter()
        .map(|p| to_vector(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let gold = golds
        .iter()
        .map(|g| to_vector(g.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    score_multi_hot(&predicted, &gold)
}
