use serde::{Deserialize, Serialize};

use crate::error::{DialactError, Result};

/// True-positive / false-positive / false-negative counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub fn_: usize,
}

/// Precision, recall and F1 in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Prf {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl Confusion {
    /// Count one aligned prediction/gold pair.
    ///
    /// `index` is the sample position, used only for error reporting.
    pub fn accumulate(&mut self, index: usize, predicted: &[i32], gold: &[i32]) -> Result<()> {
        if predicted.len() != gold.len() {
            return Err(DialactError::LengthMismatch {
                index,
                predicted: predicted.len(),
                gold: gold.len(),
            });
        }

        for (position, (&p, &g)) in predicted.iter().zip(gold).enumerate() {
            match (p, g) {
                (1, 1) => self.tp += 1,
                (1, 0) => self.fp += 1,
                (0, 1) => self.fn_ += 1,
                (0, 0) => {}
                _ => {
                    let value = if p == 0 || p == 1 { g } else { p };
                    return Err(DialactError::InvalidLabelValue {
                        index,
                        position,
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    /// Precision/recall/F1 of the accumulated counts.
    ///
    /// With no true positive all three are exactly zero.
    #[must_use]
    pub fn prf(&self) -> Prf {
        if self.tp == 0 {
            return Prf::default();
        }
        let tp = self.tp as f64;
        let precision = tp / (tp + self.fp as f64);
        let recall = tp / (tp + self.fn_ as f64);
        let f1 = 2.0 * precision * recall / (precision + recall);
        Prf {
            precision,
            recall,
            f1,
        }
    }
}

/// Micro precision/recall/F1 over aligned multi-hot vectors.
///
/// Every pair must have equal length and hold only 0 and 1; anything else
/// points at an upstream encoding bug and is returned as an error.
pub fn score_multi_hot<P, G>(predictions: &[P], golds: &[G]) -> Result<Prf>
where
    P: AsRef<[i32]>,
    G: AsRef<[i32]>,
{
    if predictions.len() != golds.len() {
        return Err(DialactError::CountMismatch {
            predicted: predictions.len(),
            gold: golds.len(),
        });
    }

    let mut counts = Confusion::default();
    for (index, (p, g)) in predictions.iter().zip(golds).enumerate() {
        counts.accumulate(index, p.as_ref(), g.as_ref())?;
    }
    Ok(counts.prf())
}
