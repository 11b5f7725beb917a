//! # Batch Builder
//!
//! Groups samples into fixed-size batches, sorting by input length so each
//! batch pads as little as possible.

use std::cmp::Reverse;

use oorandom::Rand64;
use tracing::info;

use crate::error::{DialactError, Result};

/// A group of samples fed to the model in one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<X, Y> {
    pub inputs: Vec<X>,
    pub labels: Vec<Y>,
    /// Original input length of every sample.
    pub lengths: Vec<usize>,
}

impl<X, Y> Batch<X, Y> {
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Ordering policy of [`build_batches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Stable-sort samples by descending input length.
    pub sort_by_length_desc: bool,
    /// Shuffle samples before sorting.
    pub shuffle_samples: bool,
    /// Shuffle the order of the finished batches.
    pub shuffle_batch_order: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            sort_by_length_desc: true,
            shuffle_samples: true,
            shuffle_batch_order: true,
        }
    }
}

impl BatchOptions {
    /// Keep the input order untouched.
    pub fn ordered() -> Self {
        Self {
            sort_by_length_desc: false,
            shuffle_samples: false,
            shuffle_batch_order: false,
        }
    }
}

/// In-place Fisher-Yates shuffle.
pub fn shuffle<T>(items: &mut [T], rng: &mut Rand64) {
    for i in (1..items.len()).rev() {
        let j = rng.rand_range(0..(i as u64 + 1)) as usize;
        items.swap(i, j);
    }
}

/// Split `inputs`/`labels` into `ceil(N / batch_size)` batches.
///
/// Only the last batch (before any batch-order shuffle) may be short.
pub fn build_batches<T, Y>(
    inputs: Vec<Vec<T>>,
    labels: Vec<Y>,
    batch_size: usize,
    options: BatchOptions,
    rng: &mut Rand64,
) -> Result<Vec<Batch<Vec<T>, Y>>> {
    if batch_size == 0 {
        return Err(DialactError::ZeroBatchSize);
    }
    if inputs.len() != labels.len() {
        return Err(DialactError::SampleMismatch {
            inputs: inputs.len(),
            labels: labels.len(),
        });
    }

    let mut order: Vec<usize> = (0..inputs.len()).collect();
    if options.shuffle_samples {
        shuffle(&mut order, rng);
    }
    if options.sort_by_length_desc {
        order.sort_by_key(|&i| Reverse(inputs[i].len()));
    }

    let mut samples: Vec<Option<(Vec<T>, Y)>> = inputs.into_iter().zip(labels).map(Some).collect();

    let num_batches = order.len().div_ceil(batch_size);
    let mut batches = Vec::with_capacity(num_batches);
    for chunk in order.chunks(batch_size) {
        let mut batch = Batch {
            inputs: Vec::with_capacity(chunk.len()),
            labels: Vec::with_capacity(chunk.len()),
            lengths: Vec::with_capacity(chunk.len()),
        };
        // every index appears exactly once in `order`
        for (input, label) in chunk.iter().filter_map(|&i| samples[i].take()) {
            batch.lengths.push(input.len());
            batch.inputs.push(input);
            batch.labels.push(label);
        }
        batches.push(batch);
    }

    if options.shuffle_batch_order {
        shuffle(&mut batches, rng);
    }

    info!("{} batches, batch size: {}", batches.len(), batch_size);
    Ok(batches)
}
