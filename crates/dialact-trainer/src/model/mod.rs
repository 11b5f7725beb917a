//! Candle models behind one forward contract.

pub mod classifier;
pub mod seq2seq;

use anyhow::bail;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarMap;
use dialact_core::Batch;

use crate::checkpoint::ModelSpec;
use crate::data::Frames;

pub use classifier::{LstmClassifier, MultiLabelClassifier};
pub use seq2seq::{Seq2SeqConfig, Seq2SeqGenerator};

/// Whether a forward pass trains or evaluates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForwardMode {
    Train { teacher_forcing_ratio: f64 },
    Eval,
}

impl ForwardMode {
    pub fn is_train(&self) -> bool {
        matches!(self, ForwardMode::Train { .. })
    }
}

/// Per-sample predictions and the scalar batch loss.
pub struct ModelOutput<P> {
    pub predictions: Vec<P>,
    pub loss: Tensor,
}

/// A trainable model mapping a batch of frames to predictions and a loss.
pub trait ActionModel {
    /// Per-sample gold label.
    type Label;
    /// Per-sample prediction.
    type Prediction;

    fn forward(
        &mut self,
        batch: &Batch<Frames, Self::Label>,
        mode: ForwardMode,
    ) -> anyhow::Result<ModelOutput<Self::Prediction>>;

    /// Parameters, for the optimizer and for checkpointing.
    fn varmap(&self) -> &VarMap;

    /// Shape metadata written into checkpoints.
    fn spec(&self) -> ModelSpec;
}

/// Stack a batch of frame lists into `(batch, frames, width)`.
///
/// Every sample must have the same frame count and every frame the same width.
pub fn frames_to_tensor(inputs: &[Frames], device: &Device) -> anyhow::Result<Tensor> {
    let Some(first) = inputs.first() else {
        bail!("cannot build a tensor from an empty batch");
    };
    let num_frames = first.len();
    let width = first.first().map_or(0, Vec::len);

    let mut data = Vec::with_capacity(inputs.len() * num_frames * width);
    for (i, frames) in inputs.iter().enumerate() {
        if frames.len() != num_frames {
            bail!("sample {i} has {} frames, expected {num_frames}", frames.len());
        }
        for frame in frames {
            if frame.len() != width {
                bail!("sample {i} has a frame of width {}, expected {width}", frame.len());
            }
            data.extend(frame.iter().map(|&v| v as f32));
        }
    }
    Ok(Tensor::from_vec(data, (inputs.len(), num_frames, width), device)?)
}

/// Frame `index` of every sample as `(batch, width)`.
pub fn frame_to_tensor(inputs: &[Frames], index: usize, device: &Device) -> anyhow::Result<Tensor> {
    let mut rows = Vec::with_capacity(inputs.len());
    for (i, frames) in inputs.iter().enumerate() {
        match frames.get(index) {
            Some(frame) => rows.push(frame.iter().map(|&v| v as f32).collect::<Vec<f32>>()),
            None => bail!("sample {i} has no frame {index}"),
        }
    }
    let width = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != width) {
        bail!("frame {index} differs in width across the batch");
    }
    let data: Vec<f32> = rows.into_iter().flatten().collect();
    Ok(Tensor::from_vec(data, (inputs.len(), width), device)?)
}

/// Multi-hot labels as an `f32` `(batch, tags)` target.
pub fn labels_to_tensor(labels: &[Vec<i32>], device: &Device) -> anyhow::Result<Tensor> {
    let width = labels.first().map_or(0, Vec::len);
    if labels.iter().any(|l| l.len() != width) {
        bail!("labels differ in width across the batch");
    }
    let data: Vec<f32> = labels.iter().flatten().map(|&v| v as f32).collect();
    Ok(Tensor::from_vec(data, (labels.len(), width), device)?)
}

/// Mean binary cross-entropy on raw logits.
///
/// Uses `max(x, 0) - x * t + ln(1 + e^-|x|)` so large logits stay finite.
pub fn bce_with_logits(logits: &Tensor, target: &Tensor) -> candle_core::Result<Tensor> {
    let positive = logits.relu()?;
    let cross = (logits * target)?;
    let soft = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    ((positive - cross)? + soft)?.mean_all()
}

/// Threshold logits at probability 0.5 into multi-hot rows.
pub fn logits_to_multi_hot(logits: &Tensor) -> anyhow::Result<Vec<Vec<i32>>> {
    let fired = logits.gt(0.0)?.to_dtype(DType::U8)?.to_vec2::<u8>()?;
    Ok(fired
        .into_iter()
        .map(|row| row.into_iter().map(i32::from).collect())
        .collect())
}

/// Pick a device: CPU for a negative ordinal, CUDA when available otherwise.
pub fn select_device(gpu: i32) -> anyhow::Result<Device> {
    if gpu < 0 {
        return Ok(Device::Cpu);
    }
    Ok(Device::cuda_if_available(gpu as usize)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_to_tensor_shape() {
        let inputs = vec![vec![vec![1, 0, 1], vec![0, 0, 1]], vec![vec![0, 1, 0], vec![1, 1, 1]]];
        let t = frames_to_tensor(&inputs, &Device::Cpu).unwrap();
        assert_eq!(t.dims(), &[2, 2, 3]);
        let ragged = vec![vec![vec![1, 0]], vec![vec![1]]];
        assert!(frames_to_tensor(&ragged, &Device::Cpu).is_err());
    }

    #[test]
    fn test_frame_to_tensor_picks_component() {
        let inputs = vec![vec![vec![1], vec![0, 1, 1]], vec![vec![0], vec![1, 0, 0]]];
        let t = frame_to_tensor(&inputs, 1, &Device::Cpu).unwrap();
        assert_eq!(t.to_vec2::<f32>().unwrap(), vec![vec![0.0, 1.0, 1.0], vec![1.0, 0.0, 0.0]]);
        assert!(frame_to_tensor(&inputs, 2, &Device::Cpu).is_err());
    }

    #[test]
    fn test_bce_with_logits_matches_closed_form() {
        let logits = Tensor::new(&[[0.0f32, 2.0]], &Device::Cpu).unwrap();
        let target = Tensor::new(&[[1.0f32, 0.0]], &Device::Cpu).unwrap();
        let loss = bce_with_logits(&logits, &target).unwrap().to_scalar::<f32>().unwrap();
        let expected = (2f32.ln() + (1.0 + 2f32.exp()).ln()) / 2.0;
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_logits_to_multi_hot() {
        let logits = Tensor::new(&[[-1.0f32, 0.5, 0.0]], &Device::Cpu).unwrap();
        assert_eq!(logits_to_multi_hot(&logits).unwrap(), vec![vec![0, 1, 0]]);
    }
}
