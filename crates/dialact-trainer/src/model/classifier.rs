//! Multi-label action classifiers.

use anyhow::Context;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::rnn::{LSTM, LSTMConfig, RNN};
use candle_nn::{Linear, VarBuilder, VarMap};
use dialact_core::Batch;

use crate::checkpoint::{ModelFamily, ModelSpec};
use crate::data::Frames;

use super::{
    ActionModel, ForwardMode, ModelOutput, bce_with_logits, frames_to_tensor, labels_to_tensor,
    logits_to_multi_hot,
};

fn apply_dropout(xs: Tensor, dropout: f32, mode: ForwardMode) -> candle_core::Result<Tensor> {
    if mode.is_train() && dropout > 0.0 {
        candle_nn::ops::dropout(&xs, dropout)
    } else {
        Ok(xs)
    }
}

/// Two-layer perceptron over the flattened input frames.
pub struct MultiLabelClassifier {
    varmap: VarMap,
    device: Device,
    hidden: Linear,
    output: Linear,
    dropout: f32,
    input_size: usize,
    hidden_size: usize,
    num_tags: usize,
}

impl MultiLabelClassifier {
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_tags: usize,
        dropout: f32,
        device: &Device,
    ) -> anyhow::Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let hidden = candle_nn::linear(input_size, hidden_size, vb.pp("hidden"))?;
        let output = candle_nn::linear(hidden_size, num_tags, vb.pp("output"))?;
        Ok(Self {
            varmap,
            device: device.clone(),
            hidden,
            output,
            dropout,
            input_size,
            hidden_size,
            num_tags,
        })
    }
}

impl ActionModel for MultiLabelClassifier {
    type Label = Vec<i32>;
    type Prediction = Vec<i32>;

    fn forward(
        &mut self,
        batch: &Batch<Frames, Vec<i32>>,
        mode: ForwardMode,
    ) -> anyhow::Result<ModelOutput<Vec<i32>>> {
        let xs = frames_to_tensor(&batch.inputs, &self.device)?.flatten_from(1)?;
        let hs = apply_dropout(self.hidden.forward(&xs)?.relu()?, self.dropout, mode)?;
        let logits = self.output.forward(&hs)?;

        let target = labels_to_tensor(&batch.labels, &self.device)?;
        let loss = bce_with_logits(&logits, &target)?;
        Ok(ModelOutput {
            predictions: logits_to_multi_hot(&logits)?,
            loss,
        })
    }

    fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    fn spec(&self) -> ModelSpec {
        ModelSpec {
            input_size: self.input_size,
            hidden_size: self.hidden_size,
            family: ModelFamily::Classifier {
                num_tags: self.num_tags,
            },
        }
    }
}

/// Stacked LSTM over a window of turns, classifying from the last hidden state.
pub struct LstmClassifier {
    varmap: VarMap,
    device: Device,
    layers: Vec<LSTM>,
    output: Linear,
    dropout: f32,
    input_size: usize,
    hidden_size: usize,
    num_tags: usize,
}

impl LstmClassifier {
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_tags: usize,
        depth: usize,
        dropout: f32,
        device: &Device,
    ) -> anyhow::Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let mut layers = Vec::with_capacity(depth.max(1));
        for layer in 0..depth.max(1) {
            let in_dim = if layer == 0 { input_size } else { hidden_size };
            layers.push(candle_nn::lstm(
                in_dim,
                hidden_size,
                LSTMConfig::default(),
                vb.pp(format!("lstm.{layer}")),
            )?);
        }
        let output = candle_nn::linear(hidden_size, num_tags, vb.pp("output"))?;
        Ok(Self {
            varmap,
            device: device.clone(),
            layers,
            output,
            dropout,
            input_size,
            hidden_size,
            num_tags,
        })
    }
}

impl ActionModel for LstmClassifier {
    type Label = Vec<i32>;
    type Prediction = Vec<i32>;

    fn forward(
        &mut self,
        batch: &Batch<Frames, Vec<i32>>,
        mode: ForwardMode,
    ) -> anyhow::Result<ModelOutput<Vec<i32>>> {
        let mut xs = frames_to_tensor(&batch.inputs, &self.device)?;
        let mut last = None;
        for layer in &self.layers {
            let states = layer.seq(&xs)?;
            last = states.last().map(|s| s.h().clone());
            xs = apply_dropout(layer.states_to_tensor(&states)?, self.dropout, mode)?;
        }
        let last = last.context("empty turn window")?;
        let logits = self.output.forward(&apply_dropout(last, self.dropout, mode)?)?;

        let target = labels_to_tensor(&batch.labels, &self.device)?;
        let loss = bce_with_logits(&logits, &target)?;
        Ok(ModelOutput {
            predictions: logits_to_multi_hot(&logits)?,
            loss,
        })
    }

    fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    fn spec(&self) -> ModelSpec {
        ModelSpec {
            input_size: self.input_size,
            hidden_size: self.hidden_size,
            family: ModelFamily::Classifier {
                num_tags: self.num_tags,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Batch<Frames, Vec<i32>> {
        Batch {
            inputs: vec![
                vec![vec![1, 0, 1, 0], vec![0, 1, 1, 0]],
                vec![vec![0, 0, 1, 1], vec![1, 1, 0, 0]],
            ],
            labels: vec![vec![1, 0, 1], vec![0, 1, 0]],
            lengths: vec![2, 2],
        }
    }

    #[test]
    fn test_mlp_forward_shapes() {
        let mut model = MultiLabelClassifier::new(8, 16, 3, 0.1, &Device::Cpu).unwrap();
        let out = model
            .forward(&batch(), ForwardMode::Train { teacher_forcing_ratio: 0.0 })
            .unwrap();
        assert_eq!(out.predictions.len(), 2);
        assert!(out.predictions.iter().all(|p| p.len() == 3));
        assert!(out.loss.to_scalar::<f32>().unwrap().is_finite());
        assert_eq!(model.varmap().all_vars().len(), 4);
    }

    #[test]
    fn test_lstm_forward_shapes() {
        let mut model = LstmClassifier::new(4, 8, 3, 2, 0.0, &Device::Cpu).unwrap();
        let out = model.forward(&batch(), ForwardMode::Eval).unwrap();
        assert_eq!(out.predictions.len(), 2);
        assert!(out.predictions.iter().flatten().all(|&v| v == 0 || v == 1));
        assert!(matches!(model.spec().family, ModelFamily::Classifier { num_tags: 3 }));
    }
}
