//! Encoder-decoder generator emitting action token sequences.
//!
//! The encoder is a stacked LSTM over the input frames. For state-component
//! inputs every component is first projected to a fixed size by its own
//! linear layer, so frames of different widths become one encoder step each.
//! The decoder is a single LSTM cell seeded with the final encoder state,
//! optionally attending over all encoder outputs with dot-product attention.

use anyhow::bail;
use candle_core::{D, DType, Device, IndexOp, Module, Tensor};
use candle_nn::rnn::{LSTM, LSTMConfig, LSTMState, RNN};
use candle_nn::{Embedding, Linear, VarBuilder, VarMap};
use dialact_core::{Batch, TargetVocab, pad_sequences};
use oorandom::Rand64;

use crate::checkpoint::{ModelFamily, ModelSpec};
use crate::data::Frames;

use super::{ActionModel, ForwardMode, ModelOutput, frame_to_tensor, frames_to_tensor};

/// Shape of a [`Seq2SeqGenerator`].
#[derive(Debug, Clone, PartialEq)]
pub struct Seq2SeqConfig {
    /// Frame width for plain encoders.
    pub input_size: usize,
    pub hidden_size: usize,
    /// Stacked encoder layers.
    pub depth: usize,
    pub dropout: f32,
    /// Generation limit in evaluation mode.
    pub max_len: usize,
    pub attention: bool,
    /// Per-component widths. When present every frame is projected to
    /// `embedded_v_size` before encoding.
    pub component_widths: Option<Vec<usize>>,
    pub embedded_v_size: usize,
    /// Seed of the teacher-forcing coin.
    pub seed: u64,
}

pub struct Seq2SeqGenerator {
    varmap: VarMap,
    device: Device,
    config: Seq2SeqConfig,
    projections: Vec<Linear>,
    encoder: Vec<LSTM>,
    embedding: Embedding,
    decoder: LSTM,
    attention: Option<Linear>,
    output: Linear,
    pad_id: u32,
    sos_id: u32,
    eos_id: u32,
    family: ModelFamily,
    rng: Rand64,
}

impl Seq2SeqGenerator {
    pub fn new(
        config: Seq2SeqConfig,
        vocab: &TargetVocab,
        family: ModelFamily,
        device: &Device,
    ) -> anyhow::Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let hidden = config.hidden_size;

        let mut projections = Vec::new();
        if let Some(widths) = &config.component_widths {
            for (k, &width) in widths.iter().enumerate() {
                projections.push(candle_nn::linear(
                    width,
                    config.embedded_v_size,
                    vb.pp(format!("projection.{k}")),
                )?);
            }
        }
        let encoder_input = if projections.is_empty() {
            config.input_size
        } else {
            config.embedded_v_size
        };

        let mut encoder = Vec::with_capacity(config.depth.max(1));
        for layer in 0..config.depth.max(1) {
            let in_dim = if layer == 0 { encoder_input } else { hidden };
            encoder.push(candle_nn::lstm(
                in_dim,
                hidden,
                LSTMConfig::default(),
                vb.pp(format!("encoder.{layer}")),
            )?);
        }

        let embedding = candle_nn::embedding(vocab.len(), hidden, vb.pp("embedding"))?;
        let decoder = candle_nn::lstm(hidden, hidden, LSTMConfig::default(), vb.pp("decoder"))?;
        let attention = if config.attention {
            Some(candle_nn::linear(2 * hidden, hidden, vb.pp("attention"))?)
        } else {
            None
        };
        let output = candle_nn::linear(hidden, vocab.len(), vb.pp("output"))?;

        let rng = Rand64::new(config.seed as u128);
        Ok(Self {
            varmap,
            device: device.clone(),
            config,
            projections,
            encoder,
            embedding,
            decoder,
            attention,
            output,
            pad_id: vocab.pad_id(),
            sos_id: vocab.sos_id(),
            eos_id: vocab.eos_id(),
            family,
            rng,
        })
    }

    fn dropout(&self, xs: Tensor, mode: ForwardMode) -> candle_core::Result<Tensor> {
        if mode.is_train() && self.config.dropout > 0.0 {
            candle_nn::ops::dropout(&xs, self.config.dropout)
        } else {
            Ok(xs)
        }
    }

    /// Encoder outputs `(batch, steps, hidden)` and the final encoder state.
    fn encode(&self, inputs: &[Frames], mode: ForwardMode) -> anyhow::Result<(Tensor, LSTMState)> {
        let mut xs = if self.projections.is_empty() {
            frames_to_tensor(inputs, &self.device)?
        } else {
            let mut steps = Vec::with_capacity(self.projections.len());
            for (k, projection) in self.projections.iter().enumerate() {
                let frame = frame_to_tensor(inputs, k, &self.device)?;
                steps.push(projection.forward(&frame)?);
            }
            Tensor::stack(&steps, 1)?
        };

        let mut last = None;
        for layer in &self.encoder {
            let states = layer.seq(&xs)?;
            last = states.last().cloned();
            xs = self.dropout(layer.states_to_tensor(&states)?, mode)?;
        }
        match last {
            Some(state) => Ok((xs, state)),
            None => bail!("encoder received no input steps"),
        }
    }

    /// One decoder step, returning vocabulary logits and the new state.
    fn decode_step(
        &self,
        input: &Tensor,
        state: &LSTMState,
        encoded: &Tensor,
        mode: ForwardMode,
    ) -> anyhow::Result<(Tensor, LSTMState)> {
        let embedded = self.dropout(self.embedding.forward(input)?, mode)?;
        let state = self.decoder.step(&embedded, state)?;
        let hs = state.h().clone();

        let hs = match &self.attention {
            Some(attention) => {
                let scores = encoded.matmul(&hs.unsqueeze(2)?)?;
                let weights = candle_nn::ops::softmax(&scores, 1)?;
                let context = weights.broadcast_mul(encoded)?.sum(1)?;
                attention.forward(&Tensor::cat(&[&hs, &context], 1)?)?.tanh()?
            }
            None => hs,
        };
        Ok((self.output.forward(&hs)?, state))
    }

    fn truncate_after_eos(&self, row: Vec<u32>) -> Vec<u32> {
        match row.iter().position(|&id| id == self.eos_id) {
            Some(end) => row[..=end].to_vec(),
            None => row,
        }
    }
}

impl ActionModel for Seq2SeqGenerator {
    type Label = Vec<u32>;
    type Prediction = Vec<u32>;

    fn forward(
        &mut self,
        batch: &Batch<Frames, Vec<u32>>,
        mode: ForwardMode,
    ) -> anyhow::Result<ModelOutput<Vec<u32>>> {
        let batch_size = batch.len();
        let (encoded, mut state) = self.encode(&batch.inputs, mode)?;

        let padded = pad_sequences(&batch.labels, self.pad_id);
        let target_len = padded.first().map_or(0, Vec::len);
        let gold = Tensor::from_vec(
            padded.into_iter().flatten().collect::<Vec<u32>>(),
            (batch_size, target_len),
            &self.device,
        )?;

        let (steps, teacher_forcing) = match mode {
            ForwardMode::Train { teacher_forcing_ratio } => (
                target_len.saturating_sub(1),
                self.rng.rand_float() < teacher_forcing_ratio,
            ),
            ForwardMode::Eval => (self.config.max_len, false),
        };

        let mut input = Tensor::from_vec(vec![self.sos_id; batch_size], batch_size, &self.device)?;
        let mut losses = Vec::with_capacity(steps);
        let mut counts = Vec::with_capacity(steps);
        let mut generated = Vec::with_capacity(steps);

        for t in 0..steps {
            let (logits, next_state) = self.decode_step(&input, &state, &encoded, mode)?;
            state = next_state;
            let best = logits.argmax(D::Minus1)?;

            let mut forced = None;
            if t + 1 < target_len {
                let target = gold.i((.., t + 1))?.contiguous()?;
                let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
                let picked = log_probs.gather(&target.unsqueeze(1)?, 1)?.squeeze(1)?;
                let mask = target.ne(self.pad_id)?.to_dtype(DType::F32)?;
                losses.push((picked * &mask)?.sum_all()?.neg()?);
                counts.push(mask.sum_all()?);
                forced = Some(target);
            }

            generated.push(best.clone());
            input = match forced {
                Some(target) if teacher_forcing => target,
                _ => best,
            };
        }

        let loss = if losses.is_empty() {
            Tensor::zeros((), DType::F32, &self.device)?
        } else {
            let total = Tensor::stack(&losses, 0)?.sum_all()?;
            let count = Tensor::stack(&counts, 0)?.sum_all()?.to_scalar::<f32>()?;
            (total / f64::from(count.max(1.0)))?
        };

        let predictions = if generated.is_empty() {
            vec![Vec::new(); batch_size]
        } else {
            Tensor::stack(&generated, 1)?
                .to_vec2::<u32>()?
                .into_iter()
                .map(|row| self.truncate_after_eos(row))
                .collect()
        };

        Ok(ModelOutput { predictions, loss })
    }

    fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    fn spec(&self) -> ModelSpec {
        ModelSpec {
            input_size: self.config.input_size,
            hidden_size: self.config.hidden_size,
            family: self.family.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::SequenceMeta;
    use dialact_core::{DecodedAction, DictionarySet, Vocab, encode_action_as_sequence};

    fn vocab() -> TargetVocab {
        let dict = DictionarySet::new(
            Vocab::new(["request", "inform"]),
            Vocab::new(["name", "phone"]),
            Vocab::new(["area"]),
            Vocab::new(["name"]),
            Vocab::new(["people"]),
        );
        TargetVocab::build(&dict)
    }

    fn config(attention: bool, component_widths: Option<Vec<usize>>) -> Seq2SeqConfig {
        Seq2SeqConfig {
            input_size: 3,
            hidden_size: 8,
            depth: 1,
            dropout: 0.0,
            max_len: 6,
            attention,
            component_widths,
            embedded_v_size: 4,
            seed: 7,
        }
    }

    fn batch(vocab: &TargetVocab, inputs: Vec<Frames>) -> Batch<Frames, Vec<u32>> {
        let labels = vec![
            encode_action_as_sequence(&DecodedAction::new("inform", vec!["name".into()], vec![]), vocab).unwrap(),
            encode_action_as_sequence(&DecodedAction::new("request", vec![], vec!["area".into()]), vocab).unwrap(),
        ];
        Batch {
            lengths: inputs.iter().map(Vec::len).collect(),
            inputs,
            labels,
        }
    }

    #[test]
    fn test_train_and_eval_forward() {
        let vocab = vocab();
        let family = ModelFamily::SequenceGenerator {
            sequence: SequenceMeta::from_vocab(&vocab),
        };
        let mut model = Seq2SeqGenerator::new(config(true, None), &vocab, family, &Device::Cpu).unwrap();
        let inputs = vec![vec![vec![1, 0, 1], vec![0, 1, 0]], vec![vec![0, 0, 1], vec![1, 1, 0]]];
        let batch = batch(&vocab, inputs);

        let out = model
            .forward(&batch, ForwardMode::Train { teacher_forcing_ratio: 1.0 })
            .unwrap();
        let loss = out.loss.to_scalar::<f32>().unwrap();
        assert!(loss.is_finite() && loss > 0.0);

        let out = model.forward(&batch, ForwardMode::Eval).unwrap();
        assert_eq!(out.predictions.len(), 2);
        for row in &out.predictions {
            assert!(row.len() <= 6);
            assert!(row.iter().all(|&id| (id as usize) < vocab.len()));
            if let Some(pos) = row.iter().position(|&id| id == vocab.eos_id()) {
                assert_eq!(pos, row.len() - 1);
            }
        }
    }

    #[test]
    fn test_state_component_encoder() {
        let vocab = vocab();
        let family = ModelFamily::SequenceGenerator {
            sequence: SequenceMeta::from_vocab(&vocab),
        };
        let mut model =
            Seq2SeqGenerator::new(config(false, Some(vec![2, 1, 3])), &vocab, family, &Device::Cpu).unwrap();
        let inputs = vec![
            vec![vec![1, 0], vec![1], vec![0, 1, -1]],
            vec![vec![0, 1], vec![0], vec![1, 0, 0]],
        ];
        let out = model
            .forward(&batch(&vocab, inputs), ForwardMode::Train { teacher_forcing_ratio: 0.0 })
            .unwrap();
        assert!(out.loss.to_scalar::<f32>().unwrap().is_finite());
        assert!(model.varmap().all_vars().len() > 3);
    }

    #[test]
    fn test_loss_backward_reaches_embedding() {
        let vocab = vocab();
        let family = ModelFamily::SequenceGenerator {
            sequence: SequenceMeta::from_vocab(&vocab),
        };
        for ratio in [0.0, 1.0] {
            let mut model = Seq2SeqGenerator::new(config(true, None), &vocab, family.clone(), &Device::Cpu).unwrap();
            let inputs = vec![vec![vec![1, 0, 1], vec![0, 1, 0]], vec![vec![0, 0, 1], vec![1, 1, 0]]];
            let out = model
                .forward(&batch(&vocab, inputs), ForwardMode::Train { teacher_forcing_ratio: ratio })
                .unwrap();
            let grads = out.loss.backward().unwrap();
            let embedding = model.embedding.embeddings();
            assert!(grads.get(embedding).is_some());
        }
    }
}
