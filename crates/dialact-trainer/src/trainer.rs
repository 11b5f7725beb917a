//! Training loop: epochs, validation, best-model checkpointing.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Context;
use candle_core::Var;
use candle_core::backprop::GradStore;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use dialact_core::{Batch, PredictionRecord, Prf, shuffle};
use oorandom::Rand64;
use serde::Serialize;
use tracing::{info, warn};

use crate::checkpoint::{CheckpointMeta, save_checkpoint};
use crate::config::TrainConfig;
use crate::data::Frames;
use crate::labels::LabelCodec;
use crate::model::{ActionModel, ForwardMode};

/// Samples between two progress lines.
const PROGRESS_EVERY: usize = 1024;

/// Shared stop request, checked between epochs.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Best validation F1 seen so far. Only strict improvements count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestTracker {
    best: f64,
}

impl Default for BestTracker {
    fn default() -> Self {
        Self { best: -1e8 }
    }
}

impl BestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value`, returning whether it beat the previous best.
    pub fn observe(&mut self, value: f64) -> bool {
        if value > self.best {
            self.best = value;
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

/// Batched train/dev/test splits for one model.
pub struct Splits<L> {
    pub train: Vec<Batch<Frames, L>>,
    pub dev: Vec<Batch<Frames, L>>,
    pub test: Vec<Batch<Frames, L>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub lr: f64,
    pub train_loss: f64,
    pub valid: Prf,
}

/// Outcome of [`Trainer::fit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainReport {
    pub best_valid_f1: f64,
    /// Test score of the best checkpoint.
    pub test: Prf,
    pub epochs_completed: usize,
    pub cancelled: bool,
    /// Epochs that produced a new checkpoint.
    pub checkpoint_epochs: Vec<usize>,
    pub history: Vec<EpochMetrics>,
}

/// Scale every gradient so the global L2 norm is at most `max_norm`.
///
/// Returns the norm before clipping.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> candle_core::Result<f64> {
    let mut total = 0f64;
    for var in vars {
        if let Some(grad) = grads.get(var.as_tensor()) {
            total += grad.sqr()?.sum_all()?.to_dtype(candle_core::DType::F64)?.to_scalar::<f64>()?;
        }
    }
    let norm = total.sqrt();

    if max_norm > 0.0 && norm > max_norm {
        let scale = max_norm / (norm + 1e-6);
        for var in vars {
            let clipped = match grads.get(var.as_tensor()) {
                Some(grad) => grad.affine(scale, 0.0)?,
                None => continue,
            };
            grads.insert(var.as_tensor(), clipped);
        }
    }
    Ok(norm)
}

/// Drives one model through training and evaluation.
pub struct Trainer<'a, M, C> {
    model: M,
    codec: &'a C,
    config: &'a TrainConfig,
    optimizer: AdamW,
    cancel: CancelFlag,
    rng: Rand64,
    use_accelerator: bool,
}

impl<'a, M, C> Trainer<'a, M, C>
where
    M: ActionModel,
    M::Label: Clone,
    C: LabelCodec<Label = M::Label, Prediction = M::Prediction>,
{
    pub fn new(
        model: M,
        codec: &'a C,
        config: &'a TrainConfig,
        cancel: CancelFlag,
        use_accelerator: bool,
    ) -> anyhow::Result<Self> {
        let optimizer = AdamW::new(
            model.varmap().all_vars(),
            ParamsAdamW {
                lr: config.lr,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;
        Ok(Self {
            model,
            codec,
            config,
            optimizer,
            cancel,
            rng: Rand64::new(u128::from(config.seed) + 1),
            use_accelerator,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Train for up to `max_epoch` epochs, keeping the best dev checkpoint.
    pub fn fit(&mut self, mut splits: Splits<M::Label>) -> anyhow::Result<TrainReport> {
        let batch_size = self.config.batch_size;
        let mut best = BestTracker::new();
        let mut report = TrainReport {
            best_valid_f1: best.best(),
            test: Prf::default(),
            epochs_completed: 0,
            cancelled: false,
            checkpoint_epochs: Vec::new(),
            history: Vec::new(),
        };

        info!(
            "Training {} for up to {} epochs ({} train batches)",
            self.config.model,
            self.config.max_epoch,
            splits.train.len()
        );

        let start = Instant::now();
        let mut iteration = 0usize;
        for epoch in 0..self.config.max_epoch {
            if self.cancel.is_cancelled() {
                warn!("Training cancelled before epoch {}", epoch);
                report.cancelled = true;
                break;
            }

            shuffle(&mut splits.train, &mut self.rng);
            let mut total_loss = 0f64;
            for batch in &splits.train {
                let loss = self.train_step(batch)?;
                total_loss += loss;
                iteration += 1;
                if (iteration * batch_size) % PROGRESS_EVERY == 0 {
                    info!(
                        "Epoch={} iter={} lr={:.6} train_ave_loss={:.6} time={:.1}s",
                        epoch,
                        iteration,
                        self.optimizer.learning_rate(),
                        loss,
                        start.elapsed().as_secs_f32()
                    );
                }
            }
            let train_loss = total_loss / splits.train.len().max(1) as f64;
            let lr = self.optimizer.learning_rate();

            let valid = self.evaluate(&splits.dev, "dev")?;
            info!(
                "Epoch={} iter={} lr={:.6} train_loss={:.6} valid_f1={:.4} valid_p={:.4} valid_r={:.4}",
                epoch, iteration, lr, train_loss, valid.f1, valid.precision, valid.recall
            );

            if best.observe(valid.f1) {
                info!("New record achieved!");
                let meta = CheckpointMeta::new(
                    self.model.spec(),
                    self.config,
                    self.use_accelerator,
                    epoch,
                    valid.f1,
                );
                save_checkpoint(
                    &self.config.model_dir,
                    &self.config.model_name,
                    self.model.varmap(),
                    &meta,
                )?;
                let test = self.evaluate(&splits.test, "test")?;
                info!(
                    "Epoch={} iter={} test_f1={:.4} test_p={:.4} test_r={:.4}",
                    epoch, iteration, test.f1, test.precision, test.recall
                );
                report.test = test;
                report.checkpoint_epochs.push(epoch);
            }

            report.history.push(EpochMetrics {
                epoch,
                lr,
                train_loss,
                valid,
            });
            report.epochs_completed = epoch + 1;

            if self.config.lr_decay > 0.0 {
                self.optimizer.set_learning_rate(lr * self.config.lr_decay);
            }
        }

        report.best_valid_f1 = best.best();
        info!(
            "best_valid_f1={:.4} test_f1={:.4}",
            report.best_valid_f1, report.test.f1
        );
        Ok(report)
    }

    fn train_step(&mut self, batch: &Batch<Frames, M::Label>) -> anyhow::Result<f64> {
        let mode = ForwardMode::Train {
            teacher_forcing_ratio: self.config.teacher_forcing_ratio,
        };
        let output = self.model.forward(batch, mode)?;
        let mut grads = output.loss.backward()?;
        if self.config.clip_grad > 0.0 {
            clip_grad_norm(&mut grads, &self.model.varmap().all_vars(), self.config.clip_grad)?;
        }
        self.optimizer.step(&grads)?;
        Ok(f64::from(output.loss.to_scalar::<f32>()?))
    }

    /// Score the model on `batches`, writing the prediction dump when configured.
    pub fn evaluate(&mut self, batches: &[Batch<Frames, M::Label>], split: &str) -> anyhow::Result<Prf> {
        let mut predictions = Vec::new();
        let mut golds = Vec::new();
        for batch in batches {
            let output = self.model.forward(batch, ForwardMode::Eval)?;
            predictions.extend(output.predictions);
            golds.extend(batch.labels.iter().cloned());
        }

        let prf = self
            .codec
            .score(&predictions, &golds)
            .with_context(|| format!("scoring {split} split"))?;

        if let Some(path) = &self.config.output {
            self.write_dump(path, split, &predictions, &golds)?;
        }
        Ok(prf)
    }

    fn write_dump(
        &self,
        path: &Path,
        split: &str,
        predictions: &[M::Prediction],
        golds: &[M::Label],
    ) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for (prediction, gold) in predictions.iter().zip(golds) {
            let record = PredictionRecord {
                split: split.to_string(),
                pred: self.codec.describe_prediction(prediction)?,
                gold: self.codec.describe_gold(gold)?,
            };
            serde_json::to_writer(&mut writer, &record)?;
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}
