//! Train a dialogue-action model.
//!
//! Ctrl-C stops the run after the current epoch; the best checkpoint so far
//! stays on disk.

use std::path::PathBuf;

use clap::Parser;
use dialact_core::STATE_SCHEMA_V1;
use dialact_trainer::{CancelFlag, ModelKind, TrainConfig, run};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train a user-simulator action model on vectorized dialogue turns")]
#[command(version)]
struct Cli {
    /// Model to train
    #[arg(short, long, env = "DIALACT_MODEL", value_enum, default_value_t = ModelKind::Seq2seqAtt)]
    model: ModelKind,

    /// Training split
    #[arg(long, env = "DIALACT_TRAIN_PATH", default_value = "data/train.json")]
    train_path: PathBuf,

    /// Validation split
    #[arg(long, env = "DIALACT_DEV_PATH", default_value = "data/dev.json")]
    dev_path: PathBuf,

    /// Test split
    #[arg(long, env = "DIALACT_TEST_PATH", default_value = "data/test.json")]
    test_path: PathBuf,

    /// Dictionary file
    #[arg(long, env = "DIALACT_DICT_PATH", default_value = "data/dict.json")]
    dict_path: PathBuf,

    /// Prediction dump (JSON lines)
    #[arg(short, long, env = "DIALACT_OUTPUT")]
    output: Option<PathBuf>,

    /// Checkpoint directory
    #[arg(long, env = "DIALACT_MODEL_DIR", default_value = "models")]
    model_dir: PathBuf,

    /// Checkpoint file stem
    #[arg(long, env = "DIALACT_MODEL_NAME", default_value = "action_generator")]
    model_name: String,

    /// Feed only the current turn to sequence generators
    #[arg(long, env = "DIALACT_SINGLE_TURN")]
    single_turn: bool,

    /// Turns per history window
    #[arg(long, env = "DIALACT_HISTORY_TURNS", default_value_t = 5)]
    history_turns: usize,

    #[arg(short, long, env = "DIALACT_BATCH_SIZE", default_value_t = 32)]
    batch_size: usize,

    #[arg(long, env = "DIALACT_HIDDEN_DIM", default_value_t = 128)]
    hidden_dim: usize,

    /// Stacked encoder layers
    #[arg(long, env = "DIALACT_DEPTH", default_value_t = 1)]
    depth: usize,

    #[arg(long, env = "DIALACT_DROPOUT", default_value_t = 0.1)]
    dropout: f32,

    /// Longest generated sequence
    #[arg(long, env = "DIALACT_MAX_LEN", default_value_t = 20)]
    max_len: usize,

    /// Per-component projection size (state2seq)
    #[arg(long, env = "DIALACT_EMBEDDED_V_SIZE", default_value_t = 32)]
    embedded_v_size: usize,

    #[arg(long, env = "DIALACT_LR", default_value_t = 1e-3)]
    lr: f64,

    /// Per-epoch learning-rate factor, 0 to disable
    #[arg(long, env = "DIALACT_LR_DECAY", default_value_t = 0.0)]
    lr_decay: f64,

    #[arg(short = 'e', long, env = "DIALACT_MAX_EPOCH", default_value_t = 100)]
    max_epoch: usize,

    /// Gradient-norm ceiling, 0 to disable
    #[arg(long, env = "DIALACT_CLIP_GRAD", default_value_t = 5.0)]
    clip_grad: f64,

    #[arg(long, env = "DIALACT_TEACHER_FORCING", default_value_t = 0.5)]
    teacher_forcing_ratio: f64,

    /// CUDA device, negative for CPU
    #[arg(long, env = "DIALACT_GPU", default_value_t = -1, allow_hyphen_values = true)]
    gpu: i32,

    #[arg(long, env = "DIALACT_SEED", default_value_t = 1234)]
    seed: u64,
}

impl Cli {
    fn into_config(self) -> TrainConfig {
        TrainConfig {
            train_path: self.train_path,
            dev_path: self.dev_path,
            test_path: self.test_path,
            dict_path: self.dict_path,
            output: self.output,
            model_dir: self.model_dir,
            model_name: self.model_name,
            model: self.model,
            single_turn: self.single_turn,
            history_turns: self.history_turns,
            state_history_turns: 1,
            batch_size: self.batch_size,
            hidden_dim: self.hidden_dim,
            depth: self.depth,
            dropout: self.dropout,
            max_len: self.max_len,
            embedded_v_size: self.embedded_v_size,
            lr: self.lr,
            lr_decay: self.lr_decay,
            max_epoch: self.max_epoch,
            clip_grad: self.clip_grad,
            teacher_forcing_ratio: self.teacher_forcing_ratio,
            gpu: self.gpu,
            seed: self.seed,
            state_schema: STATE_SCHEMA_V1.to_vec(),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Cli::parse().into_config();
    let cancel = CancelFlag::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current epoch");
            on_interrupt.cancel();
        }
    });

    let result = tokio::task::spawn_blocking(move || run(&config, cancel)).await;
    match result {
        Ok(Ok(report)) => {
            info!(
                "Finished after {} epochs: best_valid_f1={:.4} test_f1={:.4}{}",
                report.epochs_completed,
                report.best_valid_f1,
                report.test.f1,
                if report.cancelled { " (cancelled)" } else { "" }
            );
        }
        Ok(Err(e)) => {
            eprintln!("Training failed: {e:#}");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Training task aborted: {}", e);
            eprintln!("Training failed: {e}");
            std::process::exit(1);
        }
    }
}
