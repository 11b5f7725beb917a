//! End-to-end runs of the training pipeline on a tiny synthetic corpus.

use std::fs;
use std::path::{Path, PathBuf};

use dialact_core::PredictionRecord;
use dialact_trainer::checkpoint::{checkpoint_paths, load_meta};
use dialact_trainer::{CancelFlag, ModelFamily, ModelKind, TrainConfig, TurnRecord, run};

const DICT_JSON: &str = r#"{
    "id2diaact": {"0": "request", "1": "inform"},
    "diaact2id": {"request": 0, "inform": 1},
    "id2user_inform_slot": {"0": "name", "1": "phone"},
    "user_inform_slot2id": {"name": 0, "phone": 1},
    "id2user_request_slot": {"0": "area", "1": "food"},
    "user_request_slot2id": {"area": 0, "food": 1},
    "id2sys_inform_slot": {"0": "name"},
    "id2sys_request_slot": {"0": "people"}
}"#;

/// A valid 15-wide state vector for turn `t`.
fn state(t: usize) -> Vec<i32> {
    let odd = (t % 2) as i32;
    let mut v = Vec::with_capacity(15);
    v.extend([1, odd]); // goal inform
    v.extend([1 - odd, 1]); // goal request
    v.extend([odd, -1]); // history slots
    v.extend([0, -odd]); // rest slots
    v.extend([odd, 1 - odd]); // system act
    v.push(1); // system inform
    v.push(odd); // system request
    v.extend([1, -1]); // consistency
    v.push(0); // status
    v
}

/// `inform(name)` on even turns, `request(area)` on odd ones.
fn label(t: usize) -> Vec<i32> {
    if t % 2 == 0 {
        vec![0, 1, 1, 0, 0, 0]
    } else {
        vec![1, 0, 0, 0, 1, 0]
    }
}

fn split(dialogues: usize) -> Vec<TurnRecord> {
    (0..dialogues)
        .flat_map(|_| (0..4).map(|t| TurnRecord(state(t), label(t), t)))
        .collect()
}

fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("dict.json"), DICT_JSON).unwrap();
    for (name, dialogues) in [("train", 4), ("dev", 2), ("test", 2)] {
        let json = serde_json::to_string(&split(dialogues)).unwrap();
        fs::write(dir.join(format!("{name}.json")), json).unwrap();
    }
}

fn workdir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dialact_pipeline_{tag}_{}", std::process::id()));
    write_corpus(&dir);
    dir
}

fn config(dir: &Path, model: ModelKind) -> TrainConfig {
    let mut config = TrainConfig::new()
        .with_data_dir(dir)
        .with_model(model)
        .with_model_dir(dir.join("models"))
        .with_model_name(model.name())
        .with_output(dir.join(format!("{}.jsonl", model.name())))
        .with_batch_size(4)
        .with_hidden_dim(8)
        .with_history_turns(2)
        .with_max_epoch(2)
        .with_lr(0.01);
    config.max_len = 8;
    config.embedded_v_size = 4;
    config
}

fn assert_trained(config: &TrainConfig) -> ModelFamily {
    let report = run(config, CancelFlag::new()).unwrap();
    assert_eq!(report.epochs_completed, 2);
    assert!(!report.cancelled);
    assert_eq!(report.checkpoint_epochs.first(), Some(&0));
    assert!(report.history.iter().all(|m| m.train_loss.is_finite()));
    assert!((0.0..=1.0).contains(&report.best_valid_f1));

    let (weights, sidecar) = checkpoint_paths(&config.model_dir, &config.model_name);
    assert!(weights.exists(), "missing {}", weights.display());
    assert!(sidecar.exists(), "missing {}", sidecar.display());

    let dump = fs::read_to_string(config.output.as_ref().unwrap()).unwrap();
    assert!(dump.lines().count() > 0);
    for line in dump.lines() {
        let record: PredictionRecord = serde_json::from_str(line).unwrap();
        assert!(record.split == "dev" || record.split == "test");
    }

    let meta = load_meta(&config.model_dir, &config.model_name).unwrap();
    assert_eq!(meta.config.model, config.model);
    assert_eq!(meta.input_size, 15);
    meta.model
}

#[test]
fn test_classifier_pipeline() {
    let dir = workdir("classifier");
    let family = assert_trained(&config(&dir, ModelKind::Classifier));
    assert_eq!(family, ModelFamily::Classifier { num_tags: 6 });
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_lstm_classifier_pipeline() {
    let dir = workdir("lstm");
    let family = assert_trained(&config(&dir, ModelKind::LstmClassifier));
    assert_eq!(family, ModelFamily::Classifier { num_tags: 6 });
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_seq2seq_pipeline() {
    let dir = workdir("seq2seq");
    let family = assert_trained(&config(&dir, ModelKind::Seq2seqAtt));
    match family {
        ModelFamily::SequenceGenerator { sequence } => {
            // 6 reserved tokens, 2 + 2 slots, 2 acts
            assert_eq!(sequence.tgt_vocab_size, 12);
            assert_eq!(sequence.id2token[sequence.sos_id as usize], "<SOS>");
        }
        other => panic!("unexpected family {other:?}"),
    }
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_state2seq_pipeline() {
    let dir = workdir("state2seq");
    let family = assert_trained(&config(&dir, ModelKind::State2seq));
    match family {
        ModelFamily::StateToSequence {
            slot_num,
            diaact_num,
            state_v_component,
            ..
        } => {
            assert_eq!(slot_num, 2);
            assert_eq!(diaact_num, 2);
            assert_eq!(state_v_component.len(), 9);
        }
        other => panic!("unexpected family {other:?}"),
    }
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_cancelled_run_stops_before_training() {
    let dir = workdir("cancel");
    let config = config(&dir, ModelKind::Classifier);
    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = run(&config, cancel).unwrap();
    assert!(report.cancelled);
    assert_eq!(report.epochs_completed, 0);
    let (weights, _) = checkpoint_paths(&config.model_dir, &config.model_name);
    assert!(!weights.exists());
    fs::remove_dir_all(&dir).ok();
}
