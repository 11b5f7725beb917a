//! One entry point for every model kind.
//!
//! A run is fully described by its [`TrainConfig`]: the model kind selects the
//! history policy, the label style and the network; everything else (loading,
//! batching, the epoch loop) is shared.

use anyhow::{Context, bail};
use dialact_core::{
    Batch, BatchOptions, DictionarySet, StateComponent, TargetVocab, action_width, build_batches,
    schema,
};
use oorandom::Rand64;
use tracing::info;

use crate::checkpoint::{ModelFamily, SequenceMeta};
use crate::config::{ModelKind, TrainConfig};
use crate::data::{
    Frames, SampleStyle, Split, history_windows, load_dictionary, load_split, single_turn,
    to_state_frames,
};
use crate::labels::{LabelCodec, MultiHotLabels, SequenceLabels};
use crate::model::{
    ActionModel, LstmClassifier, MultiLabelClassifier, Seq2SeqConfig, Seq2SeqGenerator,
    select_device,
};
use crate::trainer::{CancelFlag, Splits, TrainReport, Trainer};

/// How a split's states become model inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// Current state only.
    SingleTurn,
    /// The last `n` states of the dialogue.
    Window(usize),
    /// Current state split into one frame per schema component.
    StateComponents { history_turns: i32 },
}

impl HistoryPolicy {
    pub fn for_config(config: &TrainConfig) -> Self {
        match config.model {
            ModelKind::Classifier => HistoryPolicy::SingleTurn,
            ModelKind::LstmClassifier => HistoryPolicy::Window(config.history_turns),
            ModelKind::Seq2seq | ModelKind::Seq2seqAtt if config.single_turn => HistoryPolicy::SingleTurn,
            ModelKind::Seq2seq | ModelKind::Seq2seqAtt => HistoryPolicy::Window(config.history_turns),
            ModelKind::State2seq | ModelKind::State2seqNoAtt => HistoryPolicy::StateComponents {
                history_turns: config.state_history_turns,
            },
        }
    }

    /// Shape every state of `split` into a sample.
    pub fn shape(
        &self,
        split: &Split,
        dict: &DictionarySet,
        schema: &[StateComponent],
    ) -> dialact_core::Result<Vec<Frames>> {
        match self {
            HistoryPolicy::SingleTurn => Ok(single_turn(&split.states)),
            HistoryPolicy::Window(turns) => Ok(history_windows(&split.states, &split.turn_ids, *turns)),
            HistoryPolicy::StateComponents { history_turns } => to_state_frames(
                &split.states,
                dict,
                schema,
                SampleStyle::MultiHot,
                *history_turns,
            ),
        }
    }
}

/// Loaded inputs of a run.
struct Corpus {
    dict: DictionarySet,
    train: Split,
    dev: Split,
    test: Split,
}

impl Corpus {
    fn load(config: &TrainConfig) -> anyhow::Result<Self> {
        let dict = load_dictionary(&config.dict_path)?;
        info!(
            "Dictionary: {} acts, {} user inform slots, {} user request slots",
            dict.diaact.len(),
            dict.user_inform_slot.len(),
            dict.user_request_slot.len()
        );
        Ok(Self {
            dict,
            train: load_split(&config.train_path)?,
            dev: load_split(&config.dev_path)?,
            test: load_split(&config.test_path)?,
        })
    }

    /// Every label vector must be `acts ++ user_inform ++ user_request` wide.
    fn check_label_width(&self) -> anyhow::Result<usize> {
        let expected = action_width(&self.dict);
        for (name, split) in [("train", &self.train), ("dev", &self.dev), ("test", &self.test)] {
            if let Some((index, label)) = split.labels.iter().enumerate().find(|(_, l)| l.len() != expected) {
                bail!(
                    "{name} label {index} has width {}, the dictionary expects {expected} ({} acts + {} inform + {} request slots)",
                    label.len(),
                    self.dict.diaact.len(),
                    self.dict.user_inform_slot.len(),
                    self.dict.user_request_slot.len()
                );
            }
        }
        Ok(expected)
    }
}

/// Shape and batch all three splits.
fn make_splits<L, F>(
    corpus: &Corpus,
    policy: &HistoryPolicy,
    config: &TrainConfig,
    rng: &mut Rand64,
    mut labels: F,
) -> anyhow::Result<Splits<L>>
where
    F: FnMut(&Split) -> dialact_core::Result<Vec<L>>,
{
    let mut batch_split = |name: &str, split: &Split| -> anyhow::Result<Vec<Batch<Frames, L>>> {
        let inputs = policy
            .shape(split, &corpus.dict, &config.state_schema)
            .with_context(|| format!("shaping {name} inputs"))?;
        let labels = labels(split).with_context(|| format!("encoding {name} labels"))?;
        Ok(build_batches(inputs, labels, config.batch_size, BatchOptions::default(), rng)?)
    };
    Ok(Splits {
        train: batch_split("train", &corpus.train)?,
        dev: batch_split("dev", &corpus.dev)?,
        test: batch_split("test", &corpus.test)?,
    })
}

fn fit<M, C>(
    model: M,
    codec: &C,
    config: &TrainConfig,
    splits: Splits<M::Label>,
    cancel: CancelFlag,
    use_accelerator: bool,
) -> anyhow::Result<TrainReport>
where
    M: ActionModel,
    M::Label: Clone,
    C: LabelCodec<Label = M::Label, Prediction = M::Prediction>,
{
    let mut trainer = Trainer::new(model, codec, config, cancel, use_accelerator)?;
    trainer.fit(splits)
}

/// Load data, build the configured model and train it.
pub fn run(config: &TrainConfig, cancel: CancelFlag) -> anyhow::Result<TrainReport> {
    config.validate()?;
    schema::ensure_supported(&config.state_schema)?;

    let corpus = Corpus::load(config)?;
    let device = select_device(config.gpu)?;
    let use_accelerator = !device.is_cpu();
    info!("Model: {}, device: {:?}", config.model, device);

    let policy = HistoryPolicy::for_config(config);
    let mut rng = Rand64::new(u128::from(config.seed));
    let state_width = corpus.train.state_width();
    let label_width = corpus.check_label_width()?;

    match config.model {
        ModelKind::Classifier | ModelKind::LstmClassifier => {
            let codec = MultiHotLabels::new(&corpus.dict);
            let splits = make_splits(&corpus, &policy, config, &mut rng, |s| Ok(s.labels.clone()))?;
            if config.model == ModelKind::Classifier {
                let model = MultiLabelClassifier::new(
                    state_width,
                    config.hidden_dim,
                    label_width,
                    config.dropout,
                    &device,
                )?;
                fit(model, &codec, config, splits, cancel, use_accelerator)
            } else {
                let model = LstmClassifier::new(
                    state_width,
                    config.hidden_dim,
                    label_width,
                    config.depth,
                    config.dropout,
                    &device,
                )?;
                fit(model, &codec, config, splits, cancel, use_accelerator)
            }
        }
        ModelKind::Seq2seq | ModelKind::Seq2seqAtt | ModelKind::State2seq | ModelKind::State2seqNoAtt => {
            let vocab = TargetVocab::build(&corpus.dict);
            let codec = SequenceLabels::new(&corpus.dict, &vocab);
            let splits = make_splits(&corpus, &policy, config, &mut rng, |s| codec.encode_labels(&s.labels))?;
            info!("Target vocabulary: {} tokens", vocab.len());

            let sequence = SequenceMeta::from_vocab(&vocab);
            let (family, component_widths) = match policy {
                HistoryPolicy::StateComponents { .. } => (
                    ModelFamily::StateToSequence {
                        sequence,
                        slot_num: corpus.dict.user_inform_slot.len(),
                        diaact_num: corpus.dict.diaact.len(),
                        embedded_v_size: config.embedded_v_size,
                        state_v_component: config.state_schema.clone(),
                    },
                    Some(
                        config
                            .state_schema
                            .iter()
                            .map(|c| c.width(&corpus.dict))
                            .collect(),
                    ),
                ),
                _ => (ModelFamily::SequenceGenerator { sequence }, None),
            };

            let model = Seq2SeqGenerator::new(
                Seq2SeqConfig {
                    input_size: state_width,
                    hidden_size: config.hidden_dim,
                    depth: config.depth,
                    dropout: config.dropout,
                    max_len: config.max_len,
                    attention: config.model.uses_attention(),
                    component_widths,
                    embedded_v_size: config.embedded_v_size,
                    seed: config.seed,
                },
                &vocab,
                family,
                &device,
            )?;
            fit(model, &codec, config, splits, cancel, use_accelerator)
        }
    }
}
