use thiserror::Error;

/// Errors raised by the dialact codecs, scorer and batch builder.
///
/// Every variant is fatal: the caller is expected to abort the run. Noisy
/// but recoverable conditions (extra dialogue acts, malformed generated
/// pairs) never surface here, they are only logged.
#[derive(Debug, Error)]
pub enum DialactError {
    /// The runtime state schema differs from the supported reference schema.
    #[error("state schema mismatch (supported v{version}): expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        /// Version of the reference schema.
        version: u32,
        /// Component names of the reference schema.
        expected: Vec<String>,
        /// Component names that were supplied.
        found: Vec<String>,
    },

    /// A schema component name could not be recognised.
    #[error("unknown state component: {0:?}")]
    UnknownComponent(String),

    /// The state vector does not span exactly the schema's total width.
    #[error("state vector has length {found}, schema requires {expected}")]
    StateLengthMismatch {
        /// Total width of all schema components.
        expected: usize,
        /// Length of the supplied vector.
        found: usize,
    },

    /// A component held a value outside its allowed value set.
    #[error("invalid value {value} at index {index} of component `{component}`")]
    InvalidComponentValue {
        /// Component name.
        component: &'static str,
        /// Position inside the component.
        index: usize,
        /// Offending value.
        value: i32,
    },

    /// `dialog_status_v` carried a code that is not -1, 0 or 1.
    #[error("unknown dialog status code: {0}")]
    UnknownStatusCode(i32),

    /// A fired position has no token in the corresponding vocabulary.
    #[error("id {id} is out of range for the `{vocab}` vocabulary (size {size})")]
    UnknownId {
        /// Vocabulary name.
        vocab: &'static str,
        /// Offending id.
        id: usize,
        /// Vocabulary size.
        size: usize,
    },

    /// A token was not found in the target vocabulary while encoding.
    #[error("token {0:?} is not in the target vocabulary")]
    UnknownToken(String),

    /// A predicted/gold label pair has different lengths.
    #[error("label length mismatch at sample {index}: predicted {predicted}, gold {gold}")]
    LengthMismatch {
        /// Sample position.
        index: usize,
        /// Predicted vector length.
        predicted: usize,
        /// Gold vector length.
        gold: usize,
    },

    /// Predictions and golds hold a different number of samples.
    #[error("sample count mismatch: {predicted} predictions, {gold} golds")]
    CountMismatch {
        /// Number of predictions.
        predicted: usize,
        /// Number of golds.
        gold: usize,
    },

    /// A multi-hot label held a value outside {0, 1}.
    #[error("invalid multi-hot value {value} at sample {index}, position {position}")]
    InvalidLabelValue {
        /// Sample position.
        index: usize,
        /// Position inside the label vector.
        position: usize,
        /// Offending value.
        value: i32,
    },

    /// Batches cannot be built with a zero batch size.
    #[error("batch size must be positive")]
    ZeroBatchSize,

    /// Inputs and labels have a different number of samples.
    #[error("{inputs} inputs but {labels} labels")]
    SampleMismatch {
        /// Number of inputs.
        inputs: usize,
        /// Number of labels.
        labels: usize,
    },

    /// The dictionary file is structurally invalid.
    #[error("malformed dictionary: {0}")]
    MalformedDictionary(String),

    /// The requested input style / history combination is not supported.
    #[error("unsupported input style {style:?} with history_turns={history_turns}")]
    UnsupportedInputStyle {
        /// Requested sample style.
        style: String,
        /// Requested history length.
        history_turns: i32,
    },

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for dialact operations.
pub type Result<T> = std::result::Result<T, DialactError>;
