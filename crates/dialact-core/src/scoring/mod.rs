pub mod generated;
pub mod metrics;
pub mod record;

pub use generated::score_generated;
pub use metrics::{Confusion, Prf, score_multi_hot};
pub use record::{PredictionRecord, score_records};
