//! Training pipeline: split policies, batch iteration, metrics and the fit
//! loop.

pub mod data;
pub mod metrics;
pub mod trainer;

pub use data::{AssignedSplit, BatchIterator, DataSplit, ShuffledSplit, SplitPolicy};
pub use metrics::EpochMetrics;
pub use trainer::{train, TrainConfig};
