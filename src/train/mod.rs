pub mod loop_fn;
pub mod pool;
pub mod report;
pub mod train_config;
pub mod trainer;

pub use loop_fn::{train, TrainingSummary};
pub use pool::{BatchExecutor, ShardOutcome, WorkerPool};
pub use report::{ReportSink, TrainingReport};
pub use train_config::TrainConfig;
pub use trainer::{RunState, Trainer, TrainingRun};
