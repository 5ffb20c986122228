use thiserror::Error;

/// Every failure the engine can report.
///
/// Shape errors are never retried: they mean the topology and the data
/// disagree, so a training run that hits one is aborted as a whole.
#[derive(Debug, Error)]
pub enum NnError {
    /// A matrix or topology was requested with an impossible shape.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Two operands (or a layer and its input) have incompatible shapes.
    #[error("shape mismatch in {op}: left is {left:?}, right is {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A model file could be read but its contents are not a valid network.
    #[error("corrupt model: {0}")]
    CorruptModel(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A worker thread went away before delivering its shard.
    #[error("worker failure: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, NnError>;

impl NnError {
    pub(crate) fn mismatch(op: &'static str, left: (usize, usize), right: (usize, usize)) -> Self {
        NnError::ShapeMismatch { op, left, right }
    }
}
