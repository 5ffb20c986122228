use serde::{Deserialize, Serialize};
use std::sync::{atomic::AtomicBool, Arc};

use crate::error::{NnError, Result};

/// Hyperparameters for one training run.
///
/// # Fields
/// - `batch_size`    — samples per mini-batch; the last batch of an epoch may be short
/// - `epochs`        — total number of full passes over the training data
/// - `test_every`    — evaluate on the test set every this many epochs
/// - `learning_rate` — SGD step size
/// - `workers`       — threads computing gradient shards; `1` keeps all work
///                     on the calling thread
/// - `seed`          — fixes the shuffle order when set
/// - `stop_flag`     — optional atomic flag; when set to `true` from another
///                     thread the run ends after the current epoch. Not
///                     persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub test_every: usize,
    pub learning_rate: f64,
    pub workers: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(skip)]
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl TrainConfig {
    /// Creates a `TrainConfig` with entropy-seeded shuffling and no stop flag.
    pub fn new(
        batch_size: usize,
        epochs: usize,
        test_every: usize,
        learning_rate: f64,
        workers: usize,
    ) -> Self {
        TrainConfig {
            batch_size,
            epochs,
            test_every,
            learning_rate,
            workers,
            seed: None,
            stop_flag: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("batch_size", self.batch_size),
            ("epochs", self.epochs),
            ("test_every", self.test_every),
            ("workers", self.workers),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, v)| *v == 0) {
            return Err(NnError::InvalidConfig(format!("{name} must be at least 1")));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(NnError::InvalidConfig(format!(
                "learning_rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes and validates a `TrainConfig` from a JSON file.
    pub fn load_json(path: &str) -> Result<TrainConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: TrainConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}
