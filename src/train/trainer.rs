use std::iter::FusedIterator;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, trace, warn};

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;
use crate::network::network::Network;
use crate::optim::sgd::Sgd;
use crate::train::pool::BatchExecutor;
use crate::train::report::TrainingReport;
use crate::train::train_config::TrainConfig;

/// Lifecycle of a training run.
///
/// Each epoch walks `Epoch`, then `Batching → Dispatch → Aggregate → Update`
/// once per mini-batch, then `Evaluate` when a report is due. Between calls
/// to `next` the run rests in `Idle` or in a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting for the caller to pull the next report.
    Idle,
    /// Shuffling the row order for a new epoch.
    Epoch,
    /// Cutting the next mini-batch out of the shuffled order.
    Batching,
    /// Shards are out with the workers (or running inline).
    Dispatch,
    /// Reducing shard gradients into the batch mean.
    Aggregate,
    /// Applying the SGD step.
    Update,
    /// Scoring the test set.
    Evaluate,
    /// Every requested epoch completed.
    Finished,
    /// Ended early through the stop flag or a departed report consumer.
    Stopped,
    /// A forward/backward or worker error ended the run.
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Finished | RunState::Stopped | RunState::Aborted)
    }
}

/// A validated network + dataset + config, ready to run.
pub struct Trainer {
    network: Network,
    train_inputs: Matrix,
    train_labels: Matrix,
    test_inputs: Matrix,
    test_labels: Matrix,
    config: TrainConfig,
}

impl Trainer {
    pub fn new(
        network: Network,
        train_inputs: Matrix,
        train_labels: Matrix,
        test_inputs: Matrix,
        test_labels: Matrix,
        config: TrainConfig,
    ) -> Result<Trainer> {
        config.validate()?;
        check_pair(&network, &train_inputs, &train_labels, "training set")?;
        check_pair(&network, &test_inputs, &test_labels, "test set")?;
        Ok(Trainer {
            network,
            train_inputs,
            train_labels,
            test_inputs,
            test_labels,
            config,
        })
    }

    /// Starts the worker pool and returns the lazy report stream.
    pub fn run(self) -> Result<TrainingRun> {
        let optimizer = Sgd::new(self.config.learning_rate)?;
        let executor = BatchExecutor::new(self.config.workers)?;
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let indices = (0..self.train_inputs.rows()).collect();

        info!(
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            learning_rate = self.config.learning_rate,
            workers = executor.workers(),
            train_rows = self.train_inputs.rows(),
            test_rows = self.test_inputs.rows(),
            "training started"
        );

        Ok(TrainingRun {
            network: Arc::new(self.network),
            train_inputs: Arc::new(self.train_inputs),
            train_labels: Arc::new(self.train_labels),
            test_inputs: self.test_inputs,
            test_labels: self.test_labels,
            config: self.config,
            optimizer,
            executor,
            rng,
            indices,
            epoch: 0,
            state: RunState::Idle,
            started: None,
        })
    }
}

fn check_pair(network: &Network, inputs: &Matrix, labels: &Matrix, what: &'static str) -> Result<()> {
    if inputs.rows() != labels.rows() {
        return Err(NnError::mismatch(what, inputs.shape(), labels.shape()));
    }
    if inputs.cols() != network.input_size() {
        return Err(NnError::mismatch(
            "network input",
            inputs.shape(),
            (inputs.rows(), network.input_size()),
        ));
    }
    if labels.cols() != network.output_size() {
        return Err(NnError::mismatch(
            "network output",
            labels.shape(),
            (labels.rows(), network.output_size()),
        ));
    }
    Ok(())
}

/// An in-progress training run.
///
/// Iterating advances epochs until the next report is due, so the caller
/// drives the pace. The sequence is finite and cannot be restarted; after
/// an error it yields that error once and then ends.
pub struct TrainingRun {
    network: Arc<Network>,
    train_inputs: Arc<Matrix>,
    train_labels: Arc<Matrix>,
    test_inputs: Matrix,
    test_labels: Matrix,
    config: TrainConfig,
    optimizer: Sgd,
    executor: BatchExecutor,
    rng: StdRng,
    indices: Vec<usize>,
    epoch: usize,
    state: RunState,
    started: Option<Instant>,
}

impl TrainingRun {
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn epochs_completed(&self) -> usize {
        self.epoch
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Ends the run; the next call to `next` returns `None`.
    pub fn stop(&mut self) {
        if !self.state.is_terminal() {
            self.state = RunState::Stopped;
        }
    }

    /// Shuts the workers down and hands back the trained network.
    pub fn into_network(self) -> Network {
        let TrainingRun { network, executor, .. } = self;
        drop(executor);
        Arc::try_unwrap(network).unwrap_or_else(|shared| (*shared).clone())
    }

    /// One shuffled pass over the training set. Returns the epoch's mean
    /// squared error.
    fn run_epoch(&mut self) -> Result<f64> {
        self.enter(RunState::Epoch);
        self.indices.shuffle(&mut self.rng);
        let mut squared_error = 0.0;
        let batch_size = self.config.batch_size;

        for start in (0..self.indices.len()).step_by(batch_size) {
            self.enter(RunState::Batching);
            let end = (start + batch_size).min(self.indices.len());

            self.enter(RunState::Dispatch);
            let outcome = self.executor.batch_gradients(
                &self.network,
                &self.train_inputs,
                &self.train_labels,
                &self.indices[start..end],
            )?;

            self.enter(RunState::Aggregate);
            squared_error += outcome.squared_error;
            let grads = outcome.grads.averaged();

            self.enter(RunState::Update);
            // Every worker has dropped its snapshot by now, so this does not clone.
            let network = Arc::make_mut(&mut self.network);
            self.optimizer.step(network, &grads)?;
        }

        let values = self.train_inputs.rows() * self.train_labels.cols();
        Ok(squared_error / values as f64)
    }

    fn enter(&mut self, state: RunState) {
        trace!(epoch = self.epoch + 1, state = ?state, "run state");
        self.state = state;
    }

    fn stop_requested(&self) -> bool {
        self.config
            .stop_flag
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    fn abort(&mut self, err: NnError) -> Option<Result<TrainingReport>> {
        warn!(epoch = self.epoch + 1, error = %err, "training aborted");
        self.state = RunState::Aborted;
        Some(Err(err))
    }
}

impl Iterator for TrainingRun {
    type Item = Result<TrainingReport>;

    fn next(&mut self) -> Option<Self::Item> {
        let started = *self.started.get_or_insert_with(Instant::now);

        loop {
            if self.state.is_terminal() {
                return None;
            }
            if self.stop_requested() {
                info!(epoch = self.epoch, "training stopped");
                self.state = RunState::Stopped;
                return None;
            }

            let train_loss = match self.run_epoch() {
                Ok(loss) => loss,
                Err(err) => return self.abort(err),
            };
            self.epoch += 1;
            debug!(epoch = self.epoch, train_loss, "epoch done");

            let last = self.epoch == self.config.epochs;
            if self.epoch % self.config.test_every != 0 && !last {
                continue;
            }

            self.enter(RunState::Evaluate);
            let eval = match self.network.evaluate(&self.test_inputs, &self.test_labels) {
                Ok(eval) => eval,
                Err(err) => return self.abort(err),
            };
            self.state = if last { RunState::Finished } else { RunState::Idle };

            let report = TrainingReport {
                epoch: self.epoch,
                total_epochs: self.config.epochs,
                train_loss,
                test_loss: eval.loss,
                test_accuracy: eval.accuracy,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            info!(
                epoch = report.epoch,
                train_loss = report.train_loss,
                test_loss = report.test_loss,
                test_accuracy = report.test_accuracy,
                "evaluation"
            );
            if last {
                info!(epochs = self.epoch, elapsed_ms = report.elapsed_ms, "training finished");
            }
            return Some(Ok(report));
        }
    }
}

impl FusedIterator for TrainingRun {}
