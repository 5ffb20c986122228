use serde::{Deserialize, Serialize};
use std::sync::mpsc;

/// Evaluation record emitted by a training run.
///
/// One is produced every `test_every` epochs and once more at the final
/// epoch if it does not fall on that cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean squared error over the training samples of this epoch, measured
    /// during the forward passes that fed the updates.
    pub train_loss: f64,
    /// Mean squared error on the test set after this epoch.
    pub test_loss: f64,
    /// Fraction of test rows predicted correctly, in [0, 1].
    pub test_accuracy: f64,
    /// Wall-clock milliseconds since the run started.
    pub elapsed_ms: u64,
}

/// Where `train` delivers reports.
///
/// `report` returns `false` when the consumer has gone away; the run then
/// stops after the current epoch.
pub trait ReportSink {
    fn report(&mut self, report: &TrainingReport) -> bool;
}

impl<F> ReportSink for F
where
    F: FnMut(&TrainingReport),
{
    fn report(&mut self, report: &TrainingReport) -> bool {
        self(report);
        true
    }
}

/// Sends a copy of each report; a dropped receiver ends the run.
impl ReportSink for mpsc::Sender<TrainingReport> {
    fn report(&mut self, report: &TrainingReport) -> bool {
        self.send(report.clone()).is_ok()
    }
}
