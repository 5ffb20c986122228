use crate::error::Result;
use crate::math::matrix::Matrix;
use crate::network::network::Network;
use crate::train::report::{ReportSink, TrainingReport};
use crate::train::train_config::TrainConfig;
use crate::train::trainer::{RunState, Trainer};

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// How a blocking `train` call ended.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub state: RunState,
    pub epochs_completed: usize,
    pub last_report: Option<TrainingReport>,
}

/// Trains `network` in place with mini-batch SGD and blocks until done.
///
/// # Arguments
/// - `network`      — modified in place; also written back when the run aborts
/// - `train_*`      — training pair, one sample per row
/// - `test_*`       — held-out pair evaluated every `config.test_every` epochs
/// - `config`       — hyperparameters, optional seed and stop flag
/// - `sink`         — receives every `TrainingReport` as it is produced
///
/// # Early termination
/// The run ends before `config.epochs` if:
/// - the sink reports that its consumer is gone (e.g. a dropped channel), **or**
/// - `config.stop_flag` is set to `true`.
///
/// # Errors
/// Invalid config or mismatched data fail before any epoch runs. A shape or
/// worker error during an epoch aborts the whole run and is returned.
pub fn train<S>(
    network: &mut Network,
    train_inputs: &Matrix,
    train_labels: &Matrix,
    test_inputs: &Matrix,
    test_labels: &Matrix,
    config: &TrainConfig,
    sink: &mut S,
) -> Result<TrainingSummary>
where
    S: ReportSink + ?Sized,
{
    let trainer = Trainer::new(
        network.clone(),
        train_inputs.clone(),
        train_labels.clone(),
        test_inputs.clone(),
        test_labels.clone(),
        config.clone(),
    )?;
    let mut run = trainer.run()?;

    let mut last_report = None;
    let mut failure = None;
    while let Some(item) = run.next() {
        match item {
            Ok(report) => {
                let keep_going = sink.report(&report);
                last_report = Some(report);
                if !keep_going {
                    run.stop();
                    break;
                }
            }
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    let state = run.state();
    let epochs_completed = run.epochs_completed();
    *network = run.into_network();

    match failure {
        Some(err) => Err(err),
        None => Ok(TrainingSummary {
            state,
            epochs_completed,
            last_report,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction::Sigmoid;
    use crate::network::topology::Topology;
    use std::sync::mpsc;

    fn data() -> (Matrix, Matrix) {
        let x = Matrix::from_vec(4, 2, vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0]).unwrap();
        let y = Matrix::from_vec(4, 1, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
        (x, y)
    }

    #[test]
    fn closure_sink_sees_every_report() {
        let (x, y) = data();
        let mut net = Network::with_seed(&Topology::new(2, 1, vec![2], vec![Sigmoid, Sigmoid]), 1).unwrap();
        let before = net.clone();
        let mut seen = Vec::new();
        let summary = train(
            &mut net,
            &x,
            &y,
            &x,
            &y,
            &TrainConfig::new(4, 6, 2, 1.0, 1),
            &mut |r: &TrainingReport| seen.push(r.epoch),
        )
        .unwrap();
        assert_eq!(seen, vec![2, 4, 6]);
        assert_eq!(summary.state, RunState::Finished);
        assert_eq!(summary.last_report.map(|r| r.epoch), Some(6));
        assert_ne!(net, before);
    }

    #[test]
    fn dropped_receiver_stops_the_run() {
        let (x, y) = data();
        let mut net = Network::with_seed(&Topology::new(2, 1, vec![2], vec![Sigmoid, Sigmoid]), 1).unwrap();
        let (mut tx, rx) = mpsc::channel::<TrainingReport>();
        drop(rx);
        let summary = train(&mut net, &x, &y, &x, &y, &TrainConfig::new(4, 50, 1, 1.0, 1), &mut tx).unwrap();
        assert_eq!(summary.state, RunState::Stopped);
        assert_eq!(summary.epochs_completed, 1);
    }

    #[test]
    fn channel_sink_receives_reports() {
        let (x, y) = data();
        let mut net = Network::with_seed(&Topology::new(2, 1, vec![2], vec![Sigmoid, Sigmoid]), 4).unwrap();
        let (mut tx, rx) = mpsc::channel::<TrainingReport>();
        train(&mut net, &x, &y, &x, &y, &TrainConfig::new(2, 3, 1, 1.0, 2), &mut tx).unwrap();
        drop(tx);
        let epochs: Vec<usize> = rx.iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, vec![1, 2, 3]);
    }
}
