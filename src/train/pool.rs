use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::error::{NnError, Result};
use crate::loss::mse::MseLoss;
use crate::math::matrix::Matrix;
use crate::network::gradients::Gradients;
use crate::network::network::Network;

/// Gradient sum and squared error for one shard of a batch.
#[derive(Debug, Clone)]
pub struct ShardOutcome {
    pub grads: Gradients,
    pub squared_error: f64,
}

impl ShardOutcome {
    fn merge(&mut self, other: &ShardOutcome) -> Result<()> {
        self.grads.accumulate(&other.grads)?;
        self.squared_error += other.squared_error;
        Ok(())
    }
}

/// Forward + backward over `rows` of the training set, summed over the rows.
pub fn shard_gradients(
    network: &Network,
    inputs: &Matrix,
    labels: &Matrix,
    rows: &[usize],
) -> Result<ShardOutcome> {
    let x = inputs.select_rows(rows)?;
    let y = labels.select_rows(rows)?;
    let pass = network.forward_pass(&x)?;
    let squared_error = MseLoss::squared_error_sum(pass.output(), &y)?;
    let grads = network.backward_sum(&pass, &y)?;
    Ok(ShardOutcome {
        grads,
        squared_error,
    })
}

/// Splits `batch` into `min(workers, batch.len())` contiguous pieces whose
/// lengths differ by at most one.
pub fn split_shards(batch: &[usize], workers: usize) -> Vec<&[usize]> {
    let count = workers.clamp(1, batch.len().max(1));
    let base = batch.len() / count;
    let extra = batch.len() % count;
    let mut shards = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let len = base + usize::from(i < extra);
        shards.push(&batch[start..start + len]);
        start += len;
    }
    shards
}

type Reply = (usize, Result<ShardOutcome>);

struct ShardJob {
    index: usize,
    network: Arc<Network>,
    inputs: Arc<Matrix>,
    labels: Arc<Matrix>,
    rows: Vec<usize>,
    reply: Sender<Reply>,
}

/// Fixed set of long-lived gradient workers.
///
/// Each worker owns its own job channel so shard `i` always lands on worker
/// `i`. A job carries an `Arc` snapshot of the network; the worker drops it
/// before replying, so once the coordinator has every reply it is again the
/// sole owner and can update the weights in place.
pub struct WorkerPool {
    senders: Vec<Sender<ShardJob>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<WorkerPool> {
        if workers == 0 {
            return Err(NnError::InvalidConfig("worker pool needs at least one thread".to_string()));
        }
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let (tx, rx) = mpsc::channel::<ShardJob>();
            let handle = thread::Builder::new()
                .name(format!("ferrite-worker-{id}"))
                .spawn(move || worker_loop(id, rx))?;
            senders.push(tx);
            handles.push(handle);
        }
        debug!(workers, "worker pool started");
        Ok(WorkerPool { senders, handles })
    }

    pub fn size(&self) -> usize {
        self.senders.len()
    }

    /// Runs one shard per worker and blocks until all of them have answered.
    /// Outcomes come back in shard order.
    pub fn dispatch(
        &self,
        network: &Arc<Network>,
        inputs: &Arc<Matrix>,
        labels: &Arc<Matrix>,
        shards: &[&[usize]],
    ) -> Result<Vec<ShardOutcome>> {
        if shards.len() > self.senders.len() {
            return Err(NnError::Worker(format!(
                "{} shards for {} workers",
                shards.len(),
                self.senders.len()
            )));
        }

        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();
        for (index, (rows, sender)) in shards.iter().zip(&self.senders).enumerate() {
            let job = ShardJob {
                index,
                network: Arc::clone(network),
                inputs: Arc::clone(inputs),
                labels: Arc::clone(labels),
                rows: rows.to_vec(),
                reply: reply_tx.clone(),
            };
            sender
                .send(job)
                .map_err(|_| NnError::Worker(format!("worker {index} is gone")))?;
        }
        drop(reply_tx);

        let mut slots: Vec<Option<Result<ShardOutcome>>> = (0..shards.len()).map(|_| None).collect();
        for _ in 0..shards.len() {
            let (index, outcome) = reply_rx
                .recv()
                .map_err(|_| NnError::Worker("a worker exited before returning its shard".to_string()))?;
            slots[index] = Some(outcome);
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(NnError::Worker("missing shard reply".to_string()))))
            .collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the job channels ends every worker loop.
        self.senders.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(id: usize, jobs: Receiver<ShardJob>) {
    while let Ok(job) = jobs.recv() {
        let ShardJob {
            index,
            network,
            inputs,
            labels,
            rows,
            reply,
        } = job;
        let outcome = shard_gradients(&network, &inputs, &labels, &rows);
        drop(network);
        drop(inputs);
        drop(labels);
        trace!(worker = id, shard = index, rows = rows.len(), "shard done");
        let _ = reply.send((index, outcome));
    }
}

/// Computes the summed gradient of one batch, inline or across a pool.
pub enum BatchExecutor {
    Inline,
    Pool(WorkerPool),
}

impl BatchExecutor {
    /// `workers <= 1` never spawns threads.
    pub fn new(workers: usize) -> Result<BatchExecutor> {
        if workers <= 1 {
            Ok(BatchExecutor::Inline)
        } else {
            Ok(BatchExecutor::Pool(WorkerPool::new(workers)?))
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            BatchExecutor::Inline => 1,
            BatchExecutor::Pool(pool) => pool.size(),
        }
    }

    /// Summed (not averaged) gradient over `batch`, reduced in shard order.
    pub fn batch_gradients(
        &self,
        network: &Arc<Network>,
        inputs: &Arc<Matrix>,
        labels: &Arc<Matrix>,
        batch: &[usize],
    ) -> Result<ShardOutcome> {
        let pool = match self {
            BatchExecutor::Pool(pool) if batch.len() > 1 => pool,
            _ => return shard_gradients(network, inputs, labels, batch),
        };

        let shards = split_shards(batch, pool.size());
        let mut outcomes = pool.dispatch(network, inputs, labels, &shards)?.into_iter();
        let mut total = outcomes
            .next()
            .ok_or_else(|| NnError::Worker("no shard outcomes".to_string()))?;
        for outcome in outcomes {
            total.merge(&outcome)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction::{ReLU, Sigmoid};
    use crate::network::topology::Topology;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixture() -> (Arc<Network>, Arc<Matrix>, Arc<Matrix>) {
        let mut rng = StdRng::seed_from_u64(21);
        let topology = Topology::new(5, 3, vec![8, 6], vec![ReLU, Sigmoid, Sigmoid]);
        let net = Network::with_rng(&topology, &mut rng).unwrap();
        let x = Matrix::random(37, 5, &mut rng);
        let y = Matrix::random(37, 3, &mut rng).map(|v| (v + 1.0) / 2.0);
        (Arc::new(net), Arc::new(x), Arc::new(y))
    }

    #[test]
    fn split_shards_is_near_equal_and_complete() {
        let batch: Vec<usize> = (0..10).collect();
        let shards = split_shards(&batch, 4);
        let lens: Vec<usize> = shards.iter().map(|s| s.len()).collect();
        assert_eq!(lens, vec![3, 3, 2, 2]);
        assert_eq!(shards.concat(), batch);

        // More workers than rows: one row per shard.
        assert_eq!(split_shards(&batch[..3], 8).len(), 3);
        assert_eq!(split_shards(&batch, 1), vec![&batch[..]]);
    }

    #[test]
    fn pooled_gradients_match_inline() {
        let (net, x, y) = fixture();
        let batch: Vec<usize> = (0..37).rev().collect();
        let inline = BatchExecutor::new(1).unwrap();
        let pooled = BatchExecutor::new(4).unwrap();
        assert_eq!(pooled.workers(), 4);

        let a = inline.batch_gradients(&net, &x, &y, &batch).unwrap();
        let b = pooled.batch_gradients(&net, &x, &y, &batch).unwrap();
        assert_eq!(b.grads.samples, 37);
        assert!(a.grads.approx_eq(&b.grads, 1e-12));
        assert!((a.squared_error - b.squared_error).abs() < 1e-12);
    }

    #[test]
    fn workers_release_network_snapshot() {
        let (net, x, y) = fixture();
        let pool = BatchExecutor::new(3).unwrap();
        let batch: Vec<usize> = (0..12).collect();
        pool.batch_gradients(&net, &x, &y, &batch).unwrap();
        assert_eq!(Arc::strong_count(&net), 1);
    }

    #[test]
    fn shard_errors_propagate() {
        let (net, x, _) = fixture();
        let wrong_labels = Arc::new(Matrix::zeros(37, 2));
        let pool = BatchExecutor::new(2).unwrap();
        let batch: Vec<usize> = (0..8).collect();
        assert!(matches!(
            pool.batch_gradients(&net, &x, &wrong_labels, &batch),
            Err(NnError::ShapeMismatch { .. })
        ));
    }
}
