use std::sync::Arc;

use ferrite_backprop::data::{Dataset, HammingCodeDataset};
use ferrite_backprop::train::BatchExecutor;
use ferrite_backprop::{Network, Preset, TrainConfig, Trainer};

#[test]
fn one_and_four_workers_agree_on_batch_gradients() {
    let data = HammingCodeDataset::new(11).unwrap();
    let net = Arc::new(Network::with_seed(&Preset::Hamming.topology(), 11).unwrap());
    let x = Arc::new(data.train_inputs().clone());
    let y = Arc::new(data.train_labels().clone());
    let batch: Vec<usize> = (0..128).map(|i| (i * 37) % 2000).collect();

    let single = BatchExecutor::new(1).unwrap();
    let multi = BatchExecutor::new(4).unwrap();
    let a = single.batch_gradients(&net, &x, &y, &batch).unwrap();
    let b = multi.batch_gradients(&net, &x, &y, &batch).unwrap();

    assert_eq!(a.grads.samples, 128);
    assert!(a.grads.approx_eq(&b.grads, 1e-10));
    assert!(a.grads.averaged().approx_eq(&b.grads.averaged(), 1e-12));
}

#[test]
fn more_workers_than_rows_is_clamped() {
    let data = HammingCodeDataset::new(2).unwrap();
    let net = Arc::new(Network::with_seed(&Preset::Hamming.topology(), 2).unwrap());
    let x = Arc::new(data.train_inputs().clone());
    let y = Arc::new(data.train_labels().clone());
    let batch = [5, 900, 1999];

    let wide = BatchExecutor::new(8).unwrap();
    let inline = BatchExecutor::new(1).unwrap();
    let a = wide.batch_gradients(&net, &x, &y, &batch).unwrap();
    let b = inline.batch_gradients(&net, &x, &y, &batch).unwrap();
    assert!(a.grads.approx_eq(&b.grads, 1e-12));
}

#[test]
fn multithreaded_run_matches_single_threaded_run() {
    let data = HammingCodeDataset::new(4).unwrap();
    let topology = Preset::Hamming.topology();

    let mut finals = Vec::new();
    for workers in [1, 4] {
        let net = Network::with_seed(&topology, 4).unwrap();
        // 2000 rows in batches of 96: the last batch of every epoch is short.
        let config = TrainConfig::new(96, 5, 5, 0.5, workers).with_seed(4);
        let trainer = Trainer::new(
            net,
            data.train_inputs().clone(),
            data.train_labels().clone(),
            data.test_inputs().clone(),
            data.test_labels().clone(),
            config,
        )
        .unwrap();
        let mut run = trainer.run().unwrap();
        let report = run.next().unwrap().unwrap();
        assert_eq!(report.epoch, 5);
        assert!(run.next().is_none());
        finals.push((report, run.into_network()));
    }

    let (r1, n1) = &finals[0];
    let (r4, n4) = &finals[1];
    assert!((r1.test_loss - r4.test_loss).abs() < 1e-9);
    for (a, b) in n1.layers().iter().zip(n4.layers()) {
        assert!(a.weights.approx_eq(&b.weights, 1e-9));
        assert!(a.biases.approx_eq(&b.biases, 1e-9));
    }
}
