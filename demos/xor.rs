use ferrite_backprop::{
    train, ActivationFunction, Matrix, Network, Topology, TrainConfig, TrainingReport,
};

fn main() -> ferrite_backprop::Result<()> {
    let topology = Topology::new(
        2,
        1,
        vec![2],
        vec![ActivationFunction::Sigmoid, ActivationFunction::Sigmoid],
    );
    let mut network = Network::new(&topology)?;

    let inputs = Matrix::from_rows(&[
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ])?;
    let expected_outputs = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![1.0], vec![0.0]])?;

    // batch_size, epochs, test_every, learning_rate, workers
    let config = TrainConfig::new(4, 20_000, 2_000, 1.0, 1);

    train(
        &mut network,
        &inputs,
        &expected_outputs,
        &inputs,
        &expected_outputs,
        &config,
        &mut |r: &TrainingReport| println!("Epoch {}: loss = {:.6}", r.epoch, r.test_loss),
    )?;

    let outputs = network.forward(&inputs)?;
    for row in 0..inputs.rows() {
        println!("Input: {:?} -> Output: {:.4}", inputs.row(row), outputs[(row, 0)]);
    }
    Ok(())
}
