use ferrite_backprop::data::{Dataset, HammingCodeDataset};
use ferrite_backprop::{io, ActivationFunction, Matrix, Network, NnError, Preset, Topology};

#[test]
fn saved_model_reproduces_forward_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");

    let net = Network::new(&Preset::Hamming.topology()).unwrap();
    io::save(&path, &net).unwrap();
    let loaded = io::load(&path).unwrap();

    let data = HammingCodeDataset::new(0).unwrap();
    let x = data.test_inputs();
    let before = net.forward(x).unwrap();
    let after = loaded.forward(x).unwrap();
    assert_eq!(before.as_slice(), after.as_slice());
    assert_eq!(loaded.topology(), net.topology());
}

#[test]
fn truncated_file_is_reported_as_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let topology = Topology::new(
        3,
        2,
        vec![4],
        vec![ActivationFunction::Tanh, ActivationFunction::Identity],
    );
    io::save(&path, &Network::with_seed(&topology, 1).unwrap()).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    assert!(matches!(io::load(&path), Err(NnError::CorruptModel(_))));

    std::fs::write(&path, b"definitely not a model").unwrap();
    assert!(matches!(io::load(&path), Err(NnError::CorruptModel(_))));
}

#[test]
fn single_sample_inference_after_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("xor.bin");
    let net = Network::with_seed(&Preset::Xor.topology(), 12).unwrap();
    io::save(&path, &net).unwrap();

    let loaded = io::load(&path).unwrap();
    let sample = Matrix::from_rows(&[vec![1.0, 0.0]]).unwrap();
    let y = loaded.forward(&sample).unwrap();
    assert_eq!(y.shape(), (1, 1));
    assert_eq!(y, net.forward(&sample).unwrap());
}
