/// Hamming(15,11) parity-bit prediction.
///
/// Architecture: 11 → 20 (ReLU) → 20 (Sigmoid) → 4 (Sigmoid)
/// Batch size:   128, split across 4 worker threads
/// Reports:      streamed over a channel to a printer thread
///
/// Run with:
///   cargo run --example hamming --release
use std::sync::mpsc;
use std::thread;

use ferrite_backprop::{io, train, Dataset, Network, Preset, TrainingReport};

fn main() -> ferrite_backprop::Result<()> {
    let preset = Preset::Hamming;
    let data = preset.dataset(7)?;
    let mut network = Network::with_seed(&preset.topology(), 7)?;

    let mut config = preset.train_config();
    config.epochs = 300;
    config.seed = Some(7);

    let (mut tx, rx) = mpsc::channel::<TrainingReport>();
    let printer = thread::spawn(move || {
        for r in rx {
            println!(
                "Epoch {:>4}: train {:.5}  test {:.5}  acc {:.1}%  ({} ms)",
                r.epoch,
                r.train_loss,
                r.test_loss,
                r.test_accuracy * 100.0,
                r.elapsed_ms
            );
        }
    });

    let summary = train(
        &mut network,
        data.train_inputs(),
        data.train_labels(),
        data.test_inputs(),
        data.test_labels(),
        &config,
        &mut tx,
    )?;
    drop(tx);
    let _ = printer.join();

    println!("Finished after {} epochs ({:?})", summary.epochs_completed, summary.state);
    io::save("hamming.bin", &network)?;
    println!("Saved model to hamming.bin");
    Ok(())
}
