// Command-line front end: trains one of the built-in problems.
// All neural network logic lives in the library (src/lib.rs and its modules).
//   cargo run --release -- xor
//   RUST_LOG=debug cargo run --release -- hamming --workers 8 --save hamming.bin

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ferrite_backprop::{io, train, Dataset, Network, NnError, Preset, TrainConfig, TrainingReport};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Problem {
    Xor,
    FourBitXor,
    Hamming,
}

impl From<Problem> for Preset {
    fn from(p: Problem) -> Preset {
        match p {
            Problem::Xor => Preset::Xor,
            Problem::FourBitXor => Preset::FourBitXor,
            Problem::Hamming => Preset::Hamming,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ferrite-backprop", about = "Train a feed-forward network with mini-batch SGD")]
struct Args {
    /// Built-in problem to train on.
    #[arg(value_enum)]
    problem: Problem,

    /// JSON TrainConfig; replaces the problem's defaults.
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    test_every: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    /// Gradient worker threads (1 = single-threaded).
    #[arg(long)]
    workers: Option<usize>,

    /// Seeds weight init, shuffling and the Hamming split.
    #[arg(long)]
    seed: Option<u64>,

    /// Write the trained model here (binary format).
    #[arg(long)]
    save: Option<String>,

    /// Also write a JSON export of the trained model.
    #[arg(long)]
    save_json: Option<String>,
}

fn main() -> Result<(), NnError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let preset = Preset::from(args.problem);

    let mut config = match &args.config {
        Some(path) => TrainConfig::load_json(path)?,
        None => preset.train_config(),
    };
    if let Some(v) = args.epochs {
        config.epochs = v;
    }
    if let Some(v) = args.batch_size {
        config.batch_size = v;
    }
    if let Some(v) = args.test_every {
        config.test_every = v;
    }
    if let Some(v) = args.learning_rate {
        config.learning_rate = v;
    }
    if let Some(v) = args.workers {
        config.workers = v;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let data = preset.dataset(args.seed.unwrap_or(0))?;
    let topology = preset.topology();
    let mut network = match args.seed {
        Some(seed) => Network::with_seed(&topology, seed)?,
        None => Network::new(&topology)?,
    };
    info!(problem = ?args.problem, ?topology, "network built");

    let summary = train(
        &mut network,
        data.train_inputs(),
        data.train_labels(),
        data.test_inputs(),
        data.test_labels(),
        &config,
        &mut |r: &TrainingReport| {
            println!(
                "Epoch {}/{}: train loss = {:.6}, test loss = {:.6}, accuracy = {:.2}%",
                r.epoch,
                r.total_epochs,
                r.train_loss,
                r.test_loss,
                r.test_accuracy * 100.0
            )
        },
    )?;
    info!(state = ?summary.state, epochs = summary.epochs_completed, "done");

    let outputs = network.forward(data.test_inputs())?;
    for row in 0..data.test_inputs().rows().min(16) {
        println!(
            "Input: {:?} -> Output: {:.4?} (label {:?})",
            data.test_inputs().row(row),
            outputs.row(row),
            data.test_labels().row(row)
        );
    }

    if let Some(path) = &args.save {
        io::save(path, &network)?;
        info!(path = %path, "model saved");
    }
    if let Some(path) = &args.save_json {
        io::save_json(path, &network)?;
        info!(path = %path, "json export saved");
    }
    Ok(())
}
