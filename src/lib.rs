pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod train;
pub mod io;
pub mod data;

// Convenience re-exports
pub use error::{NnError, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::{Evaluation, ForwardPass, Gradients, LayerGradient, Network, Topology};
pub use loss::mse::MseLoss;
pub use optim::sgd::Sgd;
pub use train::{
    train, ReportSink, RunState, TrainConfig, Trainer, TrainingReport, TrainingRun,
    TrainingSummary,
};
pub use data::{Dataset, Preset};
