pub mod gradients;
pub mod network;
pub mod topology;

pub use gradients::{Gradients, LayerGradient};
pub use network::{Evaluation, ForwardPass, Network};
pub use topology::Topology;
