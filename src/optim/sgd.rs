use crate::error::{NnError, Result};
use crate::network::gradients::Gradients;
use crate::network::network::Network;

#[derive(Debug, Clone, Copy)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Result<Sgd> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(NnError::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {learning_rate}"
            )));
        }
        Ok(Sgd { learning_rate })
    }

    /// Applies one SGD update with already-averaged gradients.
    pub fn step(&self, network: &mut Network, grads: &Gradients) -> Result<()> {
        network.apply_gradients(grads, self.learning_rate)
    }
}
