use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;
use crate::network::network::Network;

/// Weight and bias gradient for a single layer; shapes mirror the layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGradient {
    pub weights: Matrix,
    pub biases: Matrix,
}

/// Per-layer gradients for a batch (or a shard of one).
///
/// `samples` counts the rows that contributed. A freshly computed shard
/// holds raw sums; `averaged` divides by `samples` to get the mean gradient
/// the optimizer applies.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub layers: Vec<LayerGradient>,
    pub samples: usize,
}

impl Gradients {
    /// Empty accumulator shaped like `network`'s parameters.
    pub fn zeros_like(network: &Network) -> Gradients {
        let layers = network
            .layers()
            .iter()
            .map(|layer| LayerGradient {
                weights: Matrix::zeros(layer.weights.rows(), layer.weights.cols()),
                biases: Matrix::zeros(layer.biases.rows(), layer.biases.cols()),
            })
            .collect();
        Gradients { layers, samples: 0 }
    }

    /// Adds `other` into `self`, layer by layer.
    pub fn accumulate(&mut self, other: &Gradients) -> Result<()> {
        if self.layers.len() != other.layers.len() {
            return Err(NnError::mismatch(
                "accumulate gradients",
                (self.layers.len(), 1),
                (other.layers.len(), 1),
            ));
        }
        for (acc, g) in self.layers.iter_mut().zip(&other.layers) {
            acc.weights.add_assign(&g.weights)?;
            acc.biases.add_assign(&g.biases)?;
        }
        self.samples += other.samples;
        Ok(())
    }

    /// Mean gradient over the contributing samples.
    pub fn averaged(&self) -> Gradients {
        let inv = if self.samples == 0 { 0.0 } else { 1.0 / self.samples as f64 };
        Gradients {
            layers: self
                .layers
                .iter()
                .map(|g| LayerGradient {
                    weights: g.weights.scale(inv),
                    biases: g.biases.scale(inv),
                })
                .collect(),
            samples: self.samples,
        }
    }

    pub fn approx_eq(&self, other: &Gradients, tol: f64) -> bool {
        self.samples == other.samples
            && self.layers.len() == other.layers.len()
            && self.layers.iter().zip(&other.layers).all(|(a, b)| {
                a.weights.approx_eq(&b.weights, tol) && a.biases.approx_eq(&b.biases, tol)
            })
    }
}
