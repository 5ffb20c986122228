use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::layers::dense::Layer;
use crate::loss::mse::MseLoss;
use crate::math::matrix::Matrix;
use crate::network::gradients::Gradients;
use crate::network::topology::Topology;

/// Rows per forward call inside `evaluate`.
const EVAL_CHUNK: usize = 256;

/// Everything `backward` needs from a forward pass over one batch.
///
/// Returned by value instead of being stashed on the network, so any number
/// of threads can run forward passes against the same `&Network`.
#[derive(Debug, Clone)]
pub struct ForwardPass {
    pub input: Matrix,
    /// `(z, a)` per layer, input side first.
    pub steps: Vec<(Matrix, Matrix)>,
}

impl ForwardPass {
    pub fn output(&self) -> &Matrix {
        self.steps.last().map(|(_, a)| a).unwrap_or(&self.input)
    }
}

/// Summary produced by `Network::evaluate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean squared error over every output value.
    pub loss: f64,
    /// Fraction of rows whose outputs all fall on the same side of 0.5 as
    /// their labels.
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    input_size: usize,
    output_size: usize,
    layers: Vec<Layer>,
}

impl Network {
    /// Builds a randomly initialised network for `topology`.
    pub fn new(topology: &Topology) -> Result<Network> {
        Network::with_rng(topology, &mut rand::thread_rng())
    }

    /// Same as `new`, but reproducible.
    pub fn with_seed(topology: &Topology, seed: u64) -> Result<Network> {
        Network::with_rng(topology, &mut StdRng::seed_from_u64(seed))
    }

    pub fn with_rng<R: Rng + ?Sized>(topology: &Topology, rng: &mut R) -> Result<Network> {
        topology.validate()?;
        let layers = topology
            .layer_specs()
            .into_iter()
            .map(|(size, input_size, activation)| Layer::new(size, input_size, activation, rng))
            .collect::<Result<Vec<_>>>()?;
        Network::from_layers(topology.input_size, topology.output_size, layers)
    }

    /// Assembles a network from explicit layers, checking that they chain.
    pub fn from_layers(input_size: usize, output_size: usize, layers: Vec<Layer>) -> Result<Network> {
        let network = Network {
            input_size,
            output_size,
            layers,
        };
        network.validate()?;
        Ok(network)
    }

    /// Checks the layer-chaining invariant. Also run on every loaded model.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(NnError::InvalidShape("network has no layers".to_string()));
        }
        if let Some(i) = self.layers.iter().position(|l| !l.is_well_formed()) {
            return Err(NnError::InvalidShape(format!("layer {i} has malformed parameters")));
        }
        let mut expected_in = self.input_size;
        for layer in &self.layers {
            if layer.input_size() != expected_in {
                return Err(NnError::mismatch(
                    "layer chain",
                    (expected_in, 1),
                    layer.weights.shape(),
                ));
            }
            expected_in = layer.size();
        }
        if expected_in != self.output_size {
            return Err(NnError::mismatch(
                "output layer",
                (self.output_size, 1),
                (expected_in, 1),
            ));
        }
        Ok(())
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn topology(&self) -> Topology {
        let hidden = self.layers[..self.layers.len() - 1]
            .iter()
            .map(|l| l.size())
            .collect();
        let activations = self.layers.iter().map(|l| l.activator).collect();
        Topology::new(self.input_size, self.output_size, hidden, activations)
    }

    /// Inference for a `batch × input_size` matrix; keeps no state.
    pub fn forward(&self, input: &Matrix) -> Result<Matrix> {
        self.check_input(input)?;
        let mut current = input.clone();
        for layer in &self.layers {
            current = layer.feed_from(&current)?.1;
        }
        Ok(current)
    }

    /// Forward pass that keeps every layer's `(z, a)` for `backward`.
    pub fn forward_pass(&self, input: &Matrix) -> Result<ForwardPass> {
        self.check_input(input)?;
        let mut steps: Vec<(Matrix, Matrix)> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let prev = steps.last().map(|(_, a)| a).unwrap_or(input);
            let step = layer.feed_from(prev)?;
            steps.push(step);
        }
        Ok(ForwardPass {
            input: input.clone(),
            steps,
        })
    }

    /// Mean gradient of the squared error over the batch in `pass`.
    pub fn backward(&self, pass: &ForwardPass, target: &Matrix) -> Result<Gradients> {
        Ok(self.backward_sum(pass, target)?.averaged())
    }

    /// Gradient summed (not averaged) over the rows of `pass`.
    ///
    /// Output error is `predicted - target`; each layer turns the incoming
    /// error into `δ = error ⊙ f'(z)` and hands `δ · W` to the layer below.
    pub fn backward_sum(&self, pass: &ForwardPass, target: &Matrix) -> Result<Gradients> {
        if pass.steps.len() != self.layers.len() {
            return Err(NnError::mismatch(
                "forward pass",
                (pass.steps.len(), 1),
                (self.layers.len(), 1),
            ));
        }
        let predicted = pass.output();
        if predicted.shape() != target.shape() {
            return Err(NnError::mismatch("backward target", predicted.shape(), target.shape()));
        }

        let mut error = MseLoss::derivative(predicted, target)?;
        let mut layers = Vec::with_capacity(self.layers.len());

        for i in (0..self.layers.len()).rev() {
            let (z, a) = &pass.steps[i];
            let input = if i == 0 { &pass.input } else { &pass.steps[i - 1].1 };
            let (grad, upstream) = self.layers[i].compute_gradients(&error, z, a, input)?;
            layers.push(grad);
            error = upstream;
        }
        layers.reverse();

        Ok(Gradients {
            layers,
            samples: pass.input.rows(),
        })
    }

    /// `W -= lr · ∇W` and `b -= lr · ∇b` for every layer.
    pub fn apply_gradients(&mut self, grads: &Gradients, lr: f64) -> Result<()> {
        if grads.layers.len() != self.layers.len() {
            return Err(NnError::mismatch(
                "apply gradients",
                (grads.layers.len(), 1),
                (self.layers.len(), 1),
            ));
        }
        for (layer, grad) in self.layers.iter_mut().zip(&grads.layers) {
            layer.apply_gradients(grad, lr)?;
        }
        Ok(())
    }

    /// Loss and accuracy over a labelled set. Read-only.
    pub fn evaluate(&self, inputs: &Matrix, labels: &Matrix) -> Result<Evaluation> {
        if inputs.rows() != labels.rows() || labels.cols() != self.output_size {
            return Err(NnError::mismatch("evaluate", inputs.shape(), labels.shape()));
        }
        let rows = inputs.rows();
        let mut squared = 0.0;
        let mut correct = 0usize;

        for start in (0..rows).step_by(EVAL_CHUNK) {
            let end = (start + EVAL_CHUNK).min(rows);
            let predicted = self.forward(&inputs.slice_rows(start, end)?)?;
            let expected = labels.slice_rows(start, end)?;
            squared += MseLoss::squared_error_sum(&predicted, &expected)?;
            correct += (0..predicted.rows())
                .filter(|&r| {
                    predicted
                        .row(r)
                        .iter()
                        .zip(expected.row(r))
                        .all(|(p, y)| (*p > 0.5) == (*y > 0.5))
                })
                .count();
        }

        Ok(Evaluation {
            loss: squared / (rows * self.output_size) as f64,
            accuracy: correct as f64 / rows as f64,
        })
    }

    fn check_input(&self, input: &Matrix) -> Result<()> {
        if input.cols() != self.input_size {
            return Err(NnError::mismatch(
                "network input",
                input.shape(),
                (input.rows(), self.input_size),
            ));
        }
        Ok(())
    }
}
