use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;
use crate::network::gradients::LayerGradient;

/// One affine transform plus activation.
///
/// `weights` is `size × input_size` and `biases` is `size × 1`. Inputs are
/// batches laid out one sample per row, so the layer computes
/// `z = x · Wᵀ + b` with `b` broadcast across rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction,
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Result<Layer> {
        if size == 0 || input_size == 0 {
            return Err(NnError::InvalidShape(format!(
                "layer of {size} units over {input_size} inputs"
            )));
        }
        Matrix::element_count(size, input_size)?;
        let weights = if activation.prefers_he_init() {
            Matrix::he(size, input_size, rng)
        } else {
            Matrix::xavier(size, input_size, rng)
        };

        Ok(Layer {
            weights,
            biases: Matrix::zeros(size, 1),
            activator: activation,
        })
    }

    /// Number of units (outputs) in this layer.
    pub fn size(&self) -> usize {
        self.weights.rows()
    }

    pub fn input_size(&self) -> usize {
        self.weights.cols()
    }

    /// Returns `(z, a)` for a `batch × input_size` input.
    pub fn feed_from(&self, input: &Matrix) -> Result<(Matrix, Matrix)> {
        if input.cols() != self.input_size() {
            return Err(NnError::mismatch("layer input", input.shape(), self.weights.shape()));
        }
        let z = input
            .multiply(&self.weights.transpose())?
            .add_column_broadcast(&self.biases)?;
        let a = self.activator.apply(&z);
        Ok((z, a))
    }

    /// Backpropagates through this layer.
    ///
    /// `error` is ∂L/∂a for every sample of the batch (`batch × size`).
    /// Returns the gradient *summed* over the batch and ∂L/∂input, the error
    /// handed to the previous layer.
    pub fn compute_gradients(
        &self,
        error: &Matrix,
        z: &Matrix,
        a: &Matrix,
        input: &Matrix,
    ) -> Result<(LayerGradient, Matrix)> {
        // δ = error ⊙ f'(z)
        let delta = error.hadamard(&self.activator.derivative_matrix(z, a)?)?;

        let weights = delta.transpose().multiply(input)?;
        let biases = delta.column_sums();
        let upstream = delta.multiply(&self.weights)?;

        Ok((LayerGradient { weights, biases }, upstream))
    }

    /// Applies pre-computed gradients scaled by lr.
    pub fn apply_gradients(&mut self, grad: &LayerGradient, lr: f64) -> Result<()> {
        self.weights = self.weights.subtract(&grad.weights.scale(lr))?;
        self.biases = self.biases.subtract(&grad.biases.scale(lr))?;
        Ok(())
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        self.weights.is_well_formed()
            && self.biases.is_well_formed()
            && self.biases.shape() == (self.weights.rows(), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn new_layer_has_expected_shapes() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = Layer::new(3, 5, ActivationFunction::ReLU, &mut rng).unwrap();
        assert_eq!(layer.weights.shape(), (3, 5));
        assert_eq!(layer.biases.shape(), (3, 1));
        assert_eq!(layer.size(), 3);
        assert_eq!(layer.input_size(), 5);
        assert!(Layer::new(0, 5, ActivationFunction::ReLU, &mut rng).is_err());
    }

    #[test]
    fn feed_from_broadcasts_bias_over_batch() {
        let layer = Layer {
            weights: Matrix::from_vec(1, 2, vec![2.0, -1.0]).unwrap(),
            biases: Matrix::from_vec(1, 1, vec![0.5]).unwrap(),
            activator: ActivationFunction::Identity,
        };
        let x = Matrix::from_vec(2, 2, vec![1.0, 1.0, 3.0, 2.0]).unwrap();
        let (z, a) = layer.feed_from(&x).unwrap();
        assert_eq!(z.as_slice(), &[1.5, 4.5]);
        assert_eq!(a, z);
    }

    #[test]
    fn feed_from_rejects_wrong_width() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = Layer::new(2, 3, ActivationFunction::Sigmoid, &mut rng).unwrap();
        let x = Matrix::zeros(1, 4);
        assert!(matches!(layer.feed_from(&x), Err(NnError::ShapeMismatch { .. })));
    }
}
