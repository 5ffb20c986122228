use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

pub struct MseLoss;

impl MseLoss {
    /// Σ (predicted - expected)², left unnormalised so chunks can be summed.
    pub fn squared_error_sum(predicted: &Matrix, expected: &Matrix) -> Result<f64> {
        if predicted.shape() != expected.shape() {
            return Err(NnError::mismatch("mse", predicted.shape(), expected.shape()));
        }
        Ok(predicted
            .as_slice()
            .iter()
            .zip(expected.as_slice())
            .map(|(a, b)| (a - b).powi(2))
            .sum())
    }

    /// Per-output gradient: predicted - expected
    pub fn derivative(predicted: &Matrix, expected: &Matrix) -> Result<Matrix> {
        predicted.subtract(expected)
    }
}
