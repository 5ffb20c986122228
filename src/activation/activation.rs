use serde::{Deserialize, Serialize};
use std::f64::consts::E;

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

/// Element-wise activation applied after a layer's affine transform.
///
/// `derivative` receives both the pre-activation `z` and the output
/// `a = function(z)`. Sigmoid and Tanh read `a`, so the exponential is not
/// recomputed during backprop; the piecewise-linear variants read `z`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Identity,
    Sigmoid,
    ReLU,
    Tanh,
    LeakyReLU { alpha: f64 },
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Identity => x,
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
        }
    }

    /// dA/dZ at one point. ReLU's derivative at exactly 0 is taken as 0.
    pub fn derivative(&self, z: f64, a: f64) -> f64 {
        match self {
            ActivationFunction::Identity => 1.0,
            ActivationFunction::Sigmoid => a * (1.0 - a),
            ActivationFunction::ReLU => if z > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Tanh => 1.0 - a * a,
            ActivationFunction::LeakyReLU { alpha } => if z > 0.0 { 1.0 } else { *alpha },
        }
    }

    pub fn apply(&self, z: &Matrix) -> Matrix {
        z.map(|x| self.function(x))
    }

    /// Element-wise derivative over a whole layer; `z` and `a` share a shape.
    pub fn derivative_matrix(&self, z: &Matrix, a: &Matrix) -> Result<Matrix> {
        if z.shape() != a.shape() {
            return Err(NnError::mismatch("activation derivative", z.shape(), a.shape()));
        }
        let data = z
            .as_slice()
            .iter()
            .zip(a.as_slice())
            .map(|(&zv, &av)| self.derivative(zv, av))
            .collect();
        Matrix::from_vec(z.rows(), z.cols(), data)
    }

    /// Whether ReLU-style weight initialisation suits this activation.
    pub(crate) fn prefers_he_init(&self) -> bool {
        matches!(self, ActivationFunction::ReLU | ActivationFunction::LeakyReLU { .. })
    }
}
