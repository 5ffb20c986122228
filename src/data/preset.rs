use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction::{ReLU, Sigmoid};
use crate::data::dataset::{Dataset, FourBitXorDataset, HammingCodeDataset, XorDataset};
use crate::error::Result;
use crate::network::topology::Topology;
use crate::train::train_config::TrainConfig;

/// Built-in problems, each with the architecture and hyperparameters it is
/// known to train well with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// 2-bit XOR: 2 → 2 → 1, sigmoid throughout, full batch, lr 1,
    /// reporting every epoch.
    Xor,
    /// 4-bit parity: 4 → 16 → 16 → 1, ReLU hidden layers, lr 0.01,
    /// reporting every epoch.
    FourBitXor,
    /// Hamming(15,11) parity bits: 11 → 20 → 20 → 4, batches of 128.
    Hamming,
}

impl Preset {
    pub fn topology(self) -> Topology {
        match self {
            Preset::Xor => Topology::new(2, 1, vec![2], vec![Sigmoid, Sigmoid]),
            Preset::FourBitXor => Topology::new(4, 1, vec![16, 16], vec![ReLU, ReLU, Sigmoid]),
            Preset::Hamming => Topology::new(11, 4, vec![20, 20], vec![ReLU, Sigmoid, Sigmoid]),
        }
    }

    pub fn train_config(self) -> TrainConfig {
        match self {
            // Four rows: threads would cost more than they save.
            Preset::Xor => TrainConfig::new(4, 100_000, 1, 1.0, 1),
            Preset::FourBitXor => TrainConfig::new(4, 10_000, 1, 0.01, 4),
            Preset::Hamming => TrainConfig::new(128, 15_000, 10, 0.5, 4),
        }
    }

    /// Builds the dataset; `seed` only affects the Hamming train/test split.
    pub fn dataset(self, seed: u64) -> Result<Box<dyn Dataset>> {
        Ok(match self {
            Preset::Xor => Box::new(XorDataset::new()?),
            Preset::FourBitXor => Box::new(FourBitXorDataset::new()?),
            Preset::Hamming => Box::new(HammingCodeDataset::new(seed)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_consistent_with_their_data() {
        for preset in [Preset::Xor, Preset::FourBitXor, Preset::Hamming] {
            let topology = preset.topology();
            topology.validate().unwrap();
            preset.train_config().validate().unwrap();
            if preset != Preset::Hamming {
                assert_eq!(preset.train_config().test_every, 1);
            }
            let data = preset.dataset(0).unwrap();
            data.validate().unwrap();
            assert_eq!(data.train_inputs().cols(), topology.input_size);
            assert_eq!(data.train_labels().cols(), topology.output_size);
        }
    }
}
