use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};

/// Architecture of a feed-forward network, independent of its weights.
///
/// - `input_size`  — width of one input sample
/// - `output_size` — width of the output layer
/// - `hidden`      — hidden-layer widths, input side first
/// - `activations` — one per hidden layer plus one for the output layer
///
/// Like the model itself, a topology can be stored as JSON before any
/// training happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub input_size: usize,
    pub output_size: usize,
    pub hidden: Vec<usize>,
    pub activations: Vec<ActivationFunction>,
}

impl Topology {
    pub fn new(
        input_size: usize,
        output_size: usize,
        hidden: Vec<usize>,
        activations: Vec<ActivationFunction>,
    ) -> Topology {
        Topology {
            input_size,
            output_size,
            hidden,
            activations,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.output_size == 0 {
            return Err(NnError::InvalidShape(format!(
                "topology needs positive input and output sizes, got {} -> {}",
                self.input_size, self.output_size
            )));
        }
        if let Some(i) = self.hidden.iter().position(|&w| w == 0) {
            return Err(NnError::InvalidShape(format!("hidden layer {i} has zero width")));
        }
        if self.activations.len() != self.hidden.len() + 1 {
            return Err(NnError::InvalidShape(format!(
                "{} hidden layers need {} activations, got {}",
                self.hidden.len(),
                self.hidden.len() + 1,
                self.activations.len()
            )));
        }
        Ok(())
    }

    /// `(size, input_size, activation)` for every layer, input side first.
    pub fn layer_specs(&self) -> Vec<(usize, usize, ActivationFunction)> {
        let widths = self.hidden.iter().copied().chain(std::iter::once(self.output_size));
        let mut input = self.input_size;
        widths
            .zip(self.activations.iter().copied())
            .map(|(size, act)| {
                let spec = (size, input, act);
                input = size;
                spec
            })
            .collect()
    }

    /// Serializes the topology to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `Topology` from a JSON file.
    pub fn load_json(path: &str) -> Result<Topology> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let topology: Topology = serde_json::from_reader(reader)?;
        topology.validate()?;
        Ok(topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActivationFunction::{ReLU, Sigmoid};

    #[test]
    fn layer_specs_chain_widths() {
        let t = Topology::new(4, 1, vec![16, 8], vec![ReLU, ReLU, Sigmoid]);
        t.validate().unwrap();
        assert_eq!(
            t.layer_specs(),
            vec![(16, 4, ReLU), (8, 16, ReLU), (1, 8, Sigmoid)]
        );
    }

    #[test]
    fn activation_count_must_match() {
        let t = Topology::new(2, 1, vec![2], vec![Sigmoid]);
        assert!(matches!(t.validate(), Err(NnError::InvalidShape(_))));
        let t = Topology::new(0, 1, vec![], vec![Sigmoid]);
        assert!(t.validate().is_err());
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.json");
        let path = path.to_str().unwrap();
        let t = Topology::new(11, 4, vec![20, 20], vec![ReLU, Sigmoid, Sigmoid]);
        t.save_json(path).unwrap();
        assert_eq!(Topology::load_json(path).unwrap(), t);
    }
}
