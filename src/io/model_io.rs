//! Persistence for trained networks.
//!
//! The binary artifact is an 8-byte magic, a little-endian `u32` format
//! version and a `bincode` payload of the [`Network`]. `f64` values are
//! stored bit-for-bit, so a loaded model reproduces the saved model's
//! outputs exactly. JSON export is available for inspection.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{NnError, Result};
use crate::network::network::Network;

const MAGIC: &[u8; 8] = b"FBPMODEL";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = MAGIC.len() + 4;

/// Encodes a network into the binary model format.
pub fn to_bytes(network: &Network) -> Result<Vec<u8>> {
    let payload = bincode::serialize(network)
        .map_err(|e| NnError::CorruptModel(format!("cannot encode network: {e}")))?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decodes and validates a network written by [`to_bytes`].
pub fn from_bytes(bytes: &[u8]) -> Result<Network> {
    if bytes.len() < HEADER_LEN {
        return Err(NnError::CorruptModel(format!(
            "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(NnError::CorruptModel("not a model file (bad magic)".to_string()));
    }
    let (version, payload) = rest.split_at(4);
    let version = u32::from_le_bytes([version[0], version[1], version[2], version[3]]);
    if version != FORMAT_VERSION {
        return Err(NnError::CorruptModel(format!("unsupported format version {version}")));
    }

    let network: Network = bincode::deserialize(payload)
        .map_err(|e| NnError::CorruptModel(format!("cannot decode network: {e}")))?;
    network
        .validate()
        .map_err(|e| NnError::CorruptModel(format!("inconsistent network: {e}")))?;
    Ok(network)
}

/// Writes `network` to `path` in the binary model format.
pub fn save<P: AsRef<Path>>(path: P, network: &Network) -> Result<()> {
    let bytes = to_bytes(network)?;
    fs::write(path.as_ref(), &bytes)?;
    debug!(path = %path.as_ref().display(), bytes = bytes.len(), "model saved");
    Ok(())
}

/// Reads a network previously written by [`save`].
pub fn load<P: AsRef<Path>>(path: P) -> Result<Network> {
    let bytes = fs::read(path.as_ref())?;
    let network = from_bytes(&bytes)?;
    debug!(path = %path.as_ref().display(), layers = network.layers().len(), "model loaded");
    Ok(network)
}

/// Serializes the network to a pretty-printed JSON file.
pub fn save_json<P: AsRef<Path>>(path: P, network: &Network) -> Result<()> {
    let file = fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, network)?;
    Ok(())
}

/// Deserializes a network from a JSON file previously written by `save_json`.
pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Network> {
    let file = fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let network: Network = serde_json::from_reader(reader)?;
    network
        .validate()
        .map_err(|e| NnError::CorruptModel(format!("inconsistent network: {e}")))?;
    Ok(network)
}
