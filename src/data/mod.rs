pub mod dataset;
pub mod preset;

pub use dataset::{Dataset, FourBitXorDataset, HammingCodeDataset, XorDataset};
pub use preset::Preset;
