pub mod model_io;

pub use model_io::{load, load_json, save, save_json};
