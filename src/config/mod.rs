//! Configuration file handling

mod settings;

pub use settings::{config_path, load, load_from_path, save_to_path};
