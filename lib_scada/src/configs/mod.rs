//! # Configuration Modules
//!
//! Loading of `ScadaOptions` from files. JSON and JSON5 are both accepted;
//! projectors cannot be expressed in a file and must be attached in code.

/// Options file loader.
pub mod options_file;

pub use options_file::{load_options, parse_options, ConfigError};
