use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::model::ScadaOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read options file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid options in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json5::Error,
    },
}

/// Parses options from JSON5 (plain JSON is valid JSON5).
pub fn parse_options(text: &str, origin: &str) -> Result<ScadaOptions, ConfigError> {
    serde_json5::from_str(text).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })
}

/// Reads and parses an options file. Missing fields take their defaults.
pub fn load_options(path: &Path) -> Result<ScadaOptions, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let options = parse_options(&text, &path.display().to_string())?;
    log::debug!(
        "Loaded {} source(s) for instance {} from {}",
        options.sources.len(),
        options.id,
        path.display()
    );
    Ok(options)
}
