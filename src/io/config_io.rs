use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::ClientConfig;

/// Name of the config file looked up in the working directory
pub const CONFIG_FILE: &str = "taskdeck.toml";

/// Error type for config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Read the client config.
///
/// An explicit path must exist. Without one, `taskdeck.toml` in `dir` is used
/// when present and the built-in defaults otherwise.
pub fn read_config(explicit: Option<&Path>, dir: &Path) -> Result<ClientConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = dir.join(CONFIG_FILE);
            if !candidate.exists() {
                return Ok(ClientConfig::default());
            }
            candidate
        }
    };

    let text = fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseError { path, source })
}
