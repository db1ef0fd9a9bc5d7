use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration from taskdeck.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST backend
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Directory holding the durable `<key>.json` slots
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Per-request timeout. Absent means requests may wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_url: default_api_url(),
            state_dir: default_state_dir(),
            timeout_secs: None,
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".taskdeck")
}
