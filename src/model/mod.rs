pub mod config;
pub mod project;
pub mod task;
pub mod view;

pub use config::*;
pub use project::*;
pub use task::*;
pub use view::*;

use serde::{Deserialize, Deserializer};

/// Accept ids sent either as JSON strings or as bare numbers
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
