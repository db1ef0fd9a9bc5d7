//! Remote access layer: CRUD against the REST backend plus the client-side
//! id and order allocation that happens before a record is submitted.

pub mod memory;
pub mod projects;
pub mod short_id;
pub mod tasks;
pub mod transport;

pub use memory::MemoryBackend;
pub use projects::ProjectsApi;
pub use tasks::TasksApi;
pub use transport::{HttpTransport, Transport};

use chrono::{SecondsFormat, Utc};
use url::form_urlencoded;

/// Error type for remote operations
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status code, if the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Current time as an ISO-8601 UTC timestamp with millisecond precision
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Escape an id or filter value so it stays a single path segment or query value.
///
/// Form encoding writes a space as `+` and escapes a literal `+`, so any `+`
/// left in the output is a space and becomes `%20`.
pub(crate) fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
