//! In-process REST backend.
//!
//! Emulates the small json-server style API the client talks to: top-level
//! collections of JSON objects keyed by `id`, kept in insertion order.
//! Used for `--offline` runs and as the backend in tests, where the request
//! log and one-shot failure injection make batch behavior observable.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use url::form_urlencoded;

use super::transport::Transport;
use super::ApiError;

/// One request as seen by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
}

#[derive(Debug, Default)]
struct BackendState {
    collections: HashMap<String, IndexMap<String, Value>>,
    /// One-shot failures: (method, path) pairs that fail the next time they're hit
    failures: Vec<(&'static str, String)>,
    requests: Vec<RecordedRequest>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<BackendState>,
}

/// A parsed request path: `/tasks/3` or `/tasks?projectId=1`, with the id
/// and query values percent-decoded
struct Route<'a> {
    collection: &'a str,
    id: Option<String>,
    query: Vec<(String, String)>,
}

fn decode_segment(raw: &str) -> String {
    // A lone segment parses as one key with no value
    form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}

fn parse_route(path: &str) -> Option<Route<'_>> {
    let (path, query) = match path.split_once('?') {
        Some((p, q)) => (p, q),
        None => (path, ""),
    };
    let mut segments = path.trim_matches('/').split('/').filter(|s| !s.is_empty());
    let collection = segments.next()?;
    let id = segments.next().map(decode_segment);
    if segments.next().is_some() {
        return None;
    }
    let query = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    Some(Route {
        collection,
        id,
        query,
    })
}

/// Compare a stored field against a query-string value the way json-server does
fn field_matches(value: Option<&Value>, expected: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == expected,
        Some(Value::Number(n)) => n.to_string() == expected,
        Some(Value::Bool(b)) => b.to_string() == expected,
        _ => false,
    }
}

fn id_of(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn status_error(method: &str, path: &str, status: u16, body: &str) -> ApiError {
    ApiError::Status {
        method: method.to_string(),
        path: path.to_string(),
        status,
        body: body.to_string(),
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace a collection's contents. Records without an `id` are skipped.
    pub fn seed<I>(&self, collection: &str, records: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let mut state = self.lock();
        let entries = state.collections.entry(collection.to_string()).or_default();
        entries.clear();
        for record in records {
            if let Some(id) = id_of(&record) {
                entries.insert(id, record);
            }
        }
    }

    /// Snapshot of a collection in insertion order
    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.lock()
            .collections
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Make the next `method` request to exactly `path` fail with a 503
    pub fn fail_once(&self, method: &'static str, path: impl Into<String>) {
        self.lock().failures.push((method, path.into()));
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    fn handle(&self, method: &'static str, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            method,
            path: path.to_string(),
        });

        if let Some(pos) = state
            .failures
            .iter()
            .position(|(m, p)| *m == method && p == path)
        {
            state.failures.remove(pos);
            return Err(status_error(method, path, 503, "injected failure"));
        }

        let route = parse_route(path).ok_or_else(|| status_error(method, path, 404, "Not Found"))?;
        let collection = state
            .collections
            .entry(route.collection.to_string())
            .or_default();

        match (method, route.id.as_deref()) {
            ("GET", None) => Ok(Value::Array(
                collection
                    .values()
                    .filter(|record| {
                        route
                            .query
                            .iter()
                            .all(|(k, v)| field_matches(record.get(k.as_str()), v))
                    })
                    .cloned()
                    .collect(),
            )),
            ("GET", Some(id)) => collection
                .get(id)
                .cloned()
                .ok_or_else(|| status_error(method, path, 404, "Not Found")),
            ("POST", None) => {
                let record = body.unwrap_or(Value::Null);
                if !record.is_object() {
                    return Err(status_error(method, path, 400, "body must be an object"));
                }
                let id = id_of(&record)
                    .ok_or_else(|| status_error(method, path, 400, "missing id"))?;
                if collection.contains_key(&id) {
                    return Err(status_error(method, path, 409, "duplicate id"));
                }
                collection.insert(id, record.clone());
                Ok(record)
            }
            ("PATCH", Some(id)) => {
                let fields = match body {
                    Some(Value::Object(fields)) => fields,
                    _ => return Err(status_error(method, path, 400, "body must be an object")),
                };
                let record = collection
                    .get_mut(id)
                    .ok_or_else(|| status_error(method, path, 404, "Not Found"))?;
                let Some(target) = record.as_object_mut() else {
                    return Err(status_error(method, path, 500, "stored record is not an object"));
                };
                for (key, value) in fields {
                    if key != "id" {
                        target.insert(key, value);
                    }
                }
                Ok(record.clone())
            }
            ("DELETE", Some(id)) => collection
                .shift_remove(id)
                .map(|_| Value::Object(Map::new()))
                .ok_or_else(|| status_error(method, path, 404, "Not Found")),
            _ => Err(status_error(method, path, 405, "Method Not Allowed")),
        }
    }
}

#[async_trait]
impl Transport for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.handle("GET", path, None)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.handle("POST", path, Some(body))
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.handle("PATCH", path, Some(body))
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.handle("DELETE", path, None).map(|_| ())
    }
}
