//! Mirrors one in-memory value into one durable slot.
//!
//! `Synced::attach` loads the slot once; after that every mutation made
//! through `set`/`mutate` serializes the whole value and writes it back.
//! Storage problems never reach the caller: a bad slot at load time leaves
//! the default in place, and a failed write leaves the value in memory only.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::storage::{KeyValueStore, StorageError};

pub struct Synced<T> {
    value: T,
    key: String,
    store: Arc<dyn KeyValueStore>,
    version: u64,
}

impl<T: fmt::Debug> fmt::Debug for Synced<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synced")
            .field("key", &self.key)
            .field("version", &self.version)
            .field("value", &self.value)
            .finish()
    }
}

impl<T> Synced<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Bind `default` to the slot `key`, replacing it with the stored value
    /// when one exists and parses.
    pub fn attach(store: Arc<dyn KeyValueStore>, key: impl Into<String>, default: T) -> Self {
        let key = key.into();
        let value = match store.get(&key) {
            Ok(Some(raw)) if !raw.is_empty() => match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "discarding malformed stored value");
                    default
                }
            },
            Ok(_) => default,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "could not read stored value");
                default
            }
        };
        Synced {
            value,
            key,
            store,
            version: 0,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Bumped on every mutation, whether or not the write succeeded
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        self.changed();
    }

    /// Mutate in place (including nested fields) and write through
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut self.value);
        self.changed();
        result
    }

    fn changed(&mut self) {
        self.version += 1;
        if let Err(e) = self.write() {
            tracing::error!(key = %self.key, error = %e, "could not persist value");
        }
    }

    /// Serialize the current value into the slot
    pub fn write(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.value).map_err(|source| StorageError::Serialize {
            key: self.key.clone(),
            source,
        })?;
        self.store.set(&self.key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::storage::MemoryStore;
    use serde::ser::{self, Serializer};

    #[test]
    fn missing_slot_keeps_default() {
        let store = Arc::new(MemoryStore::new());
        let synced = Synced::attach(store.clone(), "numbers", vec![1, 2]);
        assert_eq!(synced.get(), &vec![1, 2]);
        assert_eq!(synced.version(), 0);
        // Attaching alone does not write
        assert!(store.get("numbers").unwrap().is_none());
    }

    #[test]
    fn stored_value_replaces_default() {
        let store = Arc::new(MemoryStore::new());
        store.insert_raw("numbers", "[4,5,6]");
        let synced = Synced::attach(store, "numbers", Vec::<i32>::new());
        assert_eq!(synced.get(), &vec![4, 5, 6]);
    }

    #[test]
    fn malformed_slot_keeps_default() {
        let store = Arc::new(MemoryStore::new());
        store.insert_raw("numbers", "not json {{{");
        let synced = Synced::attach(store.clone(), "numbers", vec![7]);
        assert_eq!(synced.get(), &vec![7]);

        store.insert_raw("shape", r#"{"wrong":"shape"}"#);
        let synced = Synced::attach(store, "shape", vec![8]);
        assert_eq!(synced.get(), &vec![8]);
    }

    #[test]
    fn every_mutation_writes_through() {
        let store = Arc::new(MemoryStore::new());
        let mut synced = Synced::attach(store.clone(), "numbers", Vec::<i32>::new());

        synced.mutate(|v| v.push(1));
        assert_eq!(store.get("numbers").unwrap().as_deref(), Some("[1]"));

        synced.set(vec![3, 2]);
        assert_eq!(store.get("numbers").unwrap().as_deref(), Some("[3,2]"));
        assert_eq!(synced.version(), 2);

        let reloaded = Synced::attach(store, "numbers", Vec::<i32>::new());
        assert_eq!(reloaded.get(), synced.get());
    }

    #[test]
    fn nested_mutation_writes_through() {
        let store = Arc::new(MemoryStore::new());
        let mut synced = Synced::attach(store.clone(), "grid", vec![vec![0; 2]; 2]);
        synced.mutate(|grid| grid[1][0] = 5);
        assert_eq!(store.get("grid").unwrap().as_deref(), Some("[[0,0],[5,0]]"));
    }

    #[test]
    fn failed_write_keeps_value_in_memory() {
        let store = Arc::new(MemoryStore::with_quota(12));
        let mut synced = Synced::attach(store.clone(), "numbers", Vec::<i32>::new());

        synced.mutate(|v| v.extend([1, 2, 3, 4, 5, 6, 7, 8]));
        assert_eq!(synced.get().len(), 8);
        assert!(store.get("numbers").unwrap().is_none());

        // Later mutations are still attempted
        synced.set(vec![1]);
        assert_eq!(store.get("numbers").unwrap().as_deref(), Some("[1]"));
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(ser::Error::custom("cycle"))
        }
    }

    impl<'de> serde::Deserialize<'de> for Unserializable {
        fn deserialize<D: serde::Deserializer<'de>>(_d: D) -> Result<Self, D::Error> {
            Ok(Unserializable)
        }
    }

    #[test]
    fn serialization_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        let mut synced = Synced::attach(store.clone(), "broken", Unserializable);
        synced.set(Unserializable);
        assert_eq!(synced.version(), 1);
        assert!(matches!(
            synced.write(),
            Err(StorageError::Serialize { .. })
        ));
        assert!(store.get("broken").unwrap().is_none());
    }
}
