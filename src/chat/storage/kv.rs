//! Key-value store adapter: the only point of contact with durable storage.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::chat::core::errors::ChatResult;

/// String-keyed durable store.
///
/// Absence of a key means "use defaults", never an error.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(&self, key: &str) -> ChatResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn set(&self, key: &str, value: &str) -> ChatResult<()>;

    /// Remove `key`; removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn remove(&self, key: &str) -> ChatResult<()>;
}

/// Volatile in-process store, useful for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> ChatResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> ChatResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ChatResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Result of reading a JSON blob from the store.
#[derive(Debug)]
pub enum Loaded<T> {
    /// The key is absent.
    Missing,
    /// The blob parsed successfully.
    Value(T),
    /// The blob exists but could not be read or parsed.
    Corrupt(String),
}

impl<T> Loaded<T> {
    /// Collapse into a value, using `T::default()` for missing or corrupt blobs.
    pub fn or_default(self) -> T
    where
        T: Default,
    {
        match self {
            Self::Value(value) => value,
            Self::Missing | Self::Corrupt(_) => T::default(),
        }
    }
}

/// Read and deserialize the JSON blob stored under `key`.
///
/// Never fails: read errors and parse errors are reported as [`Loaded::Corrupt`].
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Loaded<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Loaded::Missing,
        Err(err) => {
            warn!("Failed to read {key}: {err}");
            return Loaded::Corrupt(err.to_string());
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Loaded::Value(value),
        Err(err) => {
            warn!("Stored value for {key} is malformed: {err}");
            Loaded::Corrupt(err.to_string())
        }
    }
}
