//! Key-prefixed JSON store with a size-bounded write path.
//!
//! `LocalStore` is the only owner of persisted state. Its public operations
//! never fail: serialization errors, quota refusals and backend faults are
//! logged and the call degrades to a no-op (writes) or to the absent sentinel
//! (reads). The `try_*` variants expose the underlying `Result` for callers
//! that want to act on a failure.

use serde::{Serialize, de::DeserializeOwned};
use siteline_core::error::{Result, SitelineError};
use siteline_core::storage::StorageBackend;
use std::sync::Arc;

#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn StorageBackend>,
    prefix: String,
    max_value_bytes: usize,
}

impl LocalStore {
    /// Creates a store over `backend`.
    ///
    /// # Arguments
    ///
    /// * `backend` - Raw key/value persistence
    /// * `prefix` - Prepended to every key before it reaches the backend
    /// * `max_value_bytes` - Largest serialized value a `put` accepts
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        prefix: impl Into<String>,
        max_value_bytes: usize,
    ) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            max_value_bytes,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Reads and deserializes `key`.
    ///
    /// Returns `None` when the key is missing or its content does not parse
    /// as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("[LocalStore] Failed to read '{}': {}", key, e);
                None
            }
        }
    }

    /// Like [`get`](Self::get) but falls back to `T::default()`.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.get(key).unwrap_or_default()
    }

    /// Serializes `value` and stores it under `key`.
    ///
    /// Returns whether the value was persisted.
    pub fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.try_put(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("[LocalStore] Failed to write '{}': {}", key, e);
                false
            }
        }
    }

    /// Removes `key`. Returns whether the backend confirmed the removal.
    pub fn remove(&self, key: &str) -> bool {
        match self.backend.remove(&self.full_key(key)) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("[LocalStore] Failed to remove '{}': {}", key, e);
                false
            }
        }
    }

    /// Lists stored keys (without prefix).
    pub fn keys(&self) -> Vec<String> {
        match self.backend.keys(&self.prefix) {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
                .collect(),
            Err(e) => {
                tracing::warn!("[LocalStore] Failed to list keys: {}", e);
                Vec::new()
            }
        }
    }

    /// Removes every key under this store's prefix and returns how many went.
    pub fn clear(&self) -> usize {
        self.keys().iter().filter(|key| self.remove(key)).count()
    }

    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.backend.read(&self.full_key(key))? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub fn try_put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        if json.len() > self.max_value_bytes {
            return Err(SitelineError::QuotaExceeded {
                key: key.to_string(),
                size: json.len(),
                limit: self.max_value_bytes,
            });
        }
        self.backend.write(&self.full_key(key), &json)
    }
}
