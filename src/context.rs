//! The request context.
//!
//! A [`Context`] is created by the caller (usually the transport) for every
//! incoming request and threaded unchanged into each engine invocation. The
//! operator never inspects its contents; all members of a batch share the
//! same context.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json_bytes::Value;

/// Holds request-scoped key/value data shared between the caller and the
/// execution engine.
///
/// Cloning a `Context` is cheap and yields a handle to the same underlying
/// entries.
#[derive(Clone, Debug, Default)]
pub struct Context {
    entries: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a serializable value, returning the previous value for the key
    /// if there was one.
    pub fn insert<K, V>(&self, key: K, value: V) -> Result<Option<Value>, serde_json::Error>
    where
        K: Into<String>,
        V: Serialize,
    {
        let value = serde_json_bytes::to_value(value)?;
        Ok(self.entries.insert(key.into(), value))
    }

    /// Get a value by key, deserialized into the requested type.
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, serde_json::Error> {
        self.entries
            .get(key)
            .map(|entry| serde_json_bytes::from_value(entry.value().clone()))
            .transpose()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
