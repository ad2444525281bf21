use super::{KeyValueStore, StoreError};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ephemeral in-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, serde_json::Value>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an entry without counting it as a write
    pub fn with_entry(self, key: &str, value: serde_json::Value) -> Self {
        self.entries.insert(key.to_string(), value);
        self
    }

    /// Number of `set_value` calls so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl KeyValueStore for MemoryStore {
    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set_value(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}
