//! Persistence for registry state
//!
//! The registry persists two entries in an external key/value store: the ordered
//! network list and the selected network id. Values are JSON documents so the
//! store never needs to know the record schema.

mod memory;
mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Key holding the ordered list of network records
pub const NETWORKS_KEY: &str = "networks";

/// Key holding the nullable selected network id
pub const SELECTED_NETWORK_KEY: &str = "selectedNetworkID";

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("Failed to encode value for key {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode value for key {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal key/value interface over JSON values
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read a raw JSON value; `None` when the key was never written
    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Write a raw JSON value
    fn set_value(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;

    /// Flush pending writes to durable storage
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Typed read helper
pub fn load<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get_value(key)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Typed write helper
pub fn save<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set_value(key, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_round_trip_through_memory_store() {
        let store = MemoryStore::new();
        save(&store, SELECTED_NETWORK_KEY, &Some("abc".to_string())).unwrap();
        let loaded: Option<Option<String>> = load(&store, SELECTED_NETWORK_KEY).unwrap();
        assert_eq!(loaded, Some(Some("abc".to_string())));

        let missing: Option<Vec<String>> = load(&store, NETWORKS_KEY).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_decode_error_names_the_key() {
        let store = MemoryStore::new();
        store
            .set_value(NETWORKS_KEY, serde_json::json!("not a list"))
            .unwrap();
        let err = load::<Vec<String>>(&store, NETWORKS_KEY).unwrap_err();
        assert!(err.to_string().contains(NETWORKS_KEY));
    }
}
