use super::{KeyValueStore, StoreError};
use std::path::Path;
use tracing::debug;

/// On-disk store backed by an embedded sled database
#[derive(Debug, Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open (or create) a database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening sled store");
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// Temporary database removed on drop, for tests and dry runs
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SledStore {
    fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn set_value(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.db.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{load, save, NETWORKS_KEY};

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        {
            let store = SledStore::open(&path).unwrap();
            save(&store, NETWORKS_KEY, &vec!["a", "b"]).unwrap();
            store.flush().unwrap();
        }

        let store = SledStore::open(&path).unwrap();
        let loaded: Option<Vec<String>> = load(&store, NETWORKS_KEY).unwrap();
        assert_eq!(loaded, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_temporary_store_starts_empty() {
        let store = SledStore::temporary().unwrap();
        assert!(store.get_value(NETWORKS_KEY).unwrap().is_none());
    }
}
