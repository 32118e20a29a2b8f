//! Typed load/save helpers over the JSON documents of a [`KeyValueStore`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::backend::KeyValueStore;
use crate::error::{Result, StoreError};

/// Load the list stored under `key`. A missing document is an empty list;
/// so is one that fails to parse, after a warning.
pub(crate) fn load_list<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Vec<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(Vec::new());
    };
    match decode(key, &raw) {
        Ok(items) => Ok(items),
        Err(e) => {
            warn!(key, error = %e, "stored collection is unreadable, treating it as empty");
            Ok(Vec::new())
        }
    }
}

/// Load the single record stored under `key`, with the same recovery as
/// [`load_list`].
pub(crate) fn load_record<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match decode(key, &raw) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            warn!(key, error = %e, "stored record is unreadable, ignoring it");
            Ok(None)
        }
    }
}

pub(crate) fn save<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw)
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;

    #[test]
    fn missing_collection_is_empty() {
        let store = MemoryStore::new();
        let items: Vec<u32> = load_list(&store, "teams").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn corrupt_collection_is_empty() {
        let store = MemoryStore::new();
        store.put("conversations", "{not json").unwrap();
        let items: Vec<u32> = load_list(&store, "conversations").unwrap();
        assert!(items.is_empty());

        let record: Option<u32> = load_record(&store, "conversations").unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn save_then_load() {
        let store = MemoryStore::new();
        save(&store, "numbers", &[1u32, 2, 3][..]).unwrap();
        let items: Vec<u32> = load_list(&store, "numbers").unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }
}
