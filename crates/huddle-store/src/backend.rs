//! Key/value backends holding the persisted collections.
//!
//! Every collection is one JSON document under a fixed key. Writes replace
//! the whole document (last write wins) and announce themselves on the
//! backend's change feed, so a sync loop can react to local writes
//! immediately and fall back to polling for writes it cannot observe.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::error::Result;

/// Capacity of the change feed before slow listeners start lagging
pub(crate) const CHANGE_FEED_CAPACITY: usize = 64;

/// Announcement that the document under `key` was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
}

/// Storage for whole JSON documents addressed by key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Feed of writes made through this backend.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Volatile backend. Clones share data and change feed, which makes two
/// clones behave like two tabs of the same origin.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, String>>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        Ok(data.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        {
            let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
            data.insert(key.to_string(), value.to_string());
        }
        // Nobody listening is fine.
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
