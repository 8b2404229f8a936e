//! Test doubles for the storage port

use async_trait::async_trait;
use lookout_domain::{Category, Entry, EntryStorage, StorageError};
use parking_lot::Mutex;

/// Keeps every saved entry in memory
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<Entry>>,
}

impl MemoryStore {
    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().clone()
    }

    pub fn in_category(&self, category: Category) -> Vec<Entry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.category() == category)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EntryStorage for MemoryStore {
    async fn save(&self, entry: &Entry) -> Result<(), StorageError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Rejects every write
pub struct FailingStore;

#[async_trait]
impl EntryStorage for FailingStore {
    async fn save(&self, _entry: &Entry) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk full".to_string()))
    }
}
