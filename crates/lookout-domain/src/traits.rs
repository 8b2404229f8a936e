//! Trait definitions for external interactions
//!
//! Concrete storage backends (file, SQL, in-memory) live outside this workspace
//! and plug in through [`EntryStorage`].

use crate::error::StorageError;
use crate::Entry;
use async_trait::async_trait;

/// Persistence port that watchers write through
///
/// One logical endpoint per category: drivers group entries by
/// [`Entry::category`]. Implementations must tolerate concurrent calls for the
/// same and for different categories. Ordering across concurrent saves is not
/// guaranteed; a driver that needs strict ordering serializes writes itself.
#[async_trait]
pub trait EntryStorage: Send + Sync {
    /// Persist one entry
    async fn save(&self, entry: &Entry) -> Result<(), StorageError>;
}

#[async_trait]
impl<S> EntryStorage for std::sync::Arc<S>
where
    S: EntryStorage + ?Sized,
{
    async fn save(&self, entry: &Entry) -> Result<(), StorageError> {
        (**self).save(entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, EntryContent};
    use serde::Serialize;
    use std::sync::{Arc, Mutex};

    #[derive(Serialize)]
    struct Line(&'static str);

    impl EntryContent for Line {
        const CATEGORY: Category = Category::Log;
    }

    // Mock store for testing
    #[derive(Default)]
    struct MockStore {
        entries: Mutex<Vec<Entry>>,
    }

    #[async_trait]
    impl EntryStorage for MockStore {
        async fn save(&self, entry: &Entry) -> Result<(), StorageError> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_arc_storage_delegates() {
        let store = Arc::new(MockStore::default());
        let port: Arc<dyn EntryStorage> = store.clone();

        let entry = Entry::new(&Line("hello"), None).unwrap();
        port.save(&entry).await.unwrap();
        Arc::clone(&store).save(&entry).await.unwrap();

        let entries = store.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category(), Category::Log);
    }
}
