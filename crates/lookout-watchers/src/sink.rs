//! Fail-open persistence shared by every watcher

use lookout_domain::{BatchId, Entry, EntryContent, EntryId, EntryStorage};
use std::sync::Arc;

/// Builds entries and hands them to storage, swallowing every failure
///
/// Capture and storage errors are logged and the entry is dropped; nothing is
/// ever returned to the code being observed.
#[derive(Clone)]
pub struct EntrySink {
    storage: Arc<dyn EntryStorage>,
    hostname: Arc<str>,
}

impl EntrySink {
    /// Create a sink over a storage driver
    pub fn new(storage: Arc<dyn EntryStorage>, hostname: impl Into<Arc<str>>) -> Self {
        Self {
            storage,
            hostname: hostname.into(),
        }
    }

    /// Host name stamped onto every payload
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Build and persist one entry
    ///
    /// Returns the id of the persisted entry, or `None` if it was dropped.
    pub async fn record<P>(&self, payload: &P, batch_id: Option<BatchId>) -> Option<EntryId>
    where
        P: EntryContent + Sync,
    {
        let entry = match Entry::new(payload, batch_id) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(category = %P::CATEGORY, error = %e, "Dropping entry that could not be built");
                return None;
            }
        };

        match self.storage.save(&entry).await {
            Ok(()) => {
                tracing::trace!(category = %entry.category(), id = %entry.id(), "Entry persisted");
                Some(entry.id())
            }
            Err(e) => {
                tracing::warn!(category = %entry.category(), id = %entry.id(), error = %e, "Failed to persist entry");
                None
            }
        }
    }
}

impl std::fmt::Debug for EntrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntrySink")
            .field("hostname", &self.hostname)
            .finish_non_exhaustive()
    }
}
