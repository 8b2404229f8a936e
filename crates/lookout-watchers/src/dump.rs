//! Dump watcher

use crate::batch;
use crate::sink::EntrySink;
use lookout_domain::{Category, DumpPayload, EntryId};
use serde::Serialize;

/// Records explicitly dumped values
pub struct DumpWatcher {
    sink: EntrySink,
}

impl DumpWatcher {
    /// Create a watcher
    pub fn new(sink: EntrySink) -> Self {
        Self { sink }
    }

    /// Record any serializable value under the active batch
    ///
    /// Values that fail to serialize are logged and dropped.
    pub async fn capture<T>(&self, value: &T) -> Option<EntryId>
    where
        T: Serialize + Sync + ?Sized,
    {
        let dump = match serde_json::to_value(value) {
            Ok(dump) => dump,
            Err(e) => {
                tracing::warn!(category = %Category::Dump, error = %e, "Dropping value that could not be serialized");
                return None;
            }
        };

        let payload = DumpPayload {
            hostname: self.sink.hostname().to_string(),
            dump,
        };

        self.sink.record(&payload, batch::current()).await
    }
}
