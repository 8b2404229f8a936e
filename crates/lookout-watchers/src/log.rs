//! Log watcher

use crate::batch;
use crate::sink::EntrySink;
use lookout_domain::{EntryId, LogLevel, LogPayload};
use serde_json::{Map, Value};

/// A log call as seen by the watcher
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
    /// Logging target
    pub target: Option<String>,
    /// Structured fields
    pub fields: Map<String, Value>,
}

impl LogRecord {
    /// A record with just a level and a message
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            target: None,
            fields: Map::new(),
        }
    }
}

/// Records log lines
pub struct LogWatcher {
    sink: EntrySink,
}

impl LogWatcher {
    /// Create a watcher
    pub fn new(sink: EntrySink) -> Self {
        Self { sink }
    }

    /// Record a log line under the active batch
    pub async fn capture(&self, record: LogRecord) -> Option<EntryId> {
        self.capture_in(record, batch::current()).await
    }

    /// Record a log line under an explicit batch
    ///
    /// Used when the line was observed on one task and is persisted on another;
    /// the batch must be the one active where the line was logged.
    pub async fn capture_in(
        &self,
        record: LogRecord,
        batch_id: Option<lookout_domain::BatchId>,
    ) -> Option<EntryId> {
        let payload = LogPayload {
            hostname: self.sink.hostname().to_string(),
            level: record.level,
            message: record.message,
            target: record.target,
            fields: record.fields,
        };

        self.sink.record(&payload, batch_id).await
    }
}
