//! Bridge from `tracing` events to the log watcher.
//!
//! Register [`LogLayer`] on the application's subscriber and every event becomes
//! a `log` entry, attributed to the batch active on the task that emitted it.
//! Events from Lookout's own crates, and any event raised while an entry is
//! being saved (a storage driver's query logging, say), are not captured.

use lookout_domain::{BatchId, LogLevel};
use lookout_watchers::{batch, LogRecord, LogWatcher};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

const OWN_CRATES: [&str; 3] = ["lookout_capture", "lookout_watchers", "lookout_domain"];

type Queued = (LogRecord, Option<BatchId>);

tokio::task_local! {
    /// Set on the persisting task; events raised while saving are not captured
    static PERSISTING: ();
}

/// `tracing_subscriber` layer that records events through the log watcher
///
/// Records are queued to a single persisting task per runtime, so entries are
/// saved in the order their events were emitted.
#[derive(Clone)]
pub struct LogLayer {
    watcher: Arc<LogWatcher>,
    queue: Arc<Mutex<Option<mpsc::UnboundedSender<Queued>>>>,
}

impl LogLayer {
    pub(crate) fn new(watcher: Arc<LogWatcher>) -> Self {
        Self {
            watcher,
            queue: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue a record, starting the persisting task on the current runtime if
    /// none is running
    fn enqueue(&self, item: Queued) {
        let mut queue = self.queue.lock();
        if let Some(tx) = queue.as_ref().filter(|tx| !tx.is_closed()) {
            // A send can only fail if the task stopped since the check; the
            // runtime is shutting down and the record is dropped.
            let _ = tx.send(item);
            return;
        }

        // Entries are persisted on a spawned task; without a runtime there is
        // nowhere to run it.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<Queued>();
        let watcher = self.watcher.clone();
        handle.spawn(PERSISTING.scope((), async move {
            while let Some((record, batch_id)) = rx.recv().await {
                watcher.capture_in(record, batch_id).await;
            }
        }));
        let _ = tx.send(item);
        *queue = Some(tx);
    }
}

fn is_own_target(target: &str) -> bool {
    let krate = target.split("::").next().unwrap_or_default();
    OWN_CRATES.contains(&krate)
}

fn is_persisting() -> bool {
    PERSISTING.try_with(|_| ()).is_ok()
}

impl fmt::Debug for LogLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogLayer").finish_non_exhaustive()
    }
}

impl<S: Subscriber> Layer<S> for LogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_own_target(metadata.target()) || is_persisting() {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            level: level_of(metadata.level()),
            message: visitor.message.unwrap_or_default(),
            target: Some(metadata.target().to_string()),
            fields: visitor.fields,
        };

        self.enqueue((record, batch::current()));
    }
}

fn level_of(level: &Level) -> LogLevel {
    match *level {
        Level::TRACE => LogLevel::Trace,
        Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warn,
        Level::ERROR => LogLevel::Error,
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{:?}", value)));
    }
}
