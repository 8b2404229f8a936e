//! Error watcher

use crate::batch;
use crate::sink::EntrySink;
use lookout_domain::{EntryId, ErrorPayload};
use serde_json::Value;
use std::error::Error as StdError;

/// Records reported errors, skipping configured error types
pub struct ErrorWatcher {
    sink: EntrySink,
    ignore_errors: Vec<String>,
}

impl ErrorWatcher {
    /// Create a watcher
    ///
    /// `ignore_errors` holds type names, either fully qualified
    /// (`std::io::Error`) or bare (`Error`, `ParseIntError`).
    pub fn new<I, S>(sink: EntrySink, ignore_errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sink,
            ignore_errors: ignore_errors.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether errors of the named type are discarded
    pub fn ignores(&self, type_name: &str) -> bool {
        let short = short_type_name(type_name);
        self.ignore_errors
            .iter()
            .any(|ignored| ignored == type_name || ignored == short)
    }

    /// Record a typed error
    pub async fn capture<E>(&self, error: &E, context: Value) -> Option<EntryId>
    where
        E: StdError + Sync + 'static,
    {
        self.capture_named(std::any::type_name::<E>(), error, context).await
    }

    /// Record an error whose concrete type is known only by name
    pub async fn capture_named(
        &self,
        type_name: &str,
        error: &(dyn StdError + Sync + 'static),
        context: Value,
    ) -> Option<EntryId> {
        if self.ignores(type_name) {
            tracing::debug!(error_type = type_name, "Error type is ignored");
            return None;
        }

        let payload = ErrorPayload {
            hostname: self.sink.hostname().to_string(),
            name: type_name.to_string(),
            message: error.to_string(),
            sources: source_chain(error),
            context,
        };

        self.sink.record(&payload, batch::current()).await
    }
}

/// Messages of the `source()` chain, outermost first
fn source_chain(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut sources = Vec::new();
    let mut source = error.source();
    while let Some(inner) = source {
        sources.push(inner.to_string());
        source = inner.source();
    }
    sources
}

/// Last path segment of a type name, ignoring generic arguments
///
/// `core::num::error::ParseIntError` becomes `ParseIntError`,
/// `my::Wrapper<other::Inner>` becomes `Wrapper`.
fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}
