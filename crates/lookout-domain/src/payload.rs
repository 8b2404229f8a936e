//! Payload schemas, one per category
//!
//! Watchers produce these; storage drivers and viewers may deserialize them back
//! out of [`Entry::payload`](crate::Entry::payload). Field names are the
//! persisted wire names.

use crate::category::Category;
use crate::entry::EntryContent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header map as persisted: lowercase name to value, repeated headers joined with `", "`
pub type Headers = BTreeMap<String, String>;

/// Outbound HTTP call paired with its response or failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRequestPayload {
    /// Host the call was made from
    pub hostname: String,
    /// Uppercased HTTP method
    pub method: String,
    /// Full request URL
    pub uri: String,
    /// Request headers (redacted)
    pub headers: Headers,
    /// Request body
    pub payload: serde_json::Value,
    /// Response status, absent when the call failed before a response arrived
    pub response_status: Option<u16>,
    /// Response headers
    pub response_headers: Headers,
    /// Response body; HTML-escaped when the response is `text/html`
    pub response: serde_json::Value,
}

impl EntryContent for ClientRequestPayload {
    const CATEGORY: Category = Category::ClientRequest;
}

/// Principal that an inbound request was made by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedUser {
    /// Application-level user id
    pub id: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Inbound HTTP request and the response it produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    /// Host that served the request
    pub hostname: String,
    /// Uppercased HTTP method
    pub method: String,
    /// Path and query
    pub uri: String,
    /// Remote address, when the server exposes it
    pub ip: Option<String>,
    /// Request headers (redacted)
    pub headers: Headers,
    /// Request body (redacted)
    pub payload: serde_json::Value,
    /// Response status code
    pub response_status: u16,
    /// Response headers
    pub response_headers: Headers,
    /// Response body, purged when over the size limit
    pub response: serde_json::Value,
    /// Wall time spent in the handler
    pub duration_ms: u64,
    /// Resolved principal
    pub user: Option<CapturedUser>,
}

impl EntryContent for RequestPayload {
    const CATEGORY: Category = Category::Request;
}

/// Error reported while handling a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Host the error was raised on
    pub hostname: String,
    /// Rust type name of the error
    pub name: String,
    /// `Display` output of the error
    pub message: String,
    /// Messages of the `source()` chain, outermost first
    pub sources: Vec<String>,
    /// Caller-supplied context
    pub context: serde_json::Value,
}

impl EntryContent for ErrorPayload {
    const CATEGORY: Category = Category::Error;
}

/// Severity of a captured log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace
    Trace,
    /// Debug
    Debug,
    /// Info
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

impl LogLevel {
    /// Get the level name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// A log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPayload {
    /// Host the line was logged on
    pub hostname: String,
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
    /// Logging target (module path for `tracing` events)
    pub target: Option<String>,
    /// Structured fields
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl EntryContent for LogPayload {
    const CATEGORY: Category = Category::Log;
}

/// An explicitly dumped value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpPayload {
    /// Host the value was dumped on
    pub hostname: String,
    /// The value
    pub dump: serde_json::Value,
}

impl EntryContent for DumpPayload {
    const CATEGORY: Category = Category::Dump;
}
