//! Lookout Watchers
//!
//! One watcher per event category. Every watcher follows the same pipeline:
//!
//! 1. an interception point fires (outbound call resolved, response finished,
//!    error reported, log line, dump call)
//! 2. the watcher applies its ignore policy
//! 3. the payload is shaped (redaction, HTML escaping, size limits)
//! 4. the entry is persisted through the [`EntrySink`], tagged with the batch
//!    that was active when the event was intercepted
//!
//! | Watcher | Category | Filter |
//! |---------|----------|--------|
//! | [`ClientRequestWatcher`] | `client_request` | URL ignore patterns |
//! | [`RequestWatcher`] | `request` | path ignore patterns |
//! | [`ErrorWatcher`] | `error` | error type names |
//! | [`LogWatcher`] | `log` | none |
//! | [`DumpWatcher`] | `dump` | none |
//!
//! All failures are absorbed: capture and storage errors are logged through
//! `tracing` and the entry is dropped. Observed code never sees them.
//!
//! # Ignore patterns
//!
//! ```
//! use lookout_watchers::IgnoreList;
//!
//! let list = IgnoreList::new(["https://api.example.com/health", "https://cdn.example.com/*"]);
//! assert!(list.matches("https://cdn.example.com/assets/a.js"));
//! assert!(list.matches("https://api.example.com/health"));
//! assert!(!list.matches("https://api.example.com/health2"));
//! ```

#![warn(missing_docs)]

pub mod batch;
mod client_request;
mod dump;
mod exception;
mod filter;
mod log;
mod request;
pub mod shaping;
mod sink;

#[cfg(test)]
mod testing;

pub use client_request::{
    CallToken, ClientRequestWatcher, Interceptor, OutboundFailure, OutboundRequest, OutboundResponse,
};
pub use dump::DumpWatcher;
pub use exception::ErrorWatcher;
pub use filter::{IgnoreList, IgnorePattern};
pub use log::{LogRecord, LogWatcher};
pub use request::{InboundExchange, RequestWatcher};
pub use shaping::Redactor;
pub use sink::EntrySink;
