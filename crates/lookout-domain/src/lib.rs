//! Lookout Domain Layer
//!
//! Value types and trait boundaries for the capture pipeline. Everything here is
//! pure data: watchers build [`Entry`] values and hand them to an
//! [`EntryStorage`] implementation supplied by the embedding application.
//!
//! ## Key Concepts
//!
//! - **Entry**: the immutable record of one captured event
//! - **Category**: the fixed set of event kinds, one per watcher
//! - **Batch**: entries produced while handling one inbound request, linked by a [`BatchId`]
//! - **Storage Port**: the persistence interface watchers write through
//!
//! ## Architecture
//!
//! - No I/O and no runtime dependencies
//! - Payload shapes are typed per category but opaque to storage
//! - Storage drivers live outside this workspace

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod category;
pub mod entry;
pub mod error;
pub mod payload;
pub mod traits;

// Re-exports for convenience
pub use category::Category;
pub use entry::{BatchId, Entry, EntryContent, EntryId};
pub use error::{CaptureError, StorageError};
pub use payload::{
    CapturedUser, ClientRequestPayload, DumpPayload, ErrorPayload, Headers, LogLevel, LogPayload,
    RequestPayload,
};
pub use traits::EntryStorage;
