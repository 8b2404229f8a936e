//! Error types shared by watchers and storage drivers
//!
//! Neither error ever reaches the code being observed: both are logged and the
//! affected entry is dropped.

use crate::category::Category;
use thiserror::Error;

/// Failure while building or shaping an entry payload
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Payload could not be represented as JSON
    #[error("Failed to serialize {0} payload: {1}")]
    Serialize(Category, String),
}

/// Failure reported by a storage driver
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend is unreachable or refused the write
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Backend accepted the call but failed to persist the entry
    #[error("Failed to write {category} entry: {message}")]
    Write {
        /// Category of the entry that failed to persist
        category: Category,
        /// Driver-specific message
        message: String,
    },
}
