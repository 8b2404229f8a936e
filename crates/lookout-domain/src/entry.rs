//! Entry module - the normalized record of one captured event

use crate::category::Category;
use crate::error::CaptureError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for an entry based on UUIDv7
///
/// UUIDv7 keeps identifiers chronologically sortable, so a storage backend can
/// order entries by id without a secondary index on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(uuid::Uuid);

impl EntryId {
    /// Generate a new UUIDv7-based EntryId
    ///
    /// # Examples
    ///
    /// ```
    /// use lookout_domain::EntryId;
    ///
    /// let a = EntryId::new();
    /// let b = EntryId::new();
    /// assert_ne!(a, b);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Parse an EntryId from its string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid entry id: {}", e))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation id shared by every entry captured while handling one inbound request
///
/// Opaque to everything except equality. Fresh ids are UUIDv7 strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Generate a fresh batch id
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Wrap an existing correlation id (e.g. loaded back from storage)
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A payload type that belongs to exactly one category
///
/// Watchers implement this for their payload structs; the category travels with
/// the type so an entry can never be tagged with the wrong one.
pub trait EntryContent: Serialize {
    /// Category this payload is recorded under
    const CATEGORY: Category;
}

/// A captured event
///
/// Entries are immutable once created. The payload is held as JSON and is never
/// inspected by the entry model or by storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    id: EntryId,
    category: Category,
    batch_id: Option<BatchId>,
    payload: serde_json::Value,
    created_at: u64,
}

impl Entry {
    /// Create a new entry from a typed payload
    ///
    /// `created_at` is stamped here, at construction, so ordering reflects when
    /// the event happened rather than when storage finished.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Serialize`] if the payload cannot be represented as JSON.
    pub fn new<P: EntryContent>(payload: &P, batch_id: Option<BatchId>) -> Result<Self, CaptureError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| CaptureError::Serialize(P::CATEGORY, e.to_string()))?;

        Ok(Self {
            id: EntryId::new(),
            category: P::CATEGORY,
            batch_id,
            payload,
            created_at: now_millis(),
        })
    }

    /// Entry identifier
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Category of the captured event
    pub fn category(&self) -> Category {
        self.category
    }

    /// Batch this entry belongs to, if it was captured inside a request
    pub fn batch_id(&self) -> Option<&BatchId> {
        self.batch_id.as_ref()
    }

    /// Category-specific payload
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Construction time in milliseconds since the Unix epoch
    pub fn created_at(&self) -> u64 {
        self.created_at
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
