//! Category module - the fixed set of event kinds an entry can record

use serde::{Deserialize, Serialize};

/// Category of a captured event
///
/// Each category is owned by exactly one watcher. New kinds of events are added
/// by introducing a new watcher and a new variant here, never by ad-hoc tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Outbound HTTP call made by the process
    ClientRequest,

    /// Inbound HTTP request handled by the process
    Request,

    /// Error reported while handling a request
    Error,

    /// Log line
    Log,

    /// Explicitly dumped value
    Dump,
}

impl Category {
    /// Every category, in canonical order
    pub const ALL: [Category; 5] = [
        Category::ClientRequest,
        Category::Request,
        Category::Error,
        Category::Log,
        Category::Dump,
    ];

    /// Get the category name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ClientRequest => "client_request",
            Category::Request => "request",
            Category::Error => "error",
            Category::Log => "log",
            Category::Dump => "dump",
        }
    }

    /// Name of the watcher that owns this category
    pub fn watcher_name(&self) -> &'static str {
        match self {
            Category::ClientRequest => "ClientRequestWatcher",
            Category::Request => "RequestWatcher",
            Category::Error => "ErrorWatcher",
            Category::Log => "LogWatcher",
            Category::Dump => "DumpWatcher",
        }
    }

    /// Parse a category from either its category name or its watcher name
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s) || c.watcher_name().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown watcher: {}", s))
    }
}
