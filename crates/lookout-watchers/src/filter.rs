//! Ignore patterns for URLs and paths

/// One ignore rule
///
/// A pattern ending in `*` matches by prefix (with the `*` stripped); anything
/// else must match exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnorePattern {
    /// Match the whole string
    Exact(String),
    /// Match anything starting with this prefix
    Prefix(String),
}

impl IgnorePattern {
    /// Parse a configured pattern
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => IgnorePattern::Prefix(prefix.to_string()),
            None => IgnorePattern::Exact(pattern.to_string()),
        }
    }

    /// Whether `candidate` is covered by this pattern
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            IgnorePattern::Exact(exact) => candidate == exact,
            IgnorePattern::Prefix(prefix) => candidate.starts_with(prefix.as_str()),
        }
    }
}

/// Ordered list of ignore patterns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreList {
    /// Build a list from configured pattern strings
    ///
    /// # Examples
    ///
    /// ```
    /// use lookout_watchers::IgnoreList;
    ///
    /// let list = IgnoreList::new(["https://cdn.example.com/*"]);
    /// assert!(list.matches("https://cdn.example.com/assets/a.js"));
    /// assert!(!list.matches("https://api.example.com/users"));
    /// ```
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| IgnorePattern::parse(p.as_ref()))
                .collect(),
        }
    }

    /// Whether any pattern covers `candidate`
    pub fn matches(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(candidate))
    }

    /// Number of patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when no pattern is configured
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
