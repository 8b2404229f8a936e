//! Configuration parsing for Lookout.
//!
//! Loads capture settings from TOML. Everything is validated once, at setup;
//! there is no reconfiguration at runtime.

use http::request::Parts;
use lookout_domain::{CapturedUser, Category};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Watcher name that matches no category
    #[error("Unknown watcher: {0}")]
    UnknownWatcher(String),

    /// Value out of range or otherwise unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Capture settings loaded from TOML
///
/// ```
/// use lookout_capture::LookoutConfig;
///
/// let config = LookoutConfig::from_toml(r#"
///     enabled_watchers = ["RequestWatcher", "ClientRequestWatcher"]
///     client_ignore_urls = ["https://cdn.example.com/*"]
/// "#).unwrap();
/// assert_eq!(config.response_size_limit, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookoutConfig {
    /// Watchers to enable, by watcher or category name
    #[serde(default = "default_enabled_watchers")]
    pub enabled_watchers: Vec<String>,

    /// Largest inbound response body stored verbatim, in KiB
    #[serde(default = "default_response_size_limit")]
    pub response_size_limit: usize,

    /// Largest inbound request body buffered for capture, in KiB
    ///
    /// Larger bodies reach the handler untouched and are stored as purged.
    #[serde(default = "default_request_size_limit")]
    pub request_size_limit: usize,

    /// Header and request-payload names whose values are hidden
    #[serde(default = "default_params_to_hide")]
    pub params_to_hide: Vec<String>,

    /// Inbound request paths that are never recorded
    #[serde(default)]
    pub ignore_paths: Vec<String>,

    /// Outbound request URLs that are never recorded
    #[serde(default)]
    pub client_ignore_urls: Vec<String>,

    /// Error type names that are never recorded
    #[serde(default)]
    pub ignore_errors: Vec<String>,

    /// Whether the embedding application serves the dashboard client
    #[serde(default = "default_enable_client")]
    pub enable_client: bool,

    /// Host name stamped on every entry (default: resolved from the environment)
    #[serde(default)]
    pub hostname: Option<String>,
}

fn default_enabled_watchers() -> Vec<String> {
    Category::ALL
        .iter()
        .map(|c| c.watcher_name().to_string())
        .collect()
}

/// Default response size limit: 64 KiB
fn default_response_size_limit() -> usize {
    64
}

fn default_request_size_limit() -> usize {
    64
}

fn default_params_to_hide() -> Vec<String> {
    vec!["password".to_string(), "token".to_string(), "_csrf".to_string()]
}

fn default_enable_client() -> bool {
    true
}

impl Default for LookoutConfig {
    fn default() -> Self {
        Self {
            enabled_watchers: default_enabled_watchers(),
            response_size_limit: default_response_size_limit(),
            request_size_limit: default_request_size_limit(),
            params_to_hide: default_params_to_hide(),
            ignore_paths: Vec::new(),
            client_ignore_urls: Vec::new(),
            ignore_errors: Vec::new(),
            enable_client: default_enable_client(),
            hostname: None,
        }
    }
}

impl LookoutConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: LookoutConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.enabled_categories()?;
        if self.response_size_limit == 0 {
            return Err(ConfigError::Invalid(
                "response_size_limit must be greater than 0".to_string(),
            ));
        }
        if self.request_size_limit == 0 {
            return Err(ConfigError::Invalid(
                "request_size_limit must be greater than 0".to_string(),
            ));
        }
        if matches!(&self.hostname, Some(h) if h.trim().is_empty()) {
            return Err(ConfigError::Invalid("hostname must not be empty".to_string()));
        }
        Ok(())
    }

    /// Enabled watchers as categories, in configured order without duplicates
    pub fn enabled_categories(&self) -> Result<Vec<Category>, ConfigError> {
        let mut categories = Vec::with_capacity(self.enabled_watchers.len());
        for name in &self.enabled_watchers {
            let category = Category::parse(name.trim())
                .ok_or_else(|| ConfigError::UnknownWatcher(name.clone()))?;
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        Ok(categories)
    }

    /// Response size limit in bytes
    pub fn response_size_limit_bytes(&self) -> usize {
        self.response_size_limit.saturating_mul(1024)
    }

    /// Request size limit in bytes
    pub fn request_size_limit_bytes(&self) -> usize {
        self.request_size_limit.saturating_mul(1024)
    }

    /// Host name to stamp on entries
    ///
    /// Configured value, then `$HOSTNAME`, then `/etc/hostname`, then `localhost`.
    pub fn resolve_hostname(&self) -> String {
        if let Some(hostname) = &self.hostname {
            return hostname.clone();
        }
        if let Ok(hostname) = std::env::var("HOSTNAME") {
            if !hostname.trim().is_empty() {
                return hostname.trim().to_string();
            }
        }
        if let Ok(hostname) = std::fs::read_to_string("/etc/hostname") {
            if !hostname.trim().is_empty() {
                return hostname.trim().to_string();
            }
        }
        "localhost".to_string()
    }
}

/// Predicate deciding who may open the inspection UI
pub type Authorizer = Arc<dyn Fn(&Parts) -> bool + Send + Sync>;

/// Resolves the principal an inbound request acts for
pub type UserResolver = Arc<dyn Fn(&Parts) -> Option<CapturedUser> + Send + Sync>;

/// Everything `Lookout::setup` consumes besides the storage driver
#[derive(Clone, Default)]
pub struct LookoutOptions {
    /// Serializable settings
    pub config: LookoutConfig,

    /// Inspection UI authorization; allows everyone when unset
    pub authorizer: Option<Authorizer>,

    /// User attribution for inbound requests
    pub user_resolver: Option<UserResolver>,

    /// Client to capture outbound calls through; a default client when unset
    pub http_client: Option<reqwest::Client>,
}

impl LookoutOptions {
    /// Options around an existing configuration
    pub fn new(config: LookoutConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set the inspection UI authorization predicate
    pub fn with_authorizer<F>(mut self, authorizer: F) -> Self
    where
        F: Fn(&Parts) -> bool + Send + Sync + 'static,
    {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }

    /// Set the user resolver
    pub fn with_user_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Parts) -> Option<CapturedUser> + Send + Sync + 'static,
    {
        self.user_resolver = Some(Arc::new(resolver));
        self
    }

    /// Capture outbound calls through this client
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl fmt::Debug for LookoutOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookoutOptions")
            .field("config", &self.config)
            .field("authorizer", &self.authorizer.is_some())
            .field("user_resolver", &self.user_resolver.is_some())
            .field("http_client", &self.http_client.is_some())
            .finish()
    }
}
