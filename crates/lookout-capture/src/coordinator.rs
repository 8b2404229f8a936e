//! Capture coordinator: owns the enabled watchers and their hook registrations.

use crate::client::CapturingClient;
use crate::config::{Authorizer, ConfigError, LookoutConfig, LookoutOptions, UserResolver};
use crate::log_layer::LogLayer;
use http::request::Parts;
use lookout_domain::{BatchId, CapturedUser, Category, EntryId, EntryStorage, LogLevel};
use lookout_watchers::{
    ClientRequestWatcher, DumpWatcher, EntrySink, ErrorWatcher, IgnoreList, LogRecord, LogWatcher,
    Redactor, RequestWatcher,
};
use serde::Serialize;
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Process-wide capture coordinator
///
/// Cheap to clone; clones share watchers, hooks and configuration.
///
/// # Examples
///
/// ```no_run
/// use lookout_capture::{Lookout, LookoutConfig, LookoutOptions};
/// # use lookout_domain::{Entry, EntryStorage, StorageError};
/// # struct Discard;
/// # #[async_trait::async_trait]
/// # impl EntryStorage for Discard {
/// #     async fn save(&self, _: &Entry) -> Result<(), StorageError> { Ok(()) }
/// # }
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = LookoutConfig::from_file("lookout.toml")?;
/// let lookout = Lookout::setup(LookoutOptions::new(config), Arc::new(Discard))?;
///
/// // Outbound calls made through this client are recorded
/// let client = lookout.http_client();
/// client.get("https://api.example.com/users").send().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Lookout {
    inner: Arc<Inner>,
}

struct Inner {
    config: LookoutConfig,
    enabled: Vec<Category>,
    client: CapturingClient,
    client_request: Option<Arc<ClientRequestWatcher>>,
    request: Option<RequestWatcher>,
    error: Option<ErrorWatcher>,
    log: Option<Arc<LogWatcher>>,
    dump: Option<DumpWatcher>,
    authorizer: Option<Authorizer>,
    user_resolver: Option<UserResolver>,
}

impl Lookout {
    /// Validate options, build the enabled watchers and register their hooks
    ///
    /// Call once at startup, before serving.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unknown watcher names or unusable values.
    pub fn setup(options: LookoutOptions, storage: Arc<dyn EntryStorage>) -> Result<Self, ConfigError> {
        let LookoutOptions {
            config,
            authorizer,
            user_resolver,
            http_client,
        } = options;

        config.validate()?;
        let enabled = config.enabled_categories()?;
        let hostname = config.resolve_hostname();
        let sink = EntrySink::new(storage, hostname.as_str());
        let redactor = Redactor::new(&config.params_to_hide);
        let is_enabled = |category: Category| enabled.contains(&category);

        let client_request = is_enabled(Category::ClientRequest).then(|| {
            Arc::new(ClientRequestWatcher::new(
                sink.clone(),
                IgnoreList::new(&config.client_ignore_urls),
                redactor.clone(),
            ))
        });
        let request = is_enabled(Category::Request).then(|| {
            RequestWatcher::new(
                sink.clone(),
                IgnoreList::new(&config.ignore_paths),
                redactor.clone(),
                config.response_size_limit_bytes(),
            )
        });
        let error = is_enabled(Category::Error)
            .then(|| ErrorWatcher::new(sink.clone(), config.ignore_errors.iter().cloned()));
        let log = is_enabled(Category::Log).then(|| Arc::new(LogWatcher::new(sink.clone())));
        let dump = is_enabled(Category::Dump).then(|| DumpWatcher::new(sink.clone()));

        let client = http_client.map(CapturingClient::wrap).unwrap_or_default();

        let lookout = Self {
            inner: Arc::new(Inner {
                config,
                enabled,
                client,
                client_request,
                request,
                error,
                log,
                dump,
                authorizer,
                user_resolver,
            }),
        };
        lookout.attach(&lookout.inner.client);

        tracing::info!(
            hostname = %hostname,
            watchers = ?lookout.enabled_watchers(),
            "Lookout capture enabled"
        );

        Ok(lookout)
    }

    /// Install this coordinator's outbound hooks on `client`
    ///
    /// Idempotent: attaching the same client any number of times leaves one
    /// hook per watcher.
    pub fn attach(&self, client: &CapturingClient) {
        if let Some(watcher) = &self.inner.client_request {
            let added = client
                .interceptors()
                .install(Category::ClientRequest, watcher.clone());
            if !added {
                tracing::debug!("Outbound hooks already installed, replaced in place");
            }
        }
    }

    /// Start a new batch for an inbound request
    ///
    /// The id becomes active once the request future runs inside
    /// [`batch::scope`](lookout_watchers::batch::scope); the middleware does both.
    pub fn begin_batch(&self) -> BatchId {
        let id = BatchId::new();
        tracing::trace!(batch_id = %id, "Batch started");
        id
    }

    /// Names of the enabled watchers, in configured order
    pub fn enabled_watchers(&self) -> Vec<&'static str> {
        self.inner.enabled.iter().map(|c| c.watcher_name()).collect()
    }

    /// Whether the watcher for `category` is enabled
    pub fn is_enabled(&self, category: Category) -> bool {
        self.inner.enabled.contains(&category)
    }

    /// Configuration this coordinator was set up with
    pub fn config(&self) -> &LookoutConfig {
        &self.inner.config
    }

    /// Whether the embedding application serves the dashboard client
    pub fn enable_client(&self) -> bool {
        self.inner.config.enable_client
    }

    /// The shared capturing client
    pub fn http_client(&self) -> CapturingClient {
        self.inner.client.clone()
    }

    /// `tracing` layer feeding the log watcher, when it is enabled
    pub fn log_layer(&self) -> Option<LogLayer> {
        self.inner.log.clone().map(LogLayer::new)
    }

    /// Whether the request may open the inspection UI
    pub fn is_authorized(&self, parts: &Parts) -> bool {
        self.inner
            .authorizer
            .as_ref()
            .map_or(true, |authorize| authorize(parts))
    }

    /// Principal the request acts for
    pub fn resolve_user(&self, parts: &Parts) -> Option<CapturedUser> {
        self.inner.user_resolver.as_ref().and_then(|resolve| resolve(parts))
    }

    /// Record an error under the active batch
    pub async fn report_error<E>(&self, error: &E, context: Value) -> Option<EntryId>
    where
        E: StdError + Sync + 'static,
    {
        match &self.inner.error {
            Some(watcher) => watcher.capture(error, context).await,
            None => None,
        }
    }

    /// Record a log line under the active batch
    pub async fn log(&self, level: LogLevel, message: impl Into<String>) -> Option<EntryId> {
        match &self.inner.log {
            Some(watcher) => watcher.capture(LogRecord::new(level, message)).await,
            None => None,
        }
    }

    /// Record a log record with target and fields under the active batch
    pub async fn log_record(&self, record: LogRecord) -> Option<EntryId> {
        match &self.inner.log {
            Some(watcher) => watcher.capture(record).await,
            None => None,
        }
    }

    /// Record any serializable value under the active batch
    pub async fn dump<T>(&self, value: &T) -> Option<EntryId>
    where
        T: Serialize + Sync + ?Sized,
    {
        match &self.inner.dump {
            Some(watcher) => watcher.capture(value).await,
            None => None,
        }
    }

    pub(crate) fn request_watcher(&self) -> Option<&RequestWatcher> {
        self.inner.request.as_ref()
    }
}

impl fmt::Debug for Lookout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookout")
            .field("enabled", &self.inner.enabled)
            .field("client", &self.inner.client)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lookout_domain::{Entry, StorageError};
    use lookout_watchers::batch;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        entries: Mutex<Vec<Entry>>,
    }

    #[async_trait]
    impl EntryStorage for MemoryStore {
        async fn save(&self, entry: &Entry) -> Result<(), StorageError> {
            self.entries.lock().push(entry.clone());
            Ok(())
        }
    }

    fn config(watchers: &[&str]) -> LookoutConfig {
        LookoutConfig {
            enabled_watchers: watchers.iter().map(|w| w.to_string()).collect(),
            hostname: Some("test-host".to_string()),
            ..Default::default()
        }
    }

    fn setup(watchers: &[&str]) -> (Lookout, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let lookout = Lookout::setup(LookoutOptions::new(config(watchers)), store.clone()).unwrap();
        (lookout, store)
    }

    #[test]
    fn test_enabled_watchers_query() {
        let (lookout, _) = setup(&["dump", "RequestWatcher", "DumpWatcher"]);
        assert_eq!(lookout.enabled_watchers(), vec!["DumpWatcher", "RequestWatcher"]);
        assert!(lookout.is_enabled(Category::Dump));
        assert!(!lookout.is_enabled(Category::Log));
    }

    #[test]
    fn test_setup_rejects_unknown_watcher() {
        let result = Lookout::setup(
            LookoutOptions::new(config(&["CacheWatcher"])),
            Arc::new(MemoryStore::default()),
        );
        assert!(matches!(result, Err(ConfigError::UnknownWatcher(_))));
    }

    #[test]
    fn test_outbound_hooks_installed_once() {
        let (lookout, _) = setup(&["ClientRequestWatcher"]);
        let client = lookout.http_client();
        assert_eq!(client.interceptors().len(), 1);

        lookout.attach(&client);
        lookout.attach(&client);
        assert_eq!(client.interceptors().len(), 1);

        let external = CapturingClient::new();
        lookout.attach(&external);
        lookout.attach(&external);
        assert_eq!(external.interceptors().len(), 1);
    }

    #[test]
    fn test_no_hooks_when_client_watcher_disabled() {
        let (lookout, _) = setup(&["RequestWatcher"]);
        assert!(lookout.http_client().interceptors().is_empty());
    }

    #[test]
    fn test_begin_batch_is_fresh() {
        let (lookout, _) = setup(&[]);
        assert_ne!(lookout.begin_batch(), lookout.begin_batch());
    }

    #[tokio::test]
    async fn test_entries_in_one_batch_share_id() {
        let (lookout, store) = setup(&["LogWatcher", "DumpWatcher", "ErrorWatcher"]);
        let id = lookout.begin_batch();

        batch::scope(id.clone(), async {
            lookout.log(LogLevel::Info, "loading").await;
            lookout.dump(&serde_json::json!({"step": 1})).await;
            let err = "x".parse::<i32>().unwrap_err();
            lookout.report_error(&err, Value::Null).await;
        })
        .await;

        let entries = store.entries.lock();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.batch_id() == Some(&id)));
        assert_eq!(entries[0].category(), Category::Log);
        assert_eq!(entries[1].category(), Category::Dump);
        assert_eq!(entries[2].category(), Category::Error);
        assert_eq!(entries[0].payload()["hostname"], "test-host");
    }

    #[tokio::test]
    async fn test_disabled_watchers_record_nothing() {
        let (lookout, store) = setup(&["RequestWatcher"]);

        assert!(lookout.log(LogLevel::Warn, "x").await.is_none());
        assert!(lookout.dump(&1).await.is_none());
        assert!(store.entries.lock().is_empty());
    }

    #[test]
    fn test_authorizer_and_user_resolver() {
        let store = Arc::new(MemoryStore::default());
        let options = LookoutOptions::new(config(&[]))
            .with_authorizer(|parts| parts.headers.contains_key("x-admin"))
            .with_user_resolver(|parts| {
                parts.headers.get("x-user").and_then(|v| v.to_str().ok()).map(|id| CapturedUser {
                    id: id.to_string(),
                    name: None,
                    email: None,
                })
            });
        let lookout = Lookout::setup(options, store).unwrap();

        let (anonymous, _) = http::Request::builder().uri("/").body(()).unwrap().into_parts();
        let (admin, _) = http::Request::builder()
            .uri("/")
            .header("x-admin", "1")
            .header("x-user", "u-7")
            .body(())
            .unwrap()
            .into_parts();

        assert!(!lookout.is_authorized(&anonymous));
        assert!(lookout.is_authorized(&admin));
        assert_eq!(lookout.resolve_user(&admin).map(|u| u.id), Some("u-7".to_string()));
        assert!(lookout.resolve_user(&anonymous).is_none());
    }

    #[test]
    fn test_default_authorizer_allows() {
        let (lookout, _) = setup(&[]);
        let (parts, _) = http::Request::builder().uri("/").body(()).unwrap().into_parts();
        assert!(lookout.is_authorized(&parts));
    }
}
