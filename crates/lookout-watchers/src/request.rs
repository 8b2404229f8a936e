//! Inbound request watcher

use crate::batch;
use crate::filter::IgnoreList;
use crate::shaping::{self, Redactor};
use crate::sink::EntrySink;
use http::{HeaderMap, Method, StatusCode};
use lookout_domain::{CapturedUser, EntryId, RequestPayload};
use serde_json::Value;
use std::time::Duration;

/// A finished inbound request and the response it produced
#[derive(Debug, Clone)]
pub struct InboundExchange {
    /// HTTP method
    pub method: Method,
    /// Path and query as received
    pub uri: String,
    /// Remote address, when known
    pub ip: Option<String>,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body; `None` when it was too large or failed mid-stream
    pub body: Option<Vec<u8>>,
    /// Response status
    pub status: StatusCode,
    /// Response headers
    pub response_headers: HeaderMap,
    /// Response body; `None` when it was too large, streamed or failed mid-stream
    pub response_body: Option<Vec<u8>>,
    /// Time spent producing the response
    pub duration: Duration,
    /// Principal resolved for the request
    pub user: Option<CapturedUser>,
}

impl InboundExchange {
    /// Path component of the URI, without the query string
    pub fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or_default()
    }
}

/// Records inbound requests once their response has been produced
pub struct RequestWatcher {
    sink: EntrySink,
    ignore_paths: IgnoreList,
    redactor: Redactor,
    response_size_limit: usize,
}

impl RequestWatcher {
    /// Create a watcher
    ///
    /// `response_size_limit` is in bytes; larger response bodies are purged.
    pub fn new(
        sink: EntrySink,
        ignore_paths: IgnoreList,
        redactor: Redactor,
        response_size_limit: usize,
    ) -> Self {
        Self {
            sink,
            ignore_paths,
            redactor,
            response_size_limit,
        }
    }

    /// Whether requests to `path` are discarded
    pub fn ignores(&self, path: &str) -> bool {
        self.ignore_paths.matches(path)
    }

    /// Response size limit in bytes
    pub fn response_size_limit(&self) -> usize {
        self.response_size_limit
    }

    /// Record a finished request under the active batch
    pub async fn capture(&self, exchange: InboundExchange) -> Option<EntryId> {
        if self.ignores(exchange.path()) {
            tracing::debug!(path = exchange.path(), "Inbound request matches ignore list");
            return None;
        }

        let response = match &exchange.response_body {
            Some(body) => shaping::purge_oversized(
                shaping::response_body(&exchange.response_headers, body),
                body.len(),
                self.response_size_limit,
            ),
            None => Value::String(shaping::PURGED.to_string()),
        };

        let payload = RequestPayload {
            hostname: self.sink.hostname().to_string(),
            method: exchange.method.as_str().to_uppercase(),
            uri: exchange.uri,
            ip: exchange.ip,
            headers: self.redactor.headers(&exchange.headers),
            payload: match &exchange.body {
                Some(body) => self
                    .redactor
                    .payload(shaping::request_body(&exchange.headers, body)),
                None => Value::String(shaping::PURGED.to_string()),
            },
            response_status: exchange.status.as_u16(),
            response_headers: shaping::plain_headers(&exchange.response_headers),
            response,
            duration_ms: exchange.duration.as_millis() as u64,
            user: exchange.user,
        };

        self.sink.record(&payload, batch::current()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use http::header::CONTENT_TYPE;
    use http::HeaderValue;
    use lookout_domain::{BatchId, Category};
    use std::sync::Arc;

    fn watcher(store: Arc<MemoryStore>, limit: usize) -> RequestWatcher {
        RequestWatcher::new(
            EntrySink::new(store, "test-host"),
            IgnoreList::new(["/health", "/assets/*"]),
            Redactor::new(["password", "cookie"]),
            limit,
        )
    }

    fn exchange(uri: &str) -> InboundExchange {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("cookie", HeaderValue::from_static("session=abc"));
        let mut response_headers = HeaderMap::new();
        response_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        InboundExchange {
            method: Method::POST,
            uri: uri.to_string(),
            ip: Some("10.0.0.1".to_string()),
            headers,
            body: Some(br#"{"user":"ann","password":"hunter2"}"#.to_vec()),
            status: StatusCode::CREATED,
            response_headers,
            response_body: Some(br#"{"id":1}"#.to_vec()),
            duration: Duration::from_millis(12),
            user: Some(CapturedUser {
                id: "u-1".to_string(),
                name: Some("Ann".to_string()),
                email: None,
            }),
        }
    }

    #[tokio::test]
    async fn test_capture_shapes_payload() {
        let store = Arc::new(MemoryStore::default());
        let watcher = watcher(store.clone(), 64 * 1024);

        watcher.capture(exchange("/users?page=2")).await;

        let entries = store.in_category(Category::Request);
        assert_eq!(entries.len(), 1);
        let payload = entries[0].payload();
        assert_eq!(payload["method"], "POST");
        assert_eq!(payload["uri"], "/users?page=2");
        assert_eq!(payload["ip"], "10.0.0.1");
        assert_eq!(payload["headers"]["cookie"], shaping::REDACTED);
        assert_eq!(payload["payload"]["user"], "ann");
        assert_eq!(payload["payload"]["password"], shaping::REDACTED);
        assert_eq!(payload["response_status"], 201);
        assert_eq!(payload["response"]["id"], 1);
        assert_eq!(payload["duration_ms"], 12);
        assert_eq!(payload["user"]["id"], "u-1");
    }

    #[tokio::test]
    async fn test_ignored_paths() {
        let store = Arc::new(MemoryStore::default());
        let watcher = watcher(store.clone(), 64 * 1024);

        assert!(watcher.capture(exchange("/health")).await.is_none());
        assert!(watcher.capture(exchange("/health?verbose=1")).await.is_none());
        assert!(watcher.capture(exchange("/assets/app.js")).await.is_none());
        assert!(watcher.capture(exchange("/healthz")).await.is_some());

        assert_eq!(store.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_response_is_purged() {
        let store = Arc::new(MemoryStore::default());
        let watcher = watcher(store.clone(), 4);

        watcher.capture(exchange("/users")).await;

        assert_eq!(store.entries()[0].payload()["response"], shaping::PURGED);
    }

    #[tokio::test]
    async fn test_unbuffered_response_is_purged() {
        let store = Arc::new(MemoryStore::default());
        let watcher = watcher(store.clone(), 64 * 1024);
        let mut streamed = exchange("/events");
        streamed.response_body = None;

        watcher.capture(streamed).await;

        assert_eq!(store.entries()[0].payload()["response"], shaping::PURGED);
    }

    #[tokio::test]
    async fn test_unbuffered_request_body_is_purged() {
        let store = Arc::new(MemoryStore::default());
        let watcher = watcher(store.clone(), 64 * 1024);
        let mut upload = exchange("/upload");
        upload.body = None;

        watcher.capture(upload).await;

        let payload = store.entries()[0].payload().clone();
        assert_eq!(payload["payload"], shaping::PURGED);
        assert_eq!(payload["response"]["id"], 1);
    }

    #[tokio::test]
    async fn test_capture_uses_active_batch() {
        let store = Arc::new(MemoryStore::default());
        let watcher = watcher(store.clone(), 1024);
        let id = BatchId::from_string("req-1");

        batch::scope(id.clone(), watcher.capture(exchange("/users"))).await;
        watcher.capture(exchange("/users")).await;

        let entries = store.entries();
        assert_eq!(entries[0].batch_id(), Some(&id));
        assert_eq!(entries[1].batch_id(), None);
    }
}
