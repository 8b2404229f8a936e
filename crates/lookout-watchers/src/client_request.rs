//! Outbound HTTP watcher
//!
//! The capturing client fires three hooks around every call: [`Interceptor::on_send`]
//! before the request leaves, then exactly one of [`Interceptor::on_response`] or
//! [`Interceptor::on_failure`] (or [`Interceptor::on_abandon`] if the caller drops
//! the call midway). Each call carries its own [`CallToken`]; pending requests are
//! kept in a map keyed by that token, so overlapping calls are never cross-paired.

use crate::batch;
use crate::filter::IgnoreList;
use crate::shaping::{self, Redactor};
use crate::sink::EntrySink;
use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use lookout_domain::{BatchId, ClientRequestPayload, EntryId};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-call correlation token issued at send time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallToken(u64);

impl CallToken {
    /// Issue a process-unique token
    pub fn issue() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw token value
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Snapshot of an outbound request taken just before it is sent
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// HTTP method
    pub method: Method,
    /// Full URL
    pub url: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Buffered body; `None` for streaming bodies
    pub body: Option<Vec<u8>>,
}

/// Response received for an outbound request, with its body fully buffered
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Vec<u8>,
}

/// Failure of an outbound request
#[derive(Debug, Clone)]
pub struct OutboundFailure {
    /// Status, when the failure came with one
    pub status: Option<StatusCode>,
    /// Error description
    pub message: String,
}

/// Hooks fired by the capturing client around each outbound call
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Called before the request is sent
    fn on_send(&self, token: CallToken, request: &OutboundRequest);

    /// Called once the response and its body have arrived
    async fn on_response(&self, token: CallToken, response: &OutboundResponse);

    /// Called when the call failed
    async fn on_failure(&self, token: CallToken, failure: &OutboundFailure);

    /// Called when the call was dropped before either outcome was observed
    fn on_abandon(&self, _token: CallToken) {}
}

struct PendingCall {
    request: OutboundRequest,
    batch_id: Option<BatchId>,
}

/// Records outbound HTTP calls paired with their response or failure
pub struct ClientRequestWatcher {
    sink: EntrySink,
    ignore_urls: IgnoreList,
    redactor: Redactor,
    pending: Mutex<HashMap<CallToken, PendingCall>>,
}

impl ClientRequestWatcher {
    /// Create a watcher
    pub fn new(sink: EntrySink, ignore_urls: IgnoreList, redactor: Redactor) -> Self {
        Self {
            sink,
            ignore_urls,
            redactor,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Whether calls to `url` are discarded
    pub fn ignores(&self, url: &str) -> bool {
        self.ignore_urls.matches(url)
    }

    /// Number of calls sent but not yet resolved
    pub fn pending_calls(&self) -> usize {
        self.pending.lock().len()
    }

    fn take(&self, token: CallToken) -> Option<PendingCall> {
        let pending = self.pending.lock().remove(&token);
        if pending.is_none() {
            tracing::debug!(token = token.value(), "No pending request for outbound call, dropping event");
        }
        pending
    }

    async fn persist(
        &self,
        call: PendingCall,
        status: Option<StatusCode>,
        response_headers: &HeaderMap,
        response: Value,
    ) -> Option<EntryId> {
        let PendingCall { request, batch_id } = call;

        if self.ignores(&request.url) {
            tracing::debug!(url = %request.url, "Outbound call matches ignore list");
            return None;
        }

        let payload = ClientRequestPayload {
            hostname: self.sink.hostname().to_string(),
            method: request.method.as_str().to_uppercase(),
            uri: request.url,
            headers: self.redactor.headers(&request.headers),
            payload: self.redactor.payload(shaping::request_body(
                &request.headers,
                request.body.as_deref().unwrap_or_default(),
            )),
            response_status: status.map(|s| s.as_u16()),
            response_headers: shaping::plain_headers(response_headers),
            response,
        };

        self.sink.record(&payload, batch_id).await
    }
}

#[async_trait]
impl Interceptor for ClientRequestWatcher {
    fn on_send(&self, token: CallToken, request: &OutboundRequest) {
        let call = PendingCall {
            request: request.clone(),
            batch_id: batch::current(),
        };
        self.pending.lock().insert(token, call);
    }

    async fn on_response(&self, token: CallToken, response: &OutboundResponse) {
        let Some(call) = self.take(token) else {
            return;
        };
        let body = shaping::response_body(&response.headers, &response.body);
        self.persist(call, Some(response.status), &response.headers, body).await;
    }

    async fn on_failure(&self, token: CallToken, failure: &OutboundFailure) {
        let Some(call) = self.take(token) else {
            return;
        };
        let body = serde_json::json!({ "error": failure.message });
        self.persist(call, failure.status, &HeaderMap::new(), body).await;
    }

    fn on_abandon(&self, token: CallToken) {
        self.pending.lock().remove(&token);
    }
}
