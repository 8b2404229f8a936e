//! Capturing wrapper around the shared outbound HTTP client.
//!
//! Every call issues a [`CallToken`] and fires the installed interceptors:
//! `on_send` before the request leaves, then `on_response` or `on_failure` once
//! the outcome is known. The caller always receives the real outcome of the
//! call, whatever the interceptors do.

use http::{HeaderMap, HeaderValue, Method};
use lookout_domain::Category;
use lookout_watchers::{CallToken, Interceptor, OutboundFailure, OutboundRequest, OutboundResponse};
use parking_lot::RwLock;
use reqwest::{IntoUrl, Request, Response, ResponseBuilderExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Interceptors installed on a client, at most one per watcher category
#[derive(Clone, Default)]
pub struct InterceptorSet {
    hooks: Arc<RwLock<Vec<(Category, Arc<dyn Interceptor>)>>>,
}

impl InterceptorSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `hook` under `key`, replacing any hook already installed for it
    ///
    /// Returns `true` if no hook was installed for `key` before. Installing the
    /// same key twice never leaves two hooks behind.
    pub fn install(&self, key: Category, hook: Arc<dyn Interceptor>) -> bool {
        let mut hooks = self.hooks.write();
        match hooks.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => {
                slot.1 = hook;
                false
            }
            None => {
                hooks.push((key, hook));
                true
            }
        }
    }

    /// Remove the hook installed under `key`
    pub fn uninstall(&self, key: Category) -> bool {
        let mut hooks = self.hooks.write();
        let before = hooks.len();
        hooks.retain(|(k, _)| *k != key);
        hooks.len() != before
    }

    /// Whether a hook is installed under `key`
    pub fn contains(&self, key: Category) -> bool {
        self.hooks.read().iter().any(|(k, _)| *k == key)
    }

    /// Number of installed hooks
    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    /// True when no hook is installed
    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Interceptor>> {
        self.hooks.read().iter().map(|(_, hook)| hook.clone()).collect()
    }
}

impl fmt::Debug for InterceptorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<Category> = self.hooks.read().iter().map(|(k, _)| *k).collect();
        f.debug_struct("InterceptorSet").field("hooks", &keys).finish()
    }
}

/// Fires `on_abandon` if the call future is dropped before an outcome was dispatched
struct AbandonGuard<'a> {
    hooks: &'a [Arc<dyn Interceptor>],
    token: CallToken,
    armed: bool,
}

impl AbandonGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            for hook in self.hooks {
                hook.on_abandon(self.token);
            }
        }
    }
}

/// Outbound HTTP client whose calls are observed by the installed interceptors
#[derive(Clone, Default)]
pub struct CapturingClient {
    inner: reqwest::Client,
    interceptors: InterceptorSet,
}

impl CapturingClient {
    /// Wrap a default `reqwest` client
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing `reqwest` client
    pub fn wrap(inner: reqwest::Client) -> Self {
        Self {
            inner,
            interceptors: InterceptorSet::new(),
        }
    }

    /// Interceptors installed on this client (shared by all clones)
    pub fn interceptors(&self) -> &InterceptorSet {
        &self.interceptors
    }

    /// The wrapped client; calls made through it directly are not captured
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Start building a request
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> CapturingRequestBuilder {
        CapturingRequestBuilder {
            client: self.clone(),
            builder: self.inner.request(method, url),
        }
    }

    /// Start building a GET request
    pub fn get<U: IntoUrl>(&self, url: U) -> CapturingRequestBuilder {
        self.request(Method::GET, url)
    }

    /// Start building a POST request
    pub fn post<U: IntoUrl>(&self, url: U) -> CapturingRequestBuilder {
        self.request(Method::POST, url)
    }

    /// Start building a PUT request
    pub fn put<U: IntoUrl>(&self, url: U) -> CapturingRequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Start building a PATCH request
    pub fn patch<U: IntoUrl>(&self, url: U) -> CapturingRequestBuilder {
        self.request(Method::PATCH, url)
    }

    /// Start building a DELETE request
    pub fn delete<U: IntoUrl>(&self, url: U) -> CapturingRequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Send a request, notifying every installed interceptor
    ///
    /// With interceptors installed the response body is buffered so it can be
    /// recorded; the returned response carries the same status, version,
    /// headers, final URL and body.
    pub async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        let hooks = self.interceptors.snapshot();
        if hooks.is_empty() {
            return self.inner.execute(request).await;
        }

        let token = CallToken::issue();
        let descriptor = OutboundRequest {
            method: request.method().clone(),
            url: request.url().to_string(),
            headers: request.headers().clone(),
            body: request.body().and_then(|b| b.as_bytes()).map(<[u8]>::to_vec),
        };
        for hook in &hooks {
            hook.on_send(token, &descriptor);
        }

        let mut guard = AbandonGuard {
            hooks: &hooks,
            token,
            armed: true,
        };

        let response = match self.inner.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                guard.disarm();
                notify_failure(&hooks, token, &e).await;
                return Err(e);
            }
        };

        let status = response.status();
        let version = response.version();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                guard.disarm();
                notify_failure(&hooks, token, &e).await;
                return Err(e);
            }
        };

        guard.disarm();
        let captured = OutboundResponse {
            status,
            headers: headers.clone(),
            body: body.to_vec(),
        };
        for hook in &hooks {
            hook.on_response(token, &captured).await;
        }

        let mut rebuilt = http::Response::builder()
            .url(url)
            .body(())
            .unwrap_or_default()
            .map(|()| body);
        *rebuilt.status_mut() = status;
        *rebuilt.version_mut() = version;
        *rebuilt.headers_mut() = headers;
        Ok(Response::from(rebuilt))
    }
}

async fn notify_failure(hooks: &[Arc<dyn Interceptor>], token: CallToken, error: &reqwest::Error) {
    let failure = OutboundFailure {
        status: error.status(),
        message: error.to_string(),
    };
    for hook in hooks {
        hook.on_failure(token, &failure).await;
    }
}

impl fmt::Debug for CapturingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturingClient")
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}

/// Request builder whose `send` goes through [`CapturingClient::execute`]
#[must_use = "a request builder does nothing until sent"]
pub struct CapturingRequestBuilder {
    client: CapturingClient,
    builder: reqwest::RequestBuilder,
}

impl CapturingRequestBuilder {
    /// Add a header
    pub fn header<K, V>(self, key: K, value: V) -> Self
    where
        http::HeaderName: TryFrom<K>,
        <http::HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.map(|b| b.header(key, value))
    }

    /// Merge a header map
    pub fn headers(self, headers: HeaderMap) -> Self {
        self.map(|b| b.headers(headers))
    }

    /// Set a bearer token
    pub fn bearer_auth<T: fmt::Display>(self, token: T) -> Self {
        self.map(|b| b.bearer_auth(token))
    }

    /// Set a raw body
    pub fn body<T: Into<reqwest::Body>>(self, body: T) -> Self {
        self.map(|b| b.body(body))
    }

    /// Set a JSON body
    pub fn json<T: Serialize + ?Sized>(self, json: &T) -> Self {
        self.map(|b| b.json(json))
    }

    /// Append query parameters
    pub fn query<T: Serialize + ?Sized>(self, query: &T) -> Self {
        self.map(|b| b.query(query))
    }

    /// Set a per-request timeout
    pub fn timeout(self, timeout: Duration) -> Self {
        self.map(|b| b.timeout(timeout))
    }

    /// Apply any other `reqwest::RequestBuilder` setting
    pub fn map<F>(mut self, f: F) -> Self
    where
        F: FnOnce(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    {
        self.builder = f(self.builder);
        self
    }

    /// Build and send the request
    pub async fn send(self) -> reqwest::Result<Response> {
        let request = self.builder.build()?;
        self.client.execute(request).await
    }
}

impl fmt::Debug for CapturingRequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturingRequestBuilder")
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Interceptor for Noop {
        fn on_send(&self, _token: CallToken, _request: &OutboundRequest) {}
        async fn on_response(&self, _token: CallToken, _response: &OutboundResponse) {}
        async fn on_failure(&self, _token: CallToken, _failure: &OutboundFailure) {}
    }

    #[test]
    fn test_install_is_keyed_by_category() {
        let set = InterceptorSet::new();
        assert!(set.install(Category::ClientRequest, Arc::new(Noop)));
        assert!(!set.install(Category::ClientRequest, Arc::new(Noop)));
        assert_eq!(set.len(), 1);
        assert!(set.contains(Category::ClientRequest));
    }

    #[test]
    fn test_uninstall() {
        let set = InterceptorSet::new();
        set.install(Category::ClientRequest, Arc::new(Noop));
        assert!(set.uninstall(Category::ClientRequest));
        assert!(!set.uninstall(Category::ClientRequest));
        assert!(set.is_empty());
    }

    #[test]
    fn test_clones_share_interceptors() {
        let client = CapturingClient::new();
        let clone = client.clone();
        client.interceptors().install(Category::ClientRequest, Arc::new(Noop));
        assert_eq!(clone.interceptors().len(), 1);
    }
}
