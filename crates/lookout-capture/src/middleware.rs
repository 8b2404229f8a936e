//! axum middleware: one batch per inbound request, request entry once the response is finished.
//!
//! Bodies are teed, not consumed: whatever the middleware reads is replayed to
//! the handler (or the client) chunk for chunk, including a stream error, so
//! extractor rejections and truncated responses look exactly as they would
//! without capture.

use crate::coordinator::Lookout;
use axum::body::{Body, Bytes, HttpBody};
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use futures::{stream, StreamExt};
use http::request::Parts;
use lookout_watchers::{batch, InboundExchange};
use std::net::SocketAddr;
use std::time::Instant;

/// Middleware entry point
///
/// ```no_run
/// use axum::{middleware, routing::get, Router};
/// use lookout_capture::{capture_requests, Lookout};
///
/// fn app(lookout: Lookout) -> Router {
///     Router::new()
///         .route("/", get(|| async { "ok" }))
///         .layer(middleware::from_fn_with_state(lookout, capture_requests))
/// }
/// ```
pub async fn capture_requests(State(lookout): State<Lookout>, request: Request, next: Next) -> Response {
    let batch_id = lookout.begin_batch();
    batch::scope(batch_id, handle(lookout, request, next)).await
}

async fn handle(lookout: Lookout, request: Request, next: Next) -> Response {
    let Some(watcher) = lookout.request_watcher() else {
        return next.run(request).await;
    };
    if watcher.ignores(request.uri().path()) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let (captured_request, body) = tee(body, lookout.config().request_size_limit_bytes()).await;

    let method = parts.method.clone();
    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let headers = parts.headers.clone();
    let ip = client_ip(&parts);
    let user = lookout.resolve_user(&parts);

    let started = Instant::now();
    let response = next.run(Request::from_parts(parts, body)).await;
    let duration = started.elapsed();

    let (response_parts, response_body) = response.into_parts();
    let limit = watcher.response_size_limit();

    // Bodies that may exceed the limit (or never end) pass through unread.
    let fits = response_body.size_hint().upper().is_some_and(|upper| upper <= limit as u64);
    let (captured_response, response_body) = if fits {
        tee(response_body, limit).await
    } else {
        (None, response_body)
    };

    let exchange = InboundExchange {
        method,
        uri,
        ip,
        headers,
        body: captured_request.map(|b| b.to_vec()),
        status: response_parts.status,
        response_headers: response_parts.headers.clone(),
        response_body: captured_response.map(|b| b.to_vec()),
        duration,
        user,
    };
    watcher.capture(exchange).await;

    Response::from_parts(response_parts, response_body)
}

/// Read up to `limit` bytes of `body`
///
/// Returns the whole body when it ended within the limit, together with a body
/// that replays exactly what was read followed by whatever remains unread.
/// A body over the limit or one that failed is returned as `None`; the replay
/// then ends with the rest of the stream, or with the same error.
async fn tee(body: Body, limit: usize) -> (Option<Bytes>, Body) {
    if body.size_hint().lower() > limit as u64 {
        return (None, body);
    }

    let mut rest = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut read = 0usize;

    loop {
        match rest.next().await {
            None => {
                let whole = Bytes::from(chunks.concat());
                return (Some(whole.clone()), Body::from(whole));
            }
            Some(Ok(chunk)) => {
                read += chunk.len();
                chunks.push(chunk);
                if read > limit {
                    let replay = stream::iter(chunks.into_iter().map(Ok)).chain(rest);
                    return (None, Body::from_stream(replay));
                }
            }
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Body stream failed while capturing");
                let replay = stream::iter(chunks.into_iter().map(Ok).chain(std::iter::once(Err(e))));
                return (None, Body::from_stream(replay));
            }
        }
    }
}

fn client_ip(parts: &Parts) -> Option<String> {
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip().to_string());
    }
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked(parts: Vec<Result<&'static str, std::io::Error>>) -> Body {
        Body::from_stream(stream::iter(
            parts.into_iter().map(|p| p.map(|s| Bytes::from_static(s.as_bytes()))),
        ))
    }

    async fn collect(body: Body) -> Result<Bytes, axum::Error> {
        axum::body::to_bytes(body, usize::MAX).await
    }

    #[tokio::test]
    async fn test_tee_within_limit() {
        let (captured, body) = tee(chunked(vec![Ok("ab"), Ok("cd")]), 16).await;
        assert_eq!(captured.as_deref(), Some(&b"abcd"[..]));
        assert_eq!(&collect(body).await.unwrap()[..], b"abcd");
    }

    #[tokio::test]
    async fn test_tee_over_limit_replays_everything() {
        let (captured, body) = tee(chunked(vec![Ok("abc"), Ok("def"), Ok("ghi")]), 4).await;
        assert!(captured.is_none());
        assert_eq!(&collect(body).await.unwrap()[..], b"abcdefghi");
    }

    #[tokio::test]
    async fn test_tee_replays_stream_error() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let (captured, body) = tee(chunked(vec![Ok("partial"), Err(reset)]), 1024).await;
        assert!(captured.is_none());
        assert!(collect(body).await.is_err());
    }

    #[tokio::test]
    async fn test_tee_skips_known_oversized_body() {
        let (captured, body) = tee(Body::from("x".repeat(100)), 10).await;
        assert!(captured.is_none());
        assert_eq!(collect(body).await.unwrap().len(), 100);
    }
}
