//! Turning raw HTTP material into storable payload fields
//!
//! Bodies are arbitrary bytes; everything that leaves this module is valid JSON
//! and, for HTML responses, safe to render verbatim in a viewer.

use http::header::CONTENT_TYPE;
use http::HeaderMap;
use lookout_domain::Headers;
use serde_json::Value;

/// Replacement for redacted header values and payload fields
pub const REDACTED: &str = "********";

/// Replacement for response bodies over the configured size limit
pub const PURGED: &str = "Purged By Lookout";

/// Escape `& < > ' "` with their HTML entities
///
/// Applied once per capture. Escaping already-escaped text escapes the `&` of
/// each entity again; that is expected, not a bug.
///
/// # Examples
///
/// ```
/// use lookout_watchers::shaping::escape_html;
///
/// assert_eq!(escape_html(r#"<b>"hi"</b>"#), "&lt;b&gt;&quot;hi&quot;&lt;/b&gt;");
/// ```
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Content type of a header map, if present and readable
pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// True iff the content type starts with `text/html` (case-sensitive)
pub fn is_html(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|ct| ct.starts_with("text/html"))
}

fn is_json(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|ct| ct.contains("json"))
}

/// Shape a request body for storage
///
/// JSON bodies become JSON values, anything else is stored as (lossy) UTF-8 text.
/// An empty body is `null`.
pub fn request_body(headers: &HeaderMap, body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    if is_json(headers) {
        if let Ok(value) = serde_json::from_slice(body) {
            return value;
        }
    }
    Value::String(String::from_utf8_lossy(body).into_owned())
}

/// Shape a response body for storage
///
/// Same as [`request_body`], except `text/html` responses are HTML-escaped.
pub fn response_body(headers: &HeaderMap, body: &[u8]) -> Value {
    if is_html(headers) {
        return Value::String(escape_html(&String::from_utf8_lossy(body)));
    }
    request_body(headers, body)
}

/// Replace a response body that exceeds `limit_bytes`
pub fn purge_oversized(body: Value, body_len: usize, limit_bytes: usize) -> Value {
    if body_len > limit_bytes {
        Value::String(PURGED.to_string())
    } else {
        body
    }
}

/// Case-insensitive set of header and parameter names whose values are hidden
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redactor {
    names: Vec<String>,
}

impl Redactor {
    /// Build from configured names
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names.into_iter().map(|n| n.as_ref().to_ascii_lowercase()).collect(),
        }
    }

    /// Whether a header or parameter name is hidden
    pub fn hides(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Flatten a header map, hiding configured names
    pub fn headers(&self, headers: &HeaderMap) -> Headers {
        let mut out = Headers::new();
        for (name, value) in headers {
            let value = if self.hides(name.as_str()) {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            out.entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        out
    }

    /// Hide configured top-level fields of a JSON object payload
    pub fn payload(&self, mut payload: Value) -> Value {
        if let Value::Object(map) = &mut payload {
            for (key, value) in map.iter_mut() {
                if self.hides(key) {
                    *value = Value::String(REDACTED.to_string());
                }
            }
        }
        payload
    }
}

/// Flatten a header map without redaction
pub fn plain_headers(headers: &HeaderMap) -> Headers {
    Redactor::default().headers(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn with_content_type(ct: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        headers
    }

    #[test]
    fn test_escape_html_all_characters() {
        assert_eq!(escape_html(r#"& < > ' ""#), "&amp; &lt; &gt; &#39; &quot;");
    }

    #[test]
    fn test_escape_html_twice_escapes_ampersands_again() {
        let once = escape_html("<a>");
        assert_eq!(once, "&lt;a&gt;");
        assert_eq!(escape_html(&once), "&amp;lt;a&amp;gt;");
    }

    #[test]
    fn test_html_response_is_escaped() {
        let headers = with_content_type("text/html; charset=utf-8");
        let body = response_body(&headers, br#"<b>"hi"</b>"#);
        assert_eq!(body, json!("&lt;b&gt;&quot;hi&quot;&lt;/b&gt;"));
    }

    #[test]
    fn test_html_check_is_case_sensitive_prefix() {
        assert!(is_html(&with_content_type("text/html")));
        assert!(!is_html(&with_content_type("Text/HTML")));
        assert!(!is_html(&with_content_type("application/xhtml+xml")));
        assert!(!is_html(&HeaderMap::new()));
    }

    #[test]
    fn test_non_html_response_is_not_escaped() {
        let headers = with_content_type("text/plain");
        assert_eq!(response_body(&headers, b"<b>"), json!("<b>"));
    }

    #[test]
    fn test_json_body_is_parsed() {
        let headers = with_content_type("application/json");
        assert_eq!(request_body(&headers, br#"{"a":1}"#), json!({"a": 1}));
    }

    #[test]
    fn test_malformed_json_falls_back_to_text() {
        let headers = with_content_type("application/json");
        assert_eq!(request_body(&headers, b"{oops"), json!("{oops"));
    }

    #[test]
    fn test_empty_body_is_null() {
        assert_eq!(request_body(&HeaderMap::new(), b""), Value::Null);
    }

    #[test]
    fn test_binary_body_is_lossy_text() {
        let value = request_body(&HeaderMap::new(), &[0xff, b'a']);
        assert_eq!(value, json!("\u{fffd}a"));
    }

    #[test]
    fn test_purge_oversized() {
        assert_eq!(purge_oversized(json!("small"), 5, 10), json!("small"));
        assert_eq!(purge_oversized(json!("large"), 11, 10), json!(PURGED));
    }

    #[test]
    fn test_redact_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("application/json"));

        let redactor = Redactor::new(["Authorization"]);
        let flat = redactor.headers(&headers);

        assert_eq!(flat["authorization"], REDACTED);
        assert_eq!(flat["x-trace"], "1");
        assert_eq!(flat["accept"], "text/html, application/json");
    }

    #[test]
    fn test_redact_payload_top_level_only() {
        let redactor = Redactor::new(["password"]);
        let payload = redactor.payload(json!({
            "user": "ann",
            "PASSWORD": "hunter2",
            "nested": {"password": "kept"}
        }));

        assert_eq!(payload["user"], "ann");
        assert_eq!(payload["PASSWORD"], REDACTED);
        assert_eq!(payload["nested"]["password"], "kept");
    }
}
