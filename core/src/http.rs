//! HTTP request and response types shared by every transport.
//!
//! # Design
//! Requests and responses are plain data. A `Transport` turns an
//! `HttpRequest` into an `HttpResponse`; the executor only ever sees these
//! two shapes, no matter which transport performed the exchange.
//!
//! All fields use owned types (`String`, `Vec`, `BTreeMap`) so values can be
//! moved into callbacks and across the FFI boundary without lifetimes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AjaxError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = AjaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "CONNECT" => Ok(HttpMethod::Connect),
            "OPTIONS" => Ok(HttpMethod::Options),
            "TRACE" => Ok(HttpMethod::Trace),
            "PATCH" => Ok(HttpMethod::Patch),
            other => Err(AjaxError::UnknownMethod(other.to_string())),
        }
    }
}

/// An HTTP request described as plain data.
///
/// Treated as immutable once handed to the executor. Following a redirect
/// produces a clone with a different `url` via [`HttpRequest::with_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Same request against another url.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }

    /// Whether a header with this name is set, ignoring case.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

/// A normalized HTTP response.
///
/// Header names keep the case the transport reported them in. A repeated
/// name keeps its last value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl HttpResponse {
    /// Look up a header value, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Flatten a header sequence into a map; the last value of a repeated name wins.
pub fn flatten_headers<I, K, V>(pairs: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Parse a raw `Name: value` header block, one header per line.
///
/// The name ends at the first `": "`; the value keeps any later separators.
/// Blank lines are skipped.
pub fn parse_header_block(block: &str) -> BTreeMap<String, String> {
    flatten_headers(
        block
            .split(|c: char| c == '\r' || c == '\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match line.split_once(": ") {
                Some((name, value)) => (name.to_string(), value.to_string()),
                None => (line.trim_end_matches(':').to_string(), String::new()),
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_every_token() {
        for token in ["GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH"] {
            let method: HttpMethod = token.parse().unwrap();
            assert_eq!(method.as_str(), token);
        }
    }

    #[test]
    fn method_rejects_lowercase_and_unknown() {
        assert!(matches!("get".parse::<HttpMethod>(), Err(AjaxError::UnknownMethod(_))));
        assert!(matches!("FETCH".parse::<HttpMethod>(), Err(AjaxError::UnknownMethod(_))));
    }

    #[test]
    fn method_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&HttpMethod::Patch).unwrap(), r#""PATCH""#);
    }

    #[test]
    fn with_url_keeps_everything_else() {
        let req = HttpRequest::new(HttpMethod::Post, "https://example.test/a")
            .header("x-token", "abc")
            .body("payload");
        let moved = req.with_url("https://example.test/b");
        assert_eq!(moved.url, "https://example.test/b");
        assert_eq!(moved.method, HttpMethod::Post);
        assert_eq!(moved.headers, req.headers);
        assert_eq!(moved.body.as_deref(), Some("payload"));
        assert_eq!(req.url, "https://example.test/a");
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let req: HttpRequest =
            serde_json::from_str(r#"{"method":"GET","url":"https://example.test/a"}"#).unwrap();
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());
    }

    #[test]
    fn has_header_ignores_case() {
        let req = HttpRequest::get("http://x").header("User-Agent", "t");
        assert!(req.has_header("user-agent"));
        assert!(!req.has_header("accept"));
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let resp = HttpResponse {
            status: 302,
            headers: flatten_headers([("Location", "/b")]),
            body: String::new(),
        };
        assert_eq!(resp.header("location"), Some("/b"));
        assert!(resp.is_redirect());
        assert!(!resp.is_error());
    }

    #[test]
    fn flatten_headers_last_value_wins() {
        let map = flatten_headers([("x-dup", "1"), ("x-dup", "2"), ("x-other", "3")]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["x-dup"], "2");
    }

    #[test]
    fn parse_header_block_splits_on_first_separator() {
        let block = "content-type: text/plain\r\nx-time: 12: 30: 00\r\n\r\n";
        let map = parse_header_block(block);
        assert_eq!(map["content-type"], "text/plain");
        assert_eq!(map["x-time"], "12: 30: 00");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn parse_header_block_handles_empty_and_bare_names() {
        assert!(parse_header_block("").is_empty());
        assert!(parse_header_block("\r\n").is_empty());
        let map = parse_header_block("x-empty:\nx-dup: a\nx-dup: b");
        assert_eq!(map["x-empty"], "");
        assert_eq!(map["x-dup"], "b");
    }
}
