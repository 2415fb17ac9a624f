//! The transport seam and the native ureq-backed transport.
//!
//! # Design
//! A transport performs exactly one HTTP exchange and reports the response as
//! data, whatever its status. The only behavioural difference the executor
//! cares about is who follows redirects, exposed as `RedirectMode`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TransportError;
use crate::http::{flatten_headers, HttpRequest, HttpResponse};

/// Who resolves 3xx responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    /// The transport follows redirects itself and only reports the final response.
    ///
    /// With `UreqTransport` the request body is not re-sent on a followed
    /// 307/308; use `Manual` when the body must survive a redirect.
    Follow,
    /// The transport reports 3xx responses as-is; the executor follows them.
    Manual,
}

/// Capability to perform one HTTP exchange.
pub trait Transport: Send + Sync {
    /// Send `request` once and read the whole response body as text.
    ///
    /// Responses with any status, including 4xx and 5xx, are `Ok`.
    fn exchange(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    fn redirect_mode(&self) -> RedirectMode;
}

/// Blocking transport over a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    mode: RedirectMode,
    max_redirects: u32,
}

impl UreqTransport {
    pub fn new(mode: RedirectMode, max_redirects: u32) -> Self {
        let builder = ureq::Agent::config_builder().http_status_as_error(false);
        let builder = match mode {
            RedirectMode::Follow => builder.max_redirects(max_redirects),
            RedirectMode::Manual => builder.max_redirects(0).max_redirects_will_error(false),
        };
        Self {
            agent: builder.build().new_agent(),
            mode,
            max_redirects,
        }
    }

    pub fn following(max_redirects: u32) -> Self {
        Self::new(RedirectMode::Follow, max_redirects)
    }

    pub fn manual() -> Self {
        Self::new(RedirectMode::Manual, 0)
    }

    fn map_error(&self, err: ureq::Error) -> TransportError {
        match err {
            ureq::Error::TooManyRedirects => TransportError::RedirectLimit(self.max_redirects),
            ureq::Error::BadUri(msg) => TransportError::Request(msg),
            ureq::Error::Http(e) => TransportError::Request(e.to_string()),
            other => TransportError::Connect(other.to_string()),
        }
    }
}

impl Transport for UreqTransport {
    fn exchange(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "sending exchange");

        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let sent = match &request.body {
            Some(body) => builder.body(body.clone()).map(|req| self.agent.run(req)),
            None => builder.body(()).map(|req| self.agent.run(req)),
        };
        let mut response = sent
            .map_err(|e| TransportError::Request(e.to_string()))?
            .map_err(|e| self.map_error(e))?;

        let status = response.status().as_u16();
        let headers = flatten_headers(response.headers().iter().map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        }));
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Body(e.to_string()))?;

        debug!(status, url = %request.url, "exchange complete");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn redirect_mode(&self) -> RedirectMode {
        self.mode
    }
}
