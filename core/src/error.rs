//! Error types for the request executor.
//!
//! # Design
//! Status-based failures are not errors here: a response with status >= 400
//! goes to the caller's error callback. Only when no error callback was
//! supplied does it surface as `UnhandledStatus`. Everything that stops a
//! request from completing at all is reported as `Transport`, kept apart
//! from the status path so callers can tell "never answered" from
//! "answered with an error".

use thiserror::Error;

/// Errors returned by `Executor` and its builder.
#[derive(Debug, Error)]
pub enum AjaxError {
    /// No transport was registered, so no request can ever be sent.
    #[error("no HTTP transport available in this environment")]
    NoTransport,

    /// The server answered with status >= 400 and no error callback was supplied.
    #[error("{url} is unavailable with status {status}.")]
    UnhandledStatus { url: String, status: u16 },

    /// The exchange never produced a response.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    /// A redirect chain ran past the configured limit.
    #[error("more than {limit} redirects while requesting {url}")]
    TooManyRedirects { url: String, limit: u32 },

    /// A `location` header could not be resolved against the request url.
    #[error("invalid redirect location {location:?} from {url}: {source}")]
    InvalidLocation {
        url: String,
        location: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unknown HTTP method: {0}")]
    UnknownMethod(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Failures below the HTTP layer, reported by a `Transport`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Name resolution, connect or I/O failure while talking to the server.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The response arrived but its body could not be read as text.
    #[error("could not read response body: {0}")]
    Body(String),

    /// The transport refused to build or send the request.
    #[error("invalid request: {0}")]
    Request(String),

    /// A following transport gave up after this many redirects.
    #[error("redirect limit of {0} reached")]
    RedirectLimit(u32),
}

impl AjaxError {
    /// The HTTP status carried by the error, if it has one.
    pub fn status(&self) -> Option<u16> {
        match self {
            AjaxError::UnhandledStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
