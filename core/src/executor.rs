//! The request executor: one logical request, one callback.
//!
//! # Design
//! `Executor` holds the transport chosen at construction time and an
//! immutable config, so it is cheap to clone and safe to share between
//! threads. A call runs one exchange, or a sequential chain of exchanges when
//! the transport leaves redirects to us, then hands the final response to
//! exactly one callback. Callbacks are `FnOnce`, so a second invocation does
//! not type-check.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info_span, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::error::{AjaxError, TransportError};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{RedirectMode, Transport, UreqTransport};

type Callback<'a> = Box<dyn FnOnce(HttpResponse) + Send + 'a>;

/// The success callback plus an optional error callback.
pub struct Callbacks<'a> {
    on_success: Callback<'a>,
    on_error: Option<Callback<'a>>,
}

impl<'a> Callbacks<'a> {
    pub fn new(on_success: impl FnOnce(HttpResponse) + Send + 'a) -> Self {
        Self {
            on_success: Box::new(on_success),
            on_error: None,
        }
    }

    /// Handle responses with status >= 400 instead of failing the call.
    pub fn on_error(mut self, on_error: impl FnOnce(HttpResponse) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    pub fn has_error_handler(&self) -> bool {
        self.on_error.is_some()
    }
}

impl fmt::Debug for Callbacks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_error", &self.has_error_handler())
            .finish_non_exhaustive()
    }
}

/// Classified final response of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Status below 400.
    Success(HttpResponse),
    /// Status 400 or above.
    Failure(HttpResponse),
}

impl Completion {
    pub fn response(&self) -> &HttpResponse {
        match self {
            Completion::Success(r) | Completion::Failure(r) => r,
        }
    }

    pub fn into_response(self) -> HttpResponse {
        match self {
            Completion::Success(r) | Completion::Failure(r) => r,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Completion::Success(_))
    }
}

/// Performs requests through a single transport selected at construction.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    config: ExecutorConfig,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("redirect_mode", &self.transport.redirect_mode())
            .field("config", &self.config)
            .finish()
    }
}

impl Executor {
    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::default()
    }

    /// Executor over the native ureq transport, in the mode `config.redirects` names.
    pub fn from_config(config: ExecutorConfig) -> Result<Self, AjaxError> {
        let transport = UreqTransport::new(config.redirects, config.max_redirects);
        Self::builder().config(config).transport(transport).build()
    }

    pub fn redirect_mode(&self) -> RedirectMode {
        self.transport.redirect_mode()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the request to its final response and classify it by status.
    pub fn send(&self, request: &HttpRequest) -> Result<Completion, AjaxError> {
        let (_, response) = self.run_chain(request)?;
        if response.is_error() {
            Ok(Completion::Failure(response))
        } else {
            Ok(Completion::Success(response))
        }
    }

    /// Run the request and hand the final response to one of `callbacks`.
    ///
    /// A status >= 400 goes to the error callback; without one the call fails
    /// with [`AjaxError::UnhandledStatus`] and no callback runs. Transport
    /// failures are returned as errors and never reach a callback.
    pub fn execute(&self, request: HttpRequest, callbacks: Callbacks<'_>) -> Result<(), AjaxError> {
        let (url, response) = self.run_chain(&request)?;

        if response.is_error() {
            match callbacks.on_error {
                Some(on_error) => on_error(response),
                None => {
                    warn!(url = %url, status = response.status, "unhandled HTTP error status");
                    return Err(AjaxError::UnhandledStatus {
                        url,
                        status: response.status,
                    });
                }
            }
        } else {
            (callbacks.on_success)(response);
        }
        Ok(())
    }

    /// Like [`Executor::execute`], but returns immediately; the request and its
    /// callback run on a worker thread.
    pub fn spawn(
        &self,
        request: HttpRequest,
        callbacks: Callbacks<'static>,
    ) -> JoinHandle<Result<(), AjaxError>> {
        let executor = self.clone();
        thread::spawn(move || executor.execute(request, callbacks))
    }

    /// Exchange until a terminal response; returns the url that produced it.
    fn run_chain(&self, request: &HttpRequest) -> Result<(String, HttpResponse), AjaxError> {
        let span = info_span!(
            "ajax_request",
            request_id = %Uuid::new_v4(),
            method = %request.method,
            url = %request.url,
        );
        let _enter = span.enter();

        let mut current = self.prepare(request);
        let mut hops = 0u32;
        loop {
            let response = self.transport.exchange(&current).map_err(|source| match source {
                TransportError::RedirectLimit(limit) => AjaxError::TooManyRedirects {
                    url: current.url.clone(),
                    limit,
                },
                source => {
                    warn!(url = %current.url, error = %source, "transport failure");
                    AjaxError::Transport {
                        url: current.url.clone(),
                        source,
                    }
                }
            })?;

            if response.is_redirect() && self.redirect_mode() == RedirectMode::Manual {
                if let Some(location) = response.header("location") {
                    if hops >= self.config.max_redirects {
                        return Err(AjaxError::TooManyRedirects {
                            url: current.url,
                            limit: self.config.max_redirects,
                        });
                    }
                    let next = resolve_location(&current.url, location)?;
                    debug!(status = response.status, from = %current.url, to = %next, "following redirect");
                    current = current.with_url(next);
                    hops += 1;
                    continue;
                }
                debug!(status = response.status, "redirect without location, treating as final");
            }

            debug!(status = response.status, hops, "request complete");
            return Ok((current.url, response));
        }
    }

    fn prepare(&self, request: &HttpRequest) -> HttpRequest {
        match &self.config.user_agent {
            Some(agent) if !request.has_header("user-agent") => {
                request.clone().header("user-agent", agent.as_str())
            }
            _ => request.clone(),
        }
    }
}

/// Resolve a `location` value against the url that returned it.
fn resolve_location(base: &str, location: &str) -> Result<String, AjaxError> {
    Url::parse(base)
        .and_then(|base| base.join(location))
        .map(String::from)
        .map_err(|source| AjaxError::InvalidLocation {
            url: base.to_string(),
            location: location.to_string(),
            source,
        })
}

/// Collects candidate transports and picks one when built.
#[derive(Default)]
pub struct ExecutorBuilder {
    candidates: Vec<Arc<dyn Transport>>,
    config: ExecutorConfig,
}

impl ExecutorBuilder {
    /// Register a transport the environment provides.
    pub fn transport(self, transport: impl Transport + 'static) -> Self {
        self.shared_transport(Arc::new(transport))
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.candidates.push(transport);
        self
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Pick a following transport if one was registered, else the first
    /// manual one.
    pub fn build(self) -> Result<Executor, AjaxError> {
        let transport = self
            .candidates
            .iter()
            .find(|t| t.redirect_mode() == RedirectMode::Follow)
            .or_else(|| self.candidates.first())
            .cloned()
            .ok_or(AjaxError::NoTransport)?;
        Ok(Executor {
            transport,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::http::flatten_headers;

    /// Replays canned results and records every request it was asked to send.
    struct Scripted {
        mode: RedirectMode,
        replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        seen: Arc<Mutex<Vec<HttpRequest>>>,
    }

    impl Scripted {
        fn new(mode: RedirectMode, replies: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                mode,
                replies: Mutex::new(replies.into()),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl Transport for Scripted {
        fn exchange(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra exchange")
        }

        fn redirect_mode(&self) -> RedirectMode {
            self.mode
        }
    }

    fn reply(status: u16, headers: &[(&str, &str)], body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            headers: flatten_headers(headers.iter().copied()),
            body: body.to_string(),
        })
    }

    fn executor(transport: Scripted) -> Executor {
        Executor::builder().transport(transport).build().unwrap()
    }

    /// Runs `execute` and reports which callback fired with what.
    fn outcome(
        exec: &Executor,
        request: HttpRequest,
        with_error_handler: bool,
    ) -> (Result<(), AjaxError>, Vec<(&'static str, HttpResponse)>) {
        let calls = Mutex::new(Vec::new());
        let mut callbacks = Callbacks::new(|r| calls.lock().unwrap().push(("success", r)));
        if with_error_handler {
            callbacks = callbacks.on_error(|r| calls.lock().unwrap().push(("error", r)));
        }
        let result = exec.execute(request, callbacks);
        (result, calls.into_inner().unwrap())
    }

    #[test]
    fn success_goes_to_success_callback_once() {
        let exec = executor(Scripted::new(
            RedirectMode::Follow,
            vec![reply(200, &[("content-type", "text/plain")], "hello")],
        ));
        let (result, calls) = outcome(&exec, HttpRequest::get("https://example.test/"), true);
        result.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "success");
        assert_eq!(calls[0].1.body, "hello");
        assert_eq!(calls[0].1.headers["content-type"], "text/plain");
    }

    #[test]
    fn error_status_goes_to_error_callback() {
        let exec = executor(Scripted::new(RedirectMode::Follow, vec![reply(500, &[], "boom")]));
        let (result, calls) = outcome(&exec, HttpRequest::get("https://example.test/"), true);
        result.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "error");
        assert_eq!(calls[0].1.status, 500);
    }

    #[test]
    fn error_status_without_handler_is_unhandled() {
        let exec = executor(Scripted::new(RedirectMode::Follow, vec![reply(404, &[], "")]));
        let (result, calls) = outcome(&exec, HttpRequest::get("https://example.test/gone"), false);
        let err = result.unwrap_err();
        assert!(matches!(err, AjaxError::UnhandledStatus { status: 404, .. }));
        assert!(err.to_string().contains("https://example.test/gone"));
        assert!(err.to_string().contains("404"));
        assert!(calls.is_empty());
    }

    #[test]
    fn manual_mode_follows_redirect_chain_transparently() {
        let transport = Scripted::new(
            RedirectMode::Manual,
            vec![
                reply(302, &[("location", "https://example.test/b")], ""),
                reply(301, &[("Location", "/c")], ""),
                reply(200, &[], "ok"),
            ],
        );
        let seen = Arc::clone(&transport.seen);
        let exec = executor(transport);
        let request = HttpRequest::new(crate::HttpMethod::Post, "https://example.test/a")
            .header("x-token", "t")
            .body("data");
        let (result, calls) = outcome(&exec, request, true);
        result.unwrap();

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "success");
        assert_eq!(calls[0].1.body, "ok");

        let seen = seen.lock().unwrap();
        let urls: Vec<&str> = seen.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://example.test/a", "https://example.test/b", "https://example.test/c"]
        );
        assert!(seen.iter().all(|r| r.body.as_deref() == Some("data")));
        assert!(seen.iter().all(|r| r.has_header("x-token")));
    }

    #[test]
    fn follow_mode_delivers_3xx_as_success() {
        let exec = executor(Scripted::new(
            RedirectMode::Follow,
            vec![reply(304, &[("location", "https://example.test/elsewhere")], "")],
        ));
        let (result, calls) = outcome(&exec, HttpRequest::get("https://example.test/"), true);
        result.unwrap();
        assert_eq!(calls[0].0, "success");
        assert_eq!(calls[0].1.status, 304);
    }

    #[test]
    fn redirect_without_location_is_final() {
        let exec = executor(Scripted::new(RedirectMode::Manual, vec![reply(302, &[], "stranded")]));
        let (result, calls) = outcome(&exec, HttpRequest::get("https://example.test/"), false);
        result.unwrap();
        assert_eq!(calls[0].0, "success");
        assert_eq!(calls[0].1.body, "stranded");
    }

    #[test]
    fn redirect_limit_is_enforced() {
        let replies = (0..3).map(|_| reply(302, &[("location", "/loop")], "")).collect();
        let exec = Executor::builder()
            .config(ExecutorConfig {
                max_redirects: 2,
                ..ExecutorConfig::default()
            })
            .transport(Scripted::new(RedirectMode::Manual, replies))
            .build()
            .unwrap();
        let (result, calls) = outcome(&exec, HttpRequest::get("https://example.test/loop"), true);
        assert!(matches!(result, Err(AjaxError::TooManyRedirects { limit: 2, .. })));
        assert!(calls.is_empty());
    }

    #[test]
    fn unresolvable_location_is_reported() {
        let exec = executor(Scripted::new(
            RedirectMode::Manual,
            vec![reply(302, &[("location", "http://[::1")], "")],
        ));
        let err = exec.send(&HttpRequest::get("https://example.test/")).unwrap_err();
        assert!(matches!(err, AjaxError::InvalidLocation { .. }));
    }

    #[test]
    fn transport_failure_skips_callbacks() {
        let exec = executor(Scripted::new(
            RedirectMode::Follow,
            vec![Err(TransportError::Connect("refused".to_string()))],
        ));
        let (result, calls) = outcome(&exec, HttpRequest::get("https://example.test/"), true);
        assert!(matches!(
            result,
            Err(AjaxError::Transport { source: TransportError::Connect(_), .. })
        ));
        assert!(calls.is_empty());
    }

    #[test]
    fn following_transport_limit_maps_to_too_many_redirects() {
        let exec = executor(Scripted::new(
            RedirectMode::Follow,
            vec![Err(TransportError::RedirectLimit(20))],
        ));
        let err = exec.send(&HttpRequest::get("https://example.test/")).unwrap_err();
        assert!(matches!(err, AjaxError::TooManyRedirects { limit: 20, .. }));
    }

    #[test]
    fn build_without_transport_fails() {
        let err = Executor::builder().build().unwrap_err();
        assert!(matches!(err, AjaxError::NoTransport));
    }

    #[test]
    fn builder_prefers_following_transport() {
        let exec = Executor::builder()
            .transport(Scripted::new(RedirectMode::Manual, vec![]))
            .transport(Scripted::new(RedirectMode::Follow, vec![]))
            .build()
            .unwrap();
        assert_eq!(exec.redirect_mode(), RedirectMode::Follow);
    }

    #[test]
    fn builder_falls_back_to_manual_transport() {
        let exec = executor(Scripted::new(RedirectMode::Manual, vec![]));
        assert_eq!(exec.redirect_mode(), RedirectMode::Manual);
    }

    #[test]
    fn configured_user_agent_is_added_unless_present() {
        let transport = Scripted::new(
            RedirectMode::Follow,
            vec![reply(200, &[], ""), reply(200, &[], "")],
        );
        let seen = Arc::clone(&transport.seen);
        let exec = Executor::builder()
            .config(ExecutorConfig {
                user_agent: Some("ajax/0.1".to_string()),
                ..ExecutorConfig::default()
            })
            .transport(transport)
            .build()
            .unwrap();

        exec.send(&HttpRequest::get("https://example.test/")).unwrap();
        exec.send(&HttpRequest::get("https://example.test/").header("User-Agent", "mine"))
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].headers, vec![("user-agent".to_string(), "ajax/0.1".to_string())]);
        assert_eq!(seen[1].headers, vec![("User-Agent".to_string(), "mine".to_string())]);
    }

    #[test]
    fn send_classifies_by_status() {
        let exec = executor(Scripted::new(
            RedirectMode::Follow,
            vec![reply(204, &[], ""), reply(418, &[], "teapot")],
        ));
        assert!(exec.send(&HttpRequest::get("https://example.test/")).unwrap().is_success());
        let failed = exec.send(&HttpRequest::get("https://example.test/")).unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.into_response().body, "teapot");
    }

    #[test]
    fn spawn_runs_callback_off_thread() {
        let exec = executor(Scripted::new(RedirectMode::Follow, vec![reply(200, &[], "async")]));
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = exec.spawn(
            HttpRequest::get("https://example.test/"),
            Callbacks::new(move |r| tx.send(r.body).unwrap()),
        );
        handle.join().unwrap().unwrap();
        assert_eq!(rx.recv().unwrap(), "async");
    }
}
