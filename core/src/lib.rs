//! Transport-agnostic HTTP request executor.
//!
//! # Overview
//! Performs one logical HTTP request through whichever `Transport` the
//! environment provides, normalizes the final exchange into an
//! `HttpResponse`, and hands it to exactly one caller-supplied callback.
//!
//! # Design
//! - The transport is chosen once, when the `Executor` is built. A transport
//!   that follows redirects itself is preferred; otherwise the executor
//!   follows `location` headers on its own.
//! - Status >= 400 goes to the error callback. Without one the call fails
//!   with `AjaxError::UnhandledStatus`.
//! - Failures below HTTP are `AjaxError::Transport` and never reach a callback.
//! - Types use owned `String` / `Vec` fields so they map cleanly onto the
//!   C ABI in `ajax-ffi`.

pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod transport;

pub use config::ExecutorConfig;
pub use error::{AjaxError, TransportError};
pub use executor::{Callbacks, Completion, Executor, ExecutorBuilder};
pub use http::{parse_header_block, HttpMethod, HttpRequest, HttpResponse};
pub use transport::{RedirectMode, Transport, UreqTransport};
