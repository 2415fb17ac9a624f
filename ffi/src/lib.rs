//! C-ABI wrapper around `ajax-core`.
//!
//! # Overview
//! Exposes the request executor through `extern "C"` functions. Callbacks
//! are C function pointers sharing one `user_data` pointer. The transport is
//! either the native ureq client or a host-supplied exchange function.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - `ajax_execute` is blocking; it returns after the callback (if any) ran.
//! - Failures are reported as `FfiStatus`, with an optional message the
//!   caller frees with `ajax_free_string`.
//! - The C caller owns the executor pointer and must release it with
//!   `ajax_executor_free`.

pub mod types;

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use ajax_core::{Callbacks, Executor, ExecutorConfig, HttpResponse, RedirectMode};

use types::*;

// ---------------------------------------------------------------------------
// Executor lifecycle
// ---------------------------------------------------------------------------

/// Create an executor over the native HTTP client.
///
/// `config_json` may be null for defaults, otherwise it is an
/// `ExecutorConfig` JSON object. Returns null if the config does not parse
/// or if an internal panic occurs. Free with `ajax_executor_free`.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_executor_new(config_json: *const c_char) -> *mut FfiExecutor {
    catch_unwind(|| {
        let config = if config_json.is_null() {
            ExecutorConfig::default()
        } else {
            let raw = unsafe { CStr::from_ptr(config_json) }.to_string_lossy();
            match ExecutorConfig::from_json_str(&raw) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(error = %e, "rejected executor config");
                    return ptr::null_mut();
                }
            }
        };
        match Executor::from_config(config) {
            Ok(inner) => Box::into_raw(Box::new(FfiExecutor { inner })),
            Err(_) => ptr::null_mut(),
        }
    })
    .unwrap_or(ptr::null_mut())
}

/// Create an executor whose exchanges are performed by the host.
///
/// With `follow_redirects` the host is expected to resolve redirects itself;
/// otherwise the executor follows `location` headers. Returns null if
/// `exchange` is null.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_executor_new_host(
    exchange: Option<FfiExchangeFn>,
    user_data: *mut c_void,
    follow_redirects: bool,
) -> *mut FfiExecutor {
    let user_data = UserData(user_data);
    catch_unwind(move || {
        let Some(exchange) = exchange else {
            return ptr::null_mut();
        };
        let mode = if follow_redirects {
            RedirectMode::Follow
        } else {
            RedirectMode::Manual
        };
        let built = Executor::builder()
            .transport(HostTransport {
                exchange,
                user_data,
                mode,
            })
            .build();
        match built {
            Ok(inner) => Box::into_raw(Box::new(FfiExecutor { inner })),
            Err(_) => ptr::null_mut(),
        }
    })
    .unwrap_or(ptr::null_mut())
}

/// Free an executor. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_executor_free(executor: *mut FfiExecutor) {
    if !executor.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(executor) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

/// Perform `request` and invoke exactly one of the callbacks.
///
/// A final status >= 400 goes to `on_error`. If `on_error` is null the call
/// returns `UnhandledStatus` instead and no callback runs. Any status other
/// than `Ok` means no callback ran. When `out_message` is non-null and the
/// call fails, it receives a message to free with `ajax_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_execute(
    executor: *const FfiExecutor,
    request: *const FfiRequest,
    on_success: Option<FfiCallback>,
    on_error: Option<FfiCallback>,
    user_data: *mut c_void,
    out_message: *mut *mut c_char,
) -> FfiStatus {
    let user_data = UserData(user_data);
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        if executor.is_null() {
            return Err((FfiStatus::NullArg, "null argument: executor".to_string()));
        }
        if request.is_null() {
            return Err((FfiStatus::NullArg, "null argument: request".to_string()));
        }
        let Some(on_success) = on_success else {
            return Err((FfiStatus::NullArg, "null argument: on_success".to_string()));
        };
        let executor = unsafe { &*executor };
        let Some(request) = (unsafe { (*request).to_core() }) else {
            return Err((
                FfiStatus::InvalidArgument,
                "request has a null url or header string".to_string(),
            ));
        };

        let mut callbacks = Callbacks::new(move |r| deliver(on_success, &r, user_data));
        if let Some(on_error) = on_error {
            callbacks = callbacks.on_error(move |r| deliver(on_error, &r, user_data));
        }
        executor
            .inner
            .execute(request, callbacks)
            .map_err(|e| (FfiStatus::from(&e), e.to_string()))
    }));

    let (status, message) = match outcome {
        Ok(Ok(())) => return FfiStatus::Ok,
        Ok(Err(failure)) => failure,
        Err(_) => (FfiStatus::Panic, "panic in ajax_execute".to_string()),
    };
    if !out_message.is_null() {
        unsafe { *out_message = c_string(&message).into_raw() };
    }
    status
}

fn deliver(callback: FfiCallback, response: &HttpResponse, user_data: UserData) {
    let owned = OwnedResponse::from_core(response);
    let view = owned.as_ffi();
    callback(&view, user_data.0);
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a string returned through `out_message`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn ajax_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { std::ffi::CString::from_raw(s) });
        });
    }
}
