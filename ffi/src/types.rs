//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible representations:
//! `*const c_char` instead of `String`, pointer + length instead of `Vec`,
//! and tagged enums with explicit discriminants. Rust-owned data handed to C
//! (requests for a host transport, responses for callbacks) lives in an
//! `Owned*` holder that outlives the borrowed `Ffi*` view. Conversion code
//! lives here to keep `lib.rs` focused on the `extern "C"` surface.

use std::borrow::Cow;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};

use ajax_core::{
    parse_header_block, AjaxError, Executor, HttpMethod, HttpRequest, HttpResponse, RedirectMode,
    Transport, TransportError,
};

/// Opaque handle to an `Executor`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiExecutor {
    pub(crate) inner: Executor,
}

/// Called with the final response. The response and everything it points
/// to are only valid for the duration of the call.
pub type FfiCallback = extern "C" fn(response: *const FfiResponse, user_data: *mut c_void);

/// Host-supplied exchange. Fill `out` and return true, or return false when
/// the request never completed. Strings placed in `out` must stay valid
/// until the next exchange on the same executor.
pub type FfiExchangeFn =
    extern "C" fn(request: *const FfiRequest, out: *mut FfiHostResponse, user_data: *mut c_void) -> bool;

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Outcome of an FFI call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiStatus {
    Ok = 0,
    NullArg = 1,
    InvalidArgument = 2,
    NoTransport = 3,
    UnhandledStatus = 4,
    Transport = 5,
    TooManyRedirects = 6,
    InvalidLocation = 7,
    Panic = 8,
}

impl From<&AjaxError> for FfiStatus {
    fn from(err: &AjaxError) -> Self {
        match err {
            AjaxError::NoTransport => FfiStatus::NoTransport,
            AjaxError::UnhandledStatus { .. } => FfiStatus::UnhandledStatus,
            AjaxError::Transport { .. } => FfiStatus::Transport,
            AjaxError::TooManyRedirects { .. } => FfiStatus::TooManyRedirects,
            AjaxError::InvalidLocation { .. } => FfiStatus::InvalidLocation,
            AjaxError::UnknownMethod(_) | AjaxError::Config(_) => FfiStatus::InvalidArgument,
        }
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Head = 1,
    Post = 2,
    Put = 3,
    Delete = 4,
    Connect = 5,
    Options = 6,
    Trace = 7,
    Patch = 8,
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Head => HttpMethod::Head,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
            FfiHttpMethod::Delete => HttpMethod::Delete,
            FfiHttpMethod::Connect => HttpMethod::Connect,
            FfiHttpMethod::Options => HttpMethod::Options,
            FfiHttpMethod::Trace => HttpMethod::Trace,
            FfiHttpMethod::Patch => HttpMethod::Patch,
        }
    }
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Head => FfiHttpMethod::Head,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Delete => FfiHttpMethod::Delete,
            HttpMethod::Connect => FfiHttpMethod::Connect,
            HttpMethod::Options => FfiHttpMethod::Options,
            HttpMethod::Trace => FfiHttpMethod::Trace,
            HttpMethod::Patch => FfiHttpMethod::Patch,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// When passed to `ajax_execute` the caller owns every pointer; the FFI
/// layer copies what it needs and frees nothing. `body` may be null.
#[repr(C)]
pub struct FfiRequest {
    pub method: FfiHttpMethod,
    pub url: *const c_char,
    pub headers: *const FfiHeader,
    pub headers_len: u32,
    pub body: *const c_char,
}

impl FfiRequest {
    /// Copy into a core `HttpRequest`. Returns `None` if `url` or a header
    /// string is null.
    ///
    /// # Safety
    /// Every non-null pointer must reference a valid NUL-terminated string,
    /// and `headers` must point to `headers_len` entries.
    pub(crate) unsafe fn to_core(&self) -> Option<HttpRequest> {
        let url = borrowed_str(self.url)?;
        let mut request = HttpRequest::new(self.method.into(), url);
        if self.headers_len > 0 {
            if self.headers.is_null() {
                return None;
            }
            let headers = std::slice::from_raw_parts(self.headers, self.headers_len as usize);
            for h in headers {
                request = request.header(borrowed_str(h.key)?, borrowed_str(h.value)?);
            }
        }
        if let Some(body) = borrowed_str(self.body) {
            request = request.body(body);
        }
        Some(request)
    }
}

/// Rust-owned backing storage for an `FfiRequest` handed to a host transport.
pub(crate) struct OwnedRequest {
    method: FfiHttpMethod,
    url: CString,
    strings: Vec<(CString, CString)>,
    headers: Vec<FfiHeader>,
    body: Option<CString>,
}

impl OwnedRequest {
    pub(crate) fn from_core(req: &HttpRequest) -> Self {
        let strings: Vec<(CString, CString)> = req
            .headers
            .iter()
            .map(|(k, v)| (c_string(k), c_string(v)))
            .collect();
        let headers = strings
            .iter()
            .map(|(k, v)| FfiHeader {
                key: k.as_ptr(),
                value: v.as_ptr(),
            })
            .collect();
        Self {
            method: req.method.into(),
            url: c_string(&req.url),
            strings,
            headers,
            body: req.body.as_deref().map(c_string),
        }
    }

    /// Borrowed view; valid while `self` is alive.
    pub(crate) fn as_ffi(&self) -> FfiRequest {
        debug_assert_eq!(self.strings.len(), self.headers.len());
        FfiRequest {
            method: self.method,
            url: self.url.as_ptr(),
            headers: self.headers.as_ptr(),
            headers_len: self.headers.len() as u32,
            body: self.body.as_ref().map_or(std::ptr::null(), |b| b.as_ptr()),
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A normalized response as seen by a callback. Borrowed: valid only while
/// the callback runs.
#[repr(C)]
pub struct FfiResponse {
    pub status: u16,
    pub headers: *const FfiHeader,
    pub headers_len: u32,
    pub body: *const c_char,
}

/// Rust-owned backing storage for an `FfiResponse`.
pub(crate) struct OwnedResponse {
    status: u16,
    strings: Vec<(CString, CString)>,
    headers: Vec<FfiHeader>,
    body: CString,
}

impl OwnedResponse {
    pub(crate) fn from_core(resp: &HttpResponse) -> Self {
        let strings: Vec<(CString, CString)> = resp
            .headers
            .iter()
            .map(|(k, v)| (c_string(k), c_string(v)))
            .collect();
        let headers = strings
            .iter()
            .map(|(k, v)| FfiHeader {
                key: k.as_ptr(),
                value: v.as_ptr(),
            })
            .collect();
        Self {
            status: resp.status,
            strings,
            headers,
            body: c_string(&resp.body),
        }
    }

    pub(crate) fn as_ffi(&self) -> FfiResponse {
        debug_assert_eq!(self.strings.len(), self.headers.len());
        FfiResponse {
            status: self.status,
            headers: self.headers.as_ptr(),
            headers_len: self.headers.len() as u32,
            body: self.body.as_ptr(),
        }
    }
}

/// Raw response filled in by a host transport.
///
/// `headers` is a `Name: value` block separated by CRLF, or null. `body`
/// may be null for an empty body.
#[repr(C)]
pub struct FfiHostResponse {
    pub status: u16,
    pub headers: *const c_char,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Host transport
// ---------------------------------------------------------------------------

/// Caller-provided context pointer, passed back untouched.
#[derive(Clone, Copy)]
pub(crate) struct UserData(pub(crate) *mut c_void);

// SAFETY: the pointer is never dereferenced on the Rust side; the C caller
// is responsible for whatever thread affinity its data has.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

/// `Transport` backed by a C function pointer.
pub(crate) struct HostTransport {
    pub(crate) exchange: FfiExchangeFn,
    pub(crate) user_data: UserData,
    pub(crate) mode: RedirectMode,
}

impl Transport for HostTransport {
    fn exchange(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let owned = OwnedRequest::from_core(request);
        let ffi_request = owned.as_ffi();
        let mut out = FfiHostResponse {
            status: 0,
            headers: std::ptr::null(),
            body: std::ptr::null(),
        };

        if !(self.exchange)(&ffi_request, &mut out, self.user_data.0) {
            return Err(TransportError::Connect(
                "host transport reported a failure".to_string(),
            ));
        }

        // SAFETY: the host contract keeps these strings alive until the next exchange.
        let (headers, body) = unsafe {
            (
                borrowed_str(out.headers).map(|h| parse_header_block(&h)).unwrap_or_default(),
                borrowed_str(out.body).map(Cow::into_owned).unwrap_or_default(),
            )
        };
        Ok(HttpResponse {
            status: out.status,
            headers,
            body,
        })
    }

    fn redirect_mode(&self) -> RedirectMode {
        self.mode
    }
}

// ---------------------------------------------------------------------------
// String helpers
// ---------------------------------------------------------------------------

/// Lossy view of a C string; `None` for null.
///
/// # Safety
/// `ptr` must be null or point to a valid NUL-terminated string that
/// outlives `'a`.
pub(crate) unsafe fn borrowed_str<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy())
    }
}

/// `CString` from Rust text; interior NULs cannot cross the boundary and are dropped.
pub(crate) fn c_string(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}
