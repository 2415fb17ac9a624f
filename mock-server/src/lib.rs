use std::{collections::BTreeMap, net::SocketAddr};

use axum::{
    extract::{Path, Query},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Body returned by `/echo`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

#[derive(Deserialize)]
pub struct RedirectTo {
    pub url: String,
    pub status: Option<u16>,
}

pub fn app() -> Router {
    Router::new()
        .route("/status/{code}", any(status))
        .route("/redirect/{n}", get(redirect_n))
        .route("/redirect-to", any(redirect_to))
        .route("/no-location", get(no_location))
        .route("/loop", get(redirect_loop))
        .route("/headers", get(headers))
        .route("/echo", any(echo))
        .route("/a", get(|| async { found("/b") }))
        .route("/b", get(|| async { "ok" }))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Serve `app()` on a random local port from a background thread.
pub fn spawn_on_random_port() -> Result<SocketAddr, std::io::Error> {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = std_listener.local_addr()?;
    std_listener.set_nonblocking(true)?;

    std::thread::spawn(move || {
        let served = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .and_then(|rt| {
                rt.block_on(async {
                    let listener = TcpListener::from_std(std_listener)?;
                    run(listener).await
                })
            });
        if let Err(e) = served {
            tracing::error!(error = %e, "mock server stopped");
        }
    });

    Ok(addr)
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("status {code}")).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "invalid status").into_response(),
    }
}

async fn redirect_n(Path(n): Path<u32>) -> Response {
    if n == 0 {
        "ok".into_response()
    } else {
        found(&format!("/redirect/{}", n - 1))
    }
}

async fn redirect_to(Query(params): Query<RedirectTo>) -> Response {
    let code = params.status.unwrap_or(302);
    match StatusCode::from_u16(code) {
        Ok(status) if status.is_redirection() => {
            (status, [(header::LOCATION, params.url)]).into_response()
        }
        _ => (StatusCode::BAD_REQUEST, "status must be 3xx").into_response(),
    }
}

async fn no_location() -> (StatusCode, &'static str) {
    (StatusCode::FOUND, "stranded")
}

async fn redirect_loop() -> Response {
    found("/loop")
}

async fn headers() -> (HeaderMap, &'static str) {
    let mut map = HeaderMap::new();
    map.append("x-dup", HeaderValue::from_static("first"));
    map.append("x-dup", HeaderValue::from_static("second"));
    map.insert("x-custom", HeaderValue::from_static("Mixed Case Value"));
    (map, "headers")
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        headers,
        body,
    })
}
