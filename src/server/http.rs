//! HTTP server implementation
//!
//! hyper http1 with TokioIo. Bodies are buffered (up to a limit) before
//! routing so handlers can work on `Request<Bytes>`.

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ORIGIN, VARY};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::routes::{self, common::MAX_BODY_BYTES, BoxBody};
use crate::types::{MarketError, Result};

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Taytay marketplace listening on {} ({} storage)",
        state.args.listen, state.storage
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - internal error details are exposed");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Buffer the body, route, and decorate with CORS headers
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let origin = req
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let request_id = Uuid::new_v4();
    info!(%request_id, "[{}] {} {}", addr, method, path);

    let response = if method == Method::OPTIONS {
        preflight_response()
    } else {
        match buffer(req).await {
            Ok(req) => routes::dispatch(Arc::clone(&state), req).await,
            Err(e) => routes::error_response(e, state.args.expose_error_details()),
        }
    };

    let mut response = with_cors(&state, origin.as_deref(), response);
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert("X-Request-Id", value);
    }
    if response.status().is_server_error() {
        warn!(%request_id, status = %response.status(), "{} {} failed", method, path);
    }
    Ok(response)
}

async fn buffer(req: Request<Incoming>) -> Result<Request<Bytes>> {
    let (parts, body) = req.into_parts();
    let bytes = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| MarketError::BadRequest(format!("Failed to read body: {}", e)))?
        .to_bytes();
    Ok(Request::from_parts(parts, bytes))
}

fn preflight_response() -> Response<BoxBody> {
    let mut response = Response::new(routes::common::empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert("Access-Control-Max-Age", HeaderValue::from_static("86400"));
    response
}

/// Echo an allowed origin back with credentials enabled. The session cookie
/// is `SameSite=None`, so a wildcard origin would not be honoured by browsers.
pub fn with_cors(
    state: &AppState,
    origin: Option<&str>,
    mut response: Response<BoxBody>,
) -> Response<BoxBody> {
    let Some(origin) = origin.filter(|o| state.args.is_origin_allowed(o)) else {
        return response;
    };
    let Ok(value) = HeaderValue::from_str(origin) else {
        return response;
    };

    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", value);
    headers.insert(
        "Access-Control-Allow-Credentials",
        HeaderValue::from_static("true"),
    );
    headers.append(VARY, HeaderValue::from_static("Origin"));
    response
}
