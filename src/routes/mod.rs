//! HTTP routes for the marketplace API

pub mod account_routes;
pub mod activity_routes;
pub mod archive_routes;
pub mod auth_routes;
pub mod common;
pub mod general_info;
pub mod health;
pub mod store_routes;

use bytes::Bytes;
use hyper::{Method, Request, Response};
use std::sync::Arc;

use crate::server::AppState;

pub use account_routes::handle_account_request;
pub use activity_routes::handle_activity_request;
pub use archive_routes::handle_archive_request;
pub use auth_routes::handle_auth_request;
pub use common::{error_response, json_response, BoxBody};
pub use general_info::handle_general_info_request;
pub use health::health_check;
pub use store_routes::handle_store_request;

/// Route a buffered request to its handler
pub async fn dispatch(state: Arc<AppState>, req: Request<Bytes>) -> Response<BoxBody> {
    let path = req.uri().path().to_string();

    if path.starts_with("/auth") {
        return handle_auth_request(req, state)
            .await
            .unwrap_or_else(|| common::not_found(&path));
    }

    match (req.method(), path.as_str()) {
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => return health_check(state),
        (_, "/general-information") => return handle_general_info_request(&req, state).await,
        _ => {}
    }

    if let Some(response) = handle_archive_request(&req, Arc::clone(&state)).await {
        return response;
    }
    if let Some(response) = handle_store_request(&req, Arc::clone(&state)).await {
        return response;
    }
    if let Some(response) = handle_account_request(&req, Arc::clone(&state)).await {
        return response;
    }
    if let Some(response) = handle_activity_request(&req, state).await {
        return response;
    }

    common::not_found(&path)
}
