//! Store routes
//!
//! - GET /stores/:id - Store with platforms, organization and product count
//! - PUT /stores/:id - Partial update; linked accounts are reconciled (owner or admin)

use bytes::Bytes;
use hyper::{Method, Request, Response};
use std::sync::Arc;

use super::common::{
    method_not_allowed, ok_with, parse_json_body, render, require_session, BoxBody, RouteResult,
};
use crate::server::AppState;
use crate::services::{parse_object_id, StoreUpdate};

async fn handle_get_store(state: &AppState, id: &str) -> RouteResult {
    let id = parse_object_id(id, "store")?;
    let store = state.stores.get_store(&id).await?;
    ok_with("Store retrieved", store)
}

async fn handle_update_store(req: &Request<Bytes>, state: &AppState, id: &str) -> RouteResult {
    let actor = require_session(req, state)?;
    let id = parse_object_id(id, "store")?;
    let update: StoreUpdate = parse_json_body(req)?;
    let store = state.stores.update_store(&actor, &id, update).await?;
    ok_with("Store updated", store)
}

/// Handle `/stores/:id`. Returns `None` for other paths.
pub async fn handle_store_request(
    req: &Request<Bytes>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let id = req.uri().path().strip_prefix("/stores/")?;
    if id.is_empty() || id.contains('/') {
        return None;
    }

    let result = match *req.method() {
        Method::GET => handle_get_store(&state, id).await,
        Method::PUT => handle_update_store(req, &state, id).await,
        _ => return Some(method_not_allowed()),
    };
    Some(render(result, state.args.expose_error_details()))
}
