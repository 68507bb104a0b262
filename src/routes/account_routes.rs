//! Account moderation routes (admin)
//!
//! - PUT    /accounts/:id/status - `{status}`: pending, verified or blocked
//! - DELETE /accounts/:id        - Soft delete

use bytes::Bytes;
use hyper::{Method, Request, Response};
use serde::Deserialize;
use std::sync::Arc;

use super::common::{
    message, method_not_allowed, ok_with, parse_json_body, render, require_admin, BoxBody,
    RouteResult,
};
use crate::db::schemas::AccountStatus;
use crate::server::AppState;
use crate::services::parse_object_id;

#[derive(Debug, Deserialize)]
struct AccountStatusRequest {
    status: AccountStatus,
}

async fn handle_set_status(req: &Request<Bytes>, state: &AppState, id: &str) -> RouteResult {
    let actor = require_admin(req, state)?;
    let id = parse_object_id(id, "account")?;
    let body: AccountStatusRequest = parse_json_body(req)?;
    let account = state.accounts.set_status(&actor, &id, body.status).await?;
    ok_with(
        "Account status updated",
        serde_json::json!({
            "_id": id.to_hex(),
            "status": account.status,
            "isVerified": account.is_verified,
        }),
    )
}

async fn handle_delete(req: &Request<Bytes>, state: &AppState, id: &str) -> RouteResult {
    let actor = require_admin(req, state)?;
    let id = parse_object_id(id, "account")?;
    state.accounts.delete(&actor, &id).await?;
    message(hyper::StatusCode::OK, "Account deleted")
}

/// Handle `/accounts/*`. Returns `None` for other paths.
pub async fn handle_account_request(
    req: &Request<Bytes>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let rest = req.uri().path().strip_prefix("/accounts/")?;
    let segments: Vec<&str> = rest.split('/').collect();
    let method = req.method();

    let result = match segments.as_slice() {
        [id, "status"] if *method == Method::PUT => handle_set_status(req, &state, id).await,
        [id] if *method == Method::DELETE => handle_delete(req, &state, id).await,
        [_, "status"] | [_] => return Some(method_not_allowed()),
        _ => return None,
    };
    Some(render(result, state.args.expose_error_details()))
}
