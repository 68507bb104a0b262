//! Activity log routes (admin)

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

use super::common::{
    message, method_not_allowed, ok_with, render, require_admin, BoxBody, RouteResult,
};
use crate::server::AppState;
use crate::services::parse_object_id;

async fn handle_list(req: &Request<Bytes>, state: &AppState) -> RouteResult {
    require_admin(req, state)?;
    let entries = state.activity.list().await?;
    ok_with("Activity logs retrieved", entries)
}

async fn handle_get(req: &Request<Bytes>, state: &AppState, id: &str) -> RouteResult {
    require_admin(req, state)?;
    let entry = state.activity.get(&parse_object_id(id, "activity log")?).await?;
    ok_with("Activity log retrieved", entry)
}

async fn handle_delete(req: &Request<Bytes>, state: &AppState, id: &str) -> RouteResult {
    require_admin(req, state)?;
    state
        .activity
        .delete(&parse_object_id(id, "activity log")?)
        .await?;
    message(StatusCode::OK, "Activity log deleted")
}

/// Handle `/activity-logs[/:id]`. Returns `None` for other paths.
pub async fn handle_activity_request(
    req: &Request<Bytes>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let rest = req.uri().path().strip_prefix("/activity-logs")?;
    let method = req.method();

    let result = match rest.trim_start_matches('/') {
        "" if *method == Method::GET => handle_list(req, &state).await,
        "" => return Some(method_not_allowed()),
        id if id.contains('/') => return None,
        id if *method == Method::GET => handle_get(req, &state, id).await,
        id if *method == Method::DELETE => handle_delete(req, &state, id).await,
        _ => return Some(method_not_allowed()),
    };
    Some(render(result, state.args.expose_error_details()))
}
