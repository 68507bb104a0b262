//! General information routes
//!
//! - GET /general-information - Public, 404 until an admin has saved it
//! - PUT /general-information - Replace it (admin)

use bytes::Bytes;
use hyper::{Method, Request, Response};
use std::sync::Arc;

use super::common::{
    method_not_allowed, ok_with, parse_json_body, render, require_admin, BoxBody, RouteResult,
};
use crate::db::schemas::GeneralInfoDoc;
use crate::server::AppState;

async fn handle_get(state: &AppState) -> RouteResult {
    let info = state.general_info.get().await?;
    ok_with("General information retrieved", info)
}

async fn handle_update(req: &Request<Bytes>, state: &AppState) -> RouteResult {
    let actor = require_admin(req, state)?;
    let mut info: GeneralInfoDoc = parse_json_body(req)?;
    info.oid = None;
    let saved = state.general_info.update(&actor, info).await?;
    ok_with("General information saved", saved)
}

pub async fn handle_general_info_request(
    req: &Request<Bytes>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let result = match *req.method() {
        Method::GET => handle_get(&state).await,
        Method::PUT | Method::POST => handle_update(req, &state).await,
        _ => return method_not_allowed(),
    };
    render(result, state.args.expose_error_details())
}
