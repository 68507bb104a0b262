//! Liveness probe

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::common::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Seconds since startup
    pub uptime: u64,
    /// `mongodb` or `memory`
    pub storage: &'static str,
    #[serde(rename = "devMode")]
    pub dev_mode: bool,
    pub timestamp: String,
}

pub fn health_check(state: Arc<AppState>) -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            healthy: true,
            version: env!("CARGO_PKG_VERSION"),
            uptime: state.started_at.elapsed().as_secs(),
            storage: state.storage,
            dev_mode: state.args.dev_mode,
            timestamp: chrono::Utc::now().to_rfc3339(),
        },
    )
}
