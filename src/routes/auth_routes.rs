//! HTTP routes for authentication
//!
//! - POST /auth/login             - Check password and status, identify the principal
//! - POST /auth/send-verification - Email a one-time code
//! - POST /auth/verify-code       - Trade the code for the `authToken` cookie
//! - POST /auth/register          - Seller sign-up (account + store)
//! - GET  /auth/user              - Current principal with their store
//! - POST /auth/logout            - Clear the cookie

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::common::{
    json_response, message, method_not_allowed, not_found, ok_with, parse_body, parse_json_body, render,
    require_session, with_cookie, BoxBody, RouteResult,
};
use crate::auth::{clear_session_cookie, session_cookie, SubjectType};
use crate::server::AppState;
use crate::services::RegisterInput;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    pub code: String,
    pub email: String,
    pub user_id: String,
    pub user_type: SubjectType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    user_type: SubjectType,
    user_id: String,
    expires_in: u64,
}

async fn handle_login(req: Request<Bytes>, state: Arc<AppState>) -> RouteResult {
    let body: LoginRequest = parse_json_body(&req)?;
    let outcome = state.auth.login(&body.email, &body.password).await?;
    ok_with("Login successful. Please verify your email.", outcome)
}

async fn handle_send_verification(req: Request<Bytes>, state: Arc<AppState>) -> RouteResult {
    let body: SendVerificationRequest = parse_json_body(&req)?;
    state.auth.send_verification(&body.email).await?;
    message(StatusCode::OK, "Verification code sent to your email")
}

async fn handle_verify_code(req: Request<Bytes>, state: Arc<AppState>) -> RouteResult {
    let body: VerifyCodeRequest = parse_json_body(&req)?;
    let grant = state
        .auth
        .login_verification(&body.code, &body.email, &body.user_id, body.user_type)
        .await?;

    let response = json_response(
        StatusCode::OK,
        &serde_json::json!({
            "message": "Verification successful",
            "data": SessionResponse {
                user_type: grant.user_type,
                user_id: grant.user_id,
                expires_in: state.auth.sessions().ttl_seconds(),
            },
        }),
    );
    with_cookie(response, &session_cookie(&grant.token))
}

async fn handle_register(req: Request<Bytes>, state: Arc<AppState>) -> RouteResult {
    let input: RegisterInput = parse_body(&req)?;
    state.auth.register(input).await?;
    message(
        StatusCode::OK,
        "Registration successful. Your account is pending review.",
    )
}

async fn handle_user(req: Request<Bytes>, state: Arc<AppState>) -> RouteResult {
    let actor = require_session(&req, &state)?;
    let profile = state.auth.get_logged_in_user(&actor).await?;
    ok_with("User retrieved", profile)
}

async fn handle_logout() -> RouteResult {
    info!("Session cookie cleared");
    let response = message(StatusCode::OK, "Logged out")?;
    with_cookie(response, &clear_session_cookie())
}

/// Handle `/auth/*`. Returns `None` for paths outside that prefix.
pub async fn handle_auth_request(
    req: Request<Bytes>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    if !path.starts_with("/auth") {
        return None;
    }

    let expose = state.args.expose_error_details();
    let method = req.method().clone();

    let result = match (&method, path.as_str()) {
        (&Method::POST, "/auth/login") => handle_login(req, state).await,
        (&Method::POST, "/auth/send-verification") => handle_send_verification(req, state).await,
        (&Method::POST, "/auth/verify-code") => handle_verify_code(req, state).await,
        (&Method::POST, "/auth/register") => handle_register(req, state).await,
        (&Method::GET, "/auth/user") => handle_user(req, state).await,
        (&Method::POST, "/auth/logout") => handle_logout().await,

        (_, "/auth/login")
        | (_, "/auth/send-verification")
        | (_, "/auth/verify-code")
        | (_, "/auth/register")
        | (_, "/auth/user")
        | (_, "/auth/logout") => return Some(method_not_allowed()),

        _ => return Some(not_found(&path)),
    };

    Some(render(result, expose))
}
