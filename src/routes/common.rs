//! Shared request and response helpers

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use hyper::{Request, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::error;

use crate::auth::{extract_session_cookie, extract_token_from_header};
use crate::server::AppState;
use crate::services::Actor;
use crate::types::{MarketError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// What every handler returns; errors are rendered by [`render`]
pub type RouteResult = Result<Response<BoxBody>>;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Serialize)]
struct SuccessBody<'a, T: Serialize> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'a str,
    message: &'a str,
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// `{message, data}` with a 200
pub fn ok_with<T: Serialize>(message: &str, data: T) -> RouteResult {
    Ok(json_response(
        StatusCode::OK,
        &SuccessBody {
            message,
            data: Some(data),
        },
    ))
}

/// `{message}` with the given status
pub fn message(status: StatusCode, message: &str) -> RouteResult {
    Ok(json_response(
        status,
        &SuccessBody::<()> {
            message,
            data: None,
        },
    ))
}

/// Attach a `Set-Cookie` header
pub fn with_cookie(mut response: Response<BoxBody>, cookie: &str) -> RouteResult {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| MarketError::Internal(format!("Invalid cookie header: {}", e)))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(response)
}

/// Render an error as `{status, message}`, logging server-side failures
pub fn error_response(err: MarketError, expose: bool) -> Response<BoxBody> {
    if !err.is_operational() {
        error!(error = %err, "Request failed");
    }
    let label = err.status_label();
    let (status, message) = err.into_status_code_and_body(expose);
    json_response(
        status,
        &ErrorBody {
            status: label,
            message: &message,
        },
    )
}

pub fn render(result: RouteResult, expose: bool) -> Response<BoxBody> {
    result.unwrap_or_else(|err| error_response(err, expose))
}

pub fn not_found(path: &str) -> Response<BoxBody> {
    error_response(
        MarketError::NotFound(format!("Can't find {} on this server", path)),
        false,
    )
}

pub fn method_not_allowed() -> Response<BoxBody> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorBody {
            status: "fail",
            message: "Method not allowed",
        },
    )
}

fn is_form(req: &Request<Bytes>) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Decode a JSON body
pub fn parse_json_body<T: DeserializeOwned>(req: &Request<Bytes>) -> Result<T> {
    let bytes = req.body();
    if bytes.len() > MAX_BODY_BYTES {
        return Err(MarketError::BadRequest("Request body too large".into()));
    }
    if bytes.is_empty() {
        return Err(MarketError::BadRequest("Request body is required".into()));
    }
    serde_json::from_slice(bytes).map_err(|e| MarketError::Validation(format!("Invalid body: {}", e)))
}

/// Decode a JSON or url-encoded form body, depending on `Content-Type`
pub fn parse_body<T: DeserializeOwned>(req: &Request<Bytes>) -> Result<T> {
    if is_form(req) {
        if req.body().len() > MAX_BODY_BYTES {
            return Err(MarketError::BadRequest("Request body too large".into()));
        }
        serde_urlencoded::from_bytes(req.body())
            .map_err(|e| MarketError::Validation(format!("Invalid form: {}", e)))
    } else {
        parse_json_body(req)
    }
}

/// Session token from the `authToken` cookie, or a Bearer header
pub fn session_token(req: &Request<Bytes>) -> Option<String> {
    let cookie = req
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|header| extract_session_cookie(Some(header)).map(str::to_string));

    cookie.or_else(|| {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        extract_token_from_header(header).map(str::to_string)
    })
}

/// Resolve the caller's session or fail with 401
pub fn require_session(req: &Request<Bytes>, state: &AppState) -> Result<Actor> {
    let token = session_token(req)
        .ok_or_else(|| MarketError::Unauthorized("You are not logged in".into()))?;
    let claims = state.auth.sessions().verify(&token)?;
    Actor::from_claims(&claims)
}

/// Resolve the caller's session and require an admin
pub fn require_admin(req: &Request<Bytes>, state: &AppState) -> Result<Actor> {
    let actor = require_session(req, state)?;
    actor.require_admin()?;
    Ok(actor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content_type: &str, body: &'static str) -> Request<Bytes> {
        Request::builder()
            .header(CONTENT_TYPE, content_type)
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
    }

    #[derive(serde::Deserialize)]
    struct Login {
        email: String,
    }

    #[test]
    fn test_parse_body_accepts_json_and_forms() {
        let json: Login = parse_body(&request("application/json", r#"{"email":"a@b.co"}"#)).unwrap();
        assert_eq!(json.email, "a@b.co");

        let form: Login = parse_body(&request(
            "application/x-www-form-urlencoded",
            "email=a%40b.co",
        ))
        .unwrap();
        assert_eq!(form.email, "a@b.co");

        assert!(matches!(
            parse_body::<Login>(&request("application/json", "")),
            Err(MarketError::BadRequest(_))
        ));
    }

    #[test]
    fn test_session_token_prefers_cookie() {
        let req = Request::builder()
            .header(COOKIE, "theme=dark; authToken=from-cookie")
            .header(AUTHORIZATION, "Bearer from-header")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(session_token(&req).as_deref(), Some("from-cookie"));

        let req = Request::builder()
            .header(AUTHORIZATION, "Bearer from-header")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(session_token(&req).as_deref(), Some("from-header"));
    }

    #[tokio::test]
    async fn test_internal_errors_are_masked() {
        let response = error_response(MarketError::Database("connection reset".into()), false);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], crate::types::GENERIC_FAILURE);
    }
}
