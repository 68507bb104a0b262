//! Error types for the marketplace backend
//!
//! Operational errors (validation, auth, lookups, conflicts) are reported to
//! the client verbatim. Everything else is logged and collapsed into a
//! generic 500 unless development mode asks for details.

use hyper::StatusCode;

/// Generic message returned for non-operational failures
pub const GENERIC_FAILURE: &str = "Something went wrong!";

/// Main error type for marketplace operations
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Mail delivery error: {0}")]
    Mail(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Mail(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the message is safe to hand back to the client
    pub fn is_operational(&self) -> bool {
        !matches!(
            self,
            Self::Database(_) | Self::Mail(_) | Self::Config(_) | Self::Internal(_)
        )
    }

    /// `fail` for 4xx, `error` for 5xx
    pub fn status_label(&self) -> &'static str {
        if self.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// Convert to status code and client-facing message.
    ///
    /// `expose` is set in development mode and returns internal messages too.
    pub fn into_status_code_and_body(self, expose: bool) -> (StatusCode, String) {
        let status = self.status_code();
        let body = if self.is_operational() || expose {
            self.to_string()
        } else {
            GENERIC_FAILURE.to_string()
        };
        (status, body)
    }
}

impl From<std::io::Error> for MarketError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("Invalid JSON: {}", err))
    }
}

impl From<hyper::Error> for MarketError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for MarketError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for MarketError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Internal(format!("BSON encode failed: {}", err))
    }
}

impl From<bson::de::Error> for MarketError {
    fn from(err: bson::de::Error) -> Self {
        Self::Internal(format!("BSON decode failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for MarketError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("Invalid session: {}", err))
    }
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        Self::Mail(err.to_string())
    }
}

/// Result type alias for marketplace operations
pub type Result<T> = std::result::Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            MarketError::Validation("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            MarketError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            MarketError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            MarketError::Mail("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let (status, body) =
            MarketError::Database("connection reset".into()).into_status_code_and_body(false);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, GENERIC_FAILURE);

        let (_, body) =
            MarketError::Database("connection reset".into()).into_status_code_and_body(true);
        assert!(body.contains("connection reset"));
    }

    #[test]
    fn test_operational_message_passes_through() {
        let (status, body) = MarketError::NotFound("No account found on that email".into())
            .into_status_code_and_body(false);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "No account found on that email");
        assert_eq!(
            MarketError::NotFound(String::new()).status_label(),
            "fail"
        );
        assert_eq!(MarketError::Internal(String::new()).status_label(), "error");
    }
}
