//! Session tokens
//!
//! HS256 JWTs carrying the principal's storage id and kind. Tokens are
//! stateless and live for 24 hours; there is no refresh or revocation.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::MarketError;

/// Session lifetime in seconds (24 hours)
pub const SESSION_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Which credential store a principal lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Admin,
    Account,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Account => "account",
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload stored in the session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Storage id (hex ObjectId) of the principal
    pub sub: String,
    pub sub_type: SubjectType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct SessionIssuer {
    secret: String,
    ttl_seconds: u64,
}

impl SessionIssuer {
    /// Create an issuer with the production secret.
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String) -> Result<Self, MarketError> {
        if secret.is_empty() {
            return Err(MarketError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(MarketError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            ttl_seconds: SESSION_TTL_SECONDS,
        })
    }

    /// Create an issuer for dev mode with a fixed secret
    pub fn new_dev() -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
            ttl_seconds: SESSION_TTL_SECONDS,
        }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Issue a token for a verified principal
    pub fn issue(&self, subject_id: &str, subject_type: SubjectType) -> Result<String, MarketError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| MarketError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: subject_id.to_string(),
            sub_type: subject_type,
            iat: now,
            exp: now + self.ttl_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| MarketError::Internal(format!("Failed to issue session token: {}", e)))
    }

    /// Verify and decode a session token
    pub fn verify(&self, token: &str) -> Result<Claims, MarketError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let msg = match err.kind() {
                ErrorKind::ExpiredSignature => "Session expired, please log in again",
                ErrorKind::InvalidSignature => "Invalid session signature",
                _ => "Invalid session token",
            };
            MarketError::Unauthorized(msg.into())
        })
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format only.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_issuer() -> SessionIssuer {
        SessionIssuer::new("test-secret-that-is-at-least-32-characters-long".into()).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = test_issuer();
        let token = issuer
            .issue("65f0c0ffee0000000000abcd", SubjectType::Account)
            .unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "65f0c0ffee0000000000abcd");
        assert_eq!(claims.sub_type, SubjectType::Account);
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_SECONDS);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let other =
            SessionIssuer::new("different-secret-that-is-at-least-32-characters".into()).unwrap();
        let token = test_issuer().issue("abc", SubjectType::Admin).unwrap();

        assert!(matches!(
            other.verify(&token),
            Err(MarketError::Unauthorized(_))
        ));
        assert!(test_issuer().verify("not-a-token").is_err());
    }

    #[test]
    fn test_secret_validation() {
        assert!(SessionIssuer::new("short".into()).is_err());
        assert!(SessionIssuer::new("".into()).is_err());
        assert!(SessionIssuer::new("this-secret-is-at-least-32-chars-long".into()).is_ok());
    }

    #[test]
    fn test_subject_type_wire_format() {
        assert_eq!(
            serde_json::to_string(&SubjectType::Admin).unwrap(),
            "\"admin\""
        );
        let parsed: SubjectType = serde_json::from_str("\"account\"").unwrap();
        assert_eq!(parsed, SubjectType::Account);
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(
            extract_token_from_header(Some("Bearer abc123")),
            Some("abc123")
        );
        assert_eq!(extract_token_from_header(None), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
    }
}
