//! Configuration for the marketplace backend
//!
//! CLI arguments and environment variable handling using clap.
//! A `.env` file is loaded by `main` before parsing.

use clap::Parser;
use std::net::SocketAddr;

/// Taytay marketplace REST backend
#[derive(Parser, Debug, Clone)]
#[command(name = "taytay-market")]
#[command(about = "REST backend for the Taytay marketplace")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Enable development mode (dev JWT secret, in-memory fallback, logged mail)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "taytay_market")]
    pub mongodb_db: String,

    /// JWT secret for session token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Brevo API key for transactional mail
    #[arg(long, env = "BREVO_API_KEY")]
    pub brevo_api_key: Option<String>,

    /// Sender address for outgoing mail
    #[arg(long, env = "BREVO_SENDER_EMAIL", default_value = "no-reply@taytaymarketplace.com")]
    pub brevo_sender_email: String,

    /// Sender display name for outgoing mail
    #[arg(long, env = "BREVO_SENDER_NAME", default_value = "Taytay Marketplace")]
    pub brevo_sender_name: String,

    /// Comma-separated list of origins allowed to make credentialed requests
    #[arg(
        long,
        env = "CORS_ALLOWED_ORIGINS",
        default_value = "http://localhost:5173"
    )]
    pub cors_allowed_origins: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human readable text
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl Args {
    /// Parsed list of allowed CORS origins
    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Whether a request origin may receive credentialed CORS headers
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed_origins()
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
    }

    /// Whether internal error messages may be returned to clients
    pub fn expose_error_details(&self) -> bool {
        self.dev_mode
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match self.jwt_secret.as_deref() {
                None | Some("") => {
                    return Err("JWT_SECRET is required in production mode".to_string())
                }
                Some(secret) if secret.len() < 32 => {
                    return Err("JWT_SECRET must be at least 32 characters".to_string())
                }
                _ => {}
            }

            if self.brevo_api_key.as_deref().map_or(true, str::is_empty) {
                return Err("BREVO_API_KEY is required in production mode".to_string());
            }
        }

        if self.allowed_origins().is_empty() {
            return Err("CORS_ALLOWED_ORIGINS must list at least one origin".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["taytay-market"])
    }

    #[test]
    fn test_production_requires_secrets() {
        let args = base_args();
        assert!(!args.dev_mode);
        assert!(args.validate().is_err());

        let args = Args {
            jwt_secret: Some("a-production-secret-of-at-least-32-chars".into()),
            brevo_api_key: Some("xkeysib-test".into()),
            ..base_args()
        };
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let args = Args {
            jwt_secret: Some("short".into()),
            brevo_api_key: Some("xkeysib-test".into()),
            ..base_args()
        };
        assert_eq!(
            args.validate().unwrap_err(),
            "JWT_SECRET must be at least 32 characters"
        );
    }

    #[test]
    fn test_dev_mode_needs_nothing() {
        let args = Args {
            dev_mode: true,
            ..base_args()
        };
        assert!(args.validate().is_ok());
        assert!(args.expose_error_details());
    }

    #[test]
    fn test_allowed_origins() {
        let args = Args {
            cors_allowed_origins: "https://taytay.shop/, http://localhost:5173".into(),
            ..base_args()
        };
        assert!(args.is_origin_allowed("https://taytay.shop"));
        assert!(args.is_origin_allowed("http://localhost:5173"));
        assert!(!args.is_origin_allowed("https://evil.example"));
    }
}
