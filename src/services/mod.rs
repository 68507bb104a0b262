//! Business services
//!
//! - [`auth`]: login, one-time codes, registration, session profile
//! - [`archive`]: archive/restore lifecycle for business-keyed records
//! - [`admins`]: admin creation and status changes
//! - [`accounts`]: account moderation
//! - [`stores`]: store views and updates
//! - [`reconcile`]: linked-account merge used by store updates
//! - [`activity`], [`general_info`], [`mailer`]

pub mod accounts;
pub mod activity;
pub mod admins;
pub mod archive;
pub mod auth;
pub mod general_info;
pub mod mailer;
pub mod reconcile;
pub mod stores;

use bson::oid::ObjectId;

use crate::auth::{Claims, SubjectType};
use crate::types::{MarketError, Result};

pub use accounts::AccountService;
pub use activity::ActivityLogger;
pub use admins::{AdminService, NewAdmin};
pub use archive::{ArchiveKind, ArchiveService, Archivable};
pub use auth::{
    AdminView, AuthService, LoginOutcome, Principal, Profile, PublicPrincipal, RegisterInput,
    SessionGrant,
};
pub use general_info::GeneralInfoService;
pub use mailer::{BrevoMailer, Mailer, OutboxMailer, OutgoingMail};
pub use reconcile::reconcile;
pub use stores::{StoreProfile, StoreService, StoreUpdate};

/// The authenticated principal behind a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: ObjectId,
    pub kind: SubjectType,
}

impl Actor {
    pub fn from_claims(claims: &Claims) -> Result<Self> {
        let id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| MarketError::Unauthorized("Invalid session token".into()))?;
        Ok(Self {
            id,
            kind: claims.sub_type,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.kind == SubjectType::Admin
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(MarketError::Forbidden("Admin access required".into()))
        }
    }
}

/// Emails are compared trimmed and lower-cased everywhere
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose shape check; delivery is the real test
pub fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// `https://` URL with something after the scheme
pub fn is_https_url(url: &str) -> bool {
    url.strip_prefix("https://")
        .is_some_and(|rest| !rest.is_empty() && !rest.contains(char::is_whitespace))
}

/// Parse a storage id coming from a path or body
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| MarketError::Validation(format!("Invalid {} id", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_helpers() {
        assert_eq!(normalize_email("  Juan@Example.COM "), "juan@example.com");
        assert!(is_valid_email("juan@example.com"));
        assert!(!is_valid_email("juan@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("juan dela@example.com"));
    }

    #[test]
    fn test_https_url() {
        assert!(is_https_url("https://shopee.ph/taytay"));
        assert!(!is_https_url("http://shopee.ph"));
        assert!(!is_https_url("https://"));
    }

    #[test]
    fn test_actor_from_claims() {
        let claims = Claims {
            sub: ObjectId::new().to_hex(),
            sub_type: SubjectType::Admin,
            iat: 0,
            exp: 0,
        };
        let actor = Actor::from_claims(&claims).unwrap();
        assert!(actor.require_admin().is_ok());

        let bad = Claims {
            sub: "nope".into(),
            ..claims
        };
        assert!(matches!(
            Actor::from_claims(&bad),
            Err(MarketError::Unauthorized(_))
        ));
    }
}
