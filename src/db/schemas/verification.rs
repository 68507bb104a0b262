//! Verification ledger document schema
//!
//! One record per email. Holds the hashed one-time code, its expiry, the
//! consecutive failure counter and the lockout deadline.

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::{Duration, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

pub const VERIFICATION_COLLECTION: &str = "verifications";

/// Consecutive failures that trigger a lockout
pub const MAX_FAILED_ATTEMPTS: i32 = 3;

/// How long an issued code stays valid
pub fn code_ttl() -> Duration {
    Duration::minutes(10)
}

/// How long an email stays locked after too many failures
pub fn lock_duration() -> Duration {
    Duration::hours(1)
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub email: String,

    /// Argon2 hash of the outstanding code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code_expires: Option<DateTime>,

    #[serde(default)]
    pub failed_attempts: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<DateTime>,
}

impl VerificationDoc {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            metadata: Metadata::new(),
            ..Default::default()
        }
    }

    /// Minutes left on the lock, rounded up, or `None` when unlocked.
    pub fn lock_remaining_minutes(&self, now: chrono::DateTime<Utc>) -> Option<i64> {
        let until = self.lock_until?.to_chrono();
        if until <= now {
            return None;
        }
        let millis = (until - now).num_milliseconds();
        Some((millis + 59_999) / 60_000)
    }

    /// Whether a code is outstanding and not yet expired
    pub fn has_live_code(&self, now: chrono::DateTime<Utc>) -> bool {
        match (&self.verification_code, self.verification_code_expires) {
            (Some(_), Some(expires)) => expires.to_chrono() > now,
            _ => false,
        }
    }
}

impl IntoIndexes for VerificationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "email": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for VerificationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Render a lockout message for the remaining minutes
pub fn lockout_message(minutes: i64) -> String {
    format!(
        "Too many failed attempts. Try again in {} minute{}.",
        minutes,
        if minutes == 1 { "" } else { "s" }
    )
}
