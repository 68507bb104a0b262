//! Admin document schema
//!
//! Admins are keyed by a human-assigned `id`. Removing an admin moves the
//! document into `admins_archived` with the password hash intact.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{business_indexes, IntoIndexes, MutMetadata, Record};
use crate::db::schemas::Metadata;

pub const ADMIN_COLLECTION: &str = "admins";
pub const ARCHIVED_ADMIN_COLLECTION: &str = "admins_archived";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdminStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdminRole {
    #[default]
    Admin,
    #[serde(rename = "Super Admin")]
    SuperAdmin,
}

/// Admin document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AdminDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Business key, unique across active and archived admins
    pub id: String,

    pub email: String,

    pub first_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,

    pub last_name: String,

    /// Argon2 password hash
    pub password: String,

    #[serde(default)]
    pub status: AdminStatus,

    #[serde(default)]
    pub role: AdminRole,
}

impl AdminDoc {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl IntoIndexes for AdminDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        let mut indices = business_indexes();
        indices.push((
            doc! { "email": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            ),
        ));
        indices
    }
}

impl MutMetadata for AdminDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Record for AdminDoc {
    fn object_id(&self) -> Option<ObjectId> {
        self.oid
    }

    fn clear_object_id(&mut self) {
        self.oid = None;
    }

    fn business_id(&self) -> &str {
        &self.id
    }

    fn unique_field(&self) -> Option<(&'static str, &str)> {
        Some(("email", &self.email))
    }
}
