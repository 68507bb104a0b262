//! Store document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

pub const STORE_COLLECTION: &str = "stores";

/// Products live in their own collection; only their count per store is read here.
pub const PRODUCT_COLLECTION: &str = "products";

/// A store's presence on an external selling platform.
///
/// `platform` references a [`LinkDoc`](super::LinkDoc) and is the identity
/// key when lists are reconciled.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    pub platform: ObjectId,
    pub url: String,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Store document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StoreDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Owning account
    pub owner: ObjectId,

    pub store_name: String,

    pub stall_numbers: Vec<String>,

    /// URL of the uploaded business permit
    pub permit: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub contact_number: String,

    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<ObjectId>,

    #[serde(default)]
    pub linked_accounts: Vec<LinkedAccount>,

    #[serde(default)]
    pub views: i64,

    /// Bumped on every update; writers compare-and-swap on it
    #[serde(default)]
    pub revision: i64,
}

impl IntoIndexes for StoreDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "owner": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "storeName": 1 },
                Some(
                    IndexOptions::builder()
                        .name("store_name_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for StoreDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
