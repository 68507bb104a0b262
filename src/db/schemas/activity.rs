//! Activity log document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

pub const ACTIVITY_COLLECTION: &str = "activity_logs";

/// Who did what. Timestamps live in `metadata.createdAt`.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub username: String,

    pub action: String,
}

impl ActivityLogDoc {
    pub fn new(username: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            oid: None,
            metadata: Metadata::new(),
            username: username.into(),
            action: action.into(),
        }
    }
}

impl IntoIndexes for ActivityLogDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "metadata.createdAt": -1 },
            Some(
                IndexOptions::builder()
                    .name("created_at_desc".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for ActivityLogDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
