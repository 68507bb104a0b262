//! General information singleton
//!
//! Terms, privacy policy, about page, contact info and commuting directions
//! shown on the public site. There is at most one document.

use bson::{oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

pub const GENERAL_INFO_COLLECTION: &str = "general_information";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneralInfoDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub terms_and_condition: String,
    #[serde(default)]
    pub privacy_policy: String,
    #[serde(default)]
    pub about: String,
    #[serde(default)]
    pub contact_info: String,

    // Directions by mode of transport
    #[serde(default)]
    pub uv_express: String,
    #[serde(default)]
    pub jeepney: String,
    #[serde(default)]
    pub mrt: String,
    #[serde(default)]
    pub uv_and_bus: String,
    #[serde(default)]
    pub ride_hailing_apps: String,
}

impl IntoIndexes for GeneralInfoDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        Vec::new()
    }
}

impl MutMetadata for GeneralInfoDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
