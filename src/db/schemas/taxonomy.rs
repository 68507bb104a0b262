//! Taxonomy document schemas
//!
//! Categories, organizations, product types and platform links. Each has an
//! active collection and a parallel `_archived` collection sharing the same
//! business `id` space.

use bson::{oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{business_indexes, unique_index, IntoIndexes, MutMetadata, Record};
use crate::db::schemas::Metadata;

pub const CATEGORY_COLLECTION: &str = "categories";
pub const ARCHIVED_CATEGORY_COLLECTION: &str = "categories_archived";
pub const ORGANIZATION_COLLECTION: &str = "organizations";
pub const ARCHIVED_ORGANIZATION_COLLECTION: &str = "organizations_archived";
pub const PRODUCT_TYPE_COLLECTION: &str = "product_types";
pub const ARCHIVED_PRODUCT_TYPE_COLLECTION: &str = "product_types_archived";
pub const LINK_COLLECTION: &str = "links";
pub const ARCHIVED_LINK_COLLECTION: &str = "links_archived";

/// Product category
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,
    #[serde(default)]
    pub metadata: Metadata,
    pub id: String,
    pub label: String,
}

/// Vendor organization a store can belong to
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,
    #[serde(default)]
    pub metadata: Metadata,
    pub id: String,
    pub organization_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProductTypeDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,
    #[serde(default)]
    pub metadata: Metadata,
    pub id: String,
    pub label: String,
}

/// External selling platform (Shopee, Lazada, ...) that stores can link to.
///
/// `link` holds the platform logo URL.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LinkDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<ObjectId>,
    #[serde(default)]
    pub metadata: Metadata,
    pub id: String,
    pub label: String,
    pub link: String,
}

impl IntoIndexes for CategoryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        let mut indices = business_indexes();
        indices.push(unique_index("label"));
        indices
    }
}

impl IntoIndexes for OrganizationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        let mut indices = business_indexes();
        indices.push(unique_index("organizationName"));
        indices
    }
}

impl IntoIndexes for ProductTypeDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        let mut indices = business_indexes();
        indices.push(unique_index("label"));
        indices
    }
}

impl IntoIndexes for LinkDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        business_indexes()
    }
}

macro_rules! impl_taxonomy_record {
    (@common $doc:ty) => {
        impl MutMetadata for $doc {
            fn mut_metadata(&mut self) -> &mut Metadata {
                &mut self.metadata
            }
        }
    };
    ($doc:ty) => {
        impl_taxonomy_record!(@common $doc);

        impl Record for $doc {
            fn object_id(&self) -> Option<ObjectId> {
                self.oid
            }

            fn clear_object_id(&mut self) {
                self.oid = None;
            }

            fn business_id(&self) -> &str {
                &self.id
            }
        }
    };
    ($doc:ty, $field_name:literal, $field:ident) => {
        impl_taxonomy_record!(@common $doc);

        impl Record for $doc {
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
                Some(($field_name, &self.$field))
            }
        }
    };
}

impl_taxonomy_record!(CategoryDoc, "label", label);
impl_taxonomy_record!(OrganizationDoc, "organizationName", organization_name);
impl_taxonomy_record!(ProductTypeDoc, "label", label);
impl_taxonomy_record!(LinkDoc);
