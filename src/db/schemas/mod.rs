//! Database schemas for the marketplace
//!
//! Defines MongoDB document structures. Field names are camelCase on disk.

mod account;
mod activity;
mod admin;
mod general_info;
mod metadata;
mod store;
mod taxonomy;
mod verification;

pub use account::{AccountDoc, AccountStatus, ACCOUNT_COLLECTION};
pub use activity::{ActivityLogDoc, ACTIVITY_COLLECTION};
pub use admin::{AdminDoc, AdminRole, AdminStatus, ADMIN_COLLECTION, ARCHIVED_ADMIN_COLLECTION};
pub use general_info::{GeneralInfoDoc, GENERAL_INFO_COLLECTION};
pub use metadata::Metadata;
pub use store::{LinkedAccount, StoreDoc, PRODUCT_COLLECTION, STORE_COLLECTION};
pub use taxonomy::{
    CategoryDoc, LinkDoc, OrganizationDoc, ProductTypeDoc, ARCHIVED_CATEGORY_COLLECTION,
    ARCHIVED_LINK_COLLECTION, ARCHIVED_ORGANIZATION_COLLECTION, ARCHIVED_PRODUCT_TYPE_COLLECTION,
    CATEGORY_COLLECTION, LINK_COLLECTION, ORGANIZATION_COLLECTION, PRODUCT_TYPE_COLLECTION,
};
pub use verification::{
    code_ttl, lock_duration, lockout_message, VerificationDoc, MAX_FAILED_ATTEMPTS,
    VERIFICATION_COLLECTION,
};
