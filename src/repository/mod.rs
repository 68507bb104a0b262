//! Repository seams
//!
//! Services talk to storage only through these traits. Production wires the
//! MongoDB implementations in [`mongo`]; development mode without a database
//! and the test suite use the in-memory ones in [`memory`].

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::{oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::schemas::{
    AccountDoc, AccountStatus, ActivityLogDoc, AdminDoc, CategoryDoc, GeneralInfoDoc, LinkDoc,
    OrganizationDoc, ProductTypeDoc, StoreDoc, VerificationDoc,
};
use crate::db::{MongoClient, Record};
use crate::types::Result;

/// Seller/buyer accounts
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountDoc>>;

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<AccountDoc>>;

    async fn insert(&self, account: AccountDoc) -> Result<ObjectId>;

    /// Hard delete. Only used to undo a registration whose store failed.
    async fn remove(&self, id: &ObjectId) -> Result<bool>;

    async fn set_status(&self, id: &ObjectId, status: AccountStatus) -> Result<bool>;

    async fn soft_delete(&self, id: &ObjectId) -> Result<bool>;
}

/// Business-keyed documents (admins and taxonomies), one instance per collection
#[async_trait]
pub trait EntityRepository<T: Record>: Send + Sync {
    async fn list(&self) -> Result<Vec<T>>;

    async fn find_by_business_id(&self, id: &str) -> Result<Option<T>>;

    async fn find_by_object_id(&self, oid: &ObjectId) -> Result<Option<T>>;

    /// Exact match on a top-level string field
    async fn find_by_field(&self, field: &str, value: &str) -> Result<Option<T>>;

    /// Insert, failing with `Conflict` on a duplicate business id or unique field
    async fn insert(&self, item: T) -> Result<ObjectId>;

    async fn delete_by_business_id(&self, id: &str) -> Result<bool>;

    /// `$set` top-level fields on the record with this business id
    async fn set_fields(&self, id: &str, fields: Document) -> Result<bool>;
}

/// Per-email one-time code state
#[async_trait]
pub trait VerificationLedger: Send + Sync {
    async fn find(&self, email: &str) -> Result<Option<VerificationDoc>>;

    /// Create the record if needed and overwrite the outstanding code
    async fn issue_code(
        &self,
        email: &str,
        code_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Atomically count a failed attempt, locking the email once the
    /// threshold is reached. Returns the record after the update.
    async fn record_failure(&self, email: &str, now: DateTime<Utc>) -> Result<VerificationDoc>;

    /// Reset the counter and clear lock and code
    async fn record_success(&self, email: &str) -> Result<()>;
}

#[async_trait]
pub trait StoreRepository: Send + Sync {
    async fn insert(&self, store: StoreDoc) -> Result<ObjectId>;

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<StoreDoc>>;

    async fn find_by_owner(&self, owner: &ObjectId) -> Result<Option<StoreDoc>>;

    /// Apply `fields` only if the store is still at `revision`, bumping it.
    /// Returns false when another writer got there first.
    async fn update_if_unmodified(
        &self,
        id: &ObjectId,
        revision: i64,
        fields: Document,
    ) -> Result<bool>;

    async fn count_products(&self, store: &ObjectId) -> Result<u64>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn append(&self, entry: ActivityLogDoc) -> Result<()>;

    /// Newest first
    async fn list_recent(&self) -> Result<Vec<ActivityLogDoc>>;

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<ActivityLogDoc>>;

    async fn delete(&self, id: &ObjectId) -> Result<bool>;
}

#[async_trait]
pub trait GeneralInfoRepository: Send + Sync {
    async fn get(&self) -> Result<Option<GeneralInfoDoc>>;

    /// Replace the singleton. Returns true when it did not exist before.
    async fn upsert(&self, info: GeneralInfoDoc) -> Result<bool>;
}

/// Active and archived collections of one archivable kind
pub struct ArchivePair<T: Record> {
    pub active: Arc<dyn EntityRepository<T>>,
    pub archived: Arc<dyn EntityRepository<T>>,
}

impl<T: Record> Clone for ArchivePair<T> {
    fn clone(&self) -> Self {
        Self {
            active: Arc::clone(&self.active),
            archived: Arc::clone(&self.archived),
        }
    }
}

/// Every repository the services need
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountRepository>,
    pub admins: ArchivePair<AdminDoc>,
    pub categories: ArchivePair<CategoryDoc>,
    pub organizations: ArchivePair<OrganizationDoc>,
    pub product_types: ArchivePair<ProductTypeDoc>,
    pub links: ArchivePair<LinkDoc>,
    pub verifications: Arc<dyn VerificationLedger>,
    pub stores: Arc<dyn StoreRepository>,
    pub activity: Arc<dyn ActivityRepository>,
    pub general_info: Arc<dyn GeneralInfoRepository>,
}

impl Repositories {
    /// MongoDB-backed repositories. Opening each collection applies its indexes.
    pub async fn mongo(client: &MongoClient) -> Result<Self> {
        mongo::open_all(client).await
    }

    /// Process-local repositories for development and tests
    pub fn in_memory() -> Self {
        memory::MemoryRepositories::new().into_repositories()
    }
}
