//! In-memory repositories
//!
//! Used in development mode when MongoDB is unreachable, and by tests.
//! Each store enforces the same uniqueness rules as the MongoDB indexes.

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime as BsonDateTime, Document};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{
    AccountRepository, ActivityRepository, ArchivePair, EntityRepository, GeneralInfoRepository,
    Repositories, StoreRepository, VerificationLedger,
};
use crate::db::schemas::{
    lock_duration, AccountDoc, AccountStatus, ActivityLogDoc, GeneralInfoDoc, StoreDoc,
    VerificationDoc, MAX_FAILED_ATTEMPTS,
};
use crate::db::Record;
use crate::types::{MarketError, Result};

fn duplicate(what: &str) -> MarketError {
    MarketError::Conflict(format!("A record with the same {} already exists", what))
}

/// Merge `$set`-style top-level fields into a record through its BSON form
fn apply_fields<T>(item: &T, fields: Document) -> Result<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let mut current = bson::to_document(item)?;
    for (key, value) in fields {
        current.insert(key, value);
    }
    Ok(bson::from_document(current)?)
}

/// Concrete in-memory stores, kept around so tests can reach past the traits
#[derive(Clone)]
pub struct MemoryRepositories {
    pub accounts: Arc<MemoryAccountRepository>,
    pub verifications: Arc<MemoryVerificationLedger>,
    pub stores: Arc<MemoryStoreRepository>,
    pub activity: Arc<MemoryActivityRepository>,
    pub general_info: Arc<MemoryGeneralInfoRepository>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(MemoryAccountRepository::default()),
            verifications: Arc::new(MemoryVerificationLedger::default()),
            stores: Arc::new(MemoryStoreRepository::default()),
            activity: Arc::new(MemoryActivityRepository::default()),
            general_info: Arc::new(MemoryGeneralInfoRepository::default()),
        }
    }

    pub fn into_repositories(self) -> Repositories {
        Repositories {
            accounts: self.accounts,
            admins: memory_pair(),
            categories: memory_pair(),
            organizations: memory_pair(),
            product_types: memory_pair(),
            links: memory_pair(),
            verifications: self.verifications,
            stores: self.stores,
            activity: self.activity,
            general_info: self.general_info,
        }
    }
}

impl Default for MemoryRepositories {
    fn default() -> Self {
        Self::new()
    }
}

fn memory_pair<T: Record>() -> ArchivePair<T> {
    ArchivePair {
        active: Arc::new(MemoryEntityRepository::<T>::default()),
        archived: Arc::new(MemoryEntityRepository::<T>::archived()),
    }
}

#[derive(Default)]
pub struct MemoryAccountRepository {
    accounts: Mutex<Vec<AccountDoc>>,
}

impl MemoryAccountRepository {
    /// Number of accounts that are not soft-deleted
    pub async fn count(&self) -> usize {
        let accounts = self.accounts.lock().await;
        accounts.iter().filter(|a| !a.metadata.is_deleted).count()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountDoc>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .iter()
            .find(|a| a.email == email && !a.metadata.is_deleted)
            .cloned())
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<AccountDoc>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .iter()
            .find(|a| a.oid.as_ref() == Some(id) && !a.metadata.is_deleted)
            .cloned())
    }

    async fn insert(&self, mut account: AccountDoc) -> Result<ObjectId> {
        let mut accounts = self.accounts.lock().await;
        if accounts.iter().any(|a| a.email == account.email) {
            return Err(duplicate("email"));
        }
        let id = ObjectId::new();
        account.oid = Some(id);
        account.metadata.stamp_created();
        accounts.push(account);
        Ok(id)
    }

    async fn remove(&self, id: &ObjectId) -> Result<bool> {
        let mut accounts = self.accounts.lock().await;
        let before = accounts.len();
        accounts.retain(|a| a.oid.as_ref() != Some(id));
        Ok(accounts.len() < before)
    }

    async fn set_status(&self, id: &ObjectId, status: AccountStatus) -> Result<bool> {
        let mut accounts = self.accounts.lock().await;
        match accounts
            .iter_mut()
            .find(|a| a.oid.as_ref() == Some(id) && !a.metadata.is_deleted)
        {
            Some(account) => {
                account.set_status(status);
                account.metadata.updated_at = Some(BsonDateTime::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete(&self, id: &ObjectId) -> Result<bool> {
        let mut accounts = self.accounts.lock().await;
        match accounts
            .iter_mut()
            .find(|a| a.oid.as_ref() == Some(id) && !a.metadata.is_deleted)
        {
            Some(account) => {
                let now = BsonDateTime::now();
                account.metadata.is_deleted = true;
                account.metadata.deleted_at = Some(now);
                account.metadata.updated_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct MemoryEntityRepository<T: Record> {
    items: Mutex<Vec<T>>,
    /// Archived collections only index the business id
    unique_secondary: bool,
}

impl<T: Record> Default for MemoryEntityRepository<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            unique_secondary: true,
        }
    }
}

impl<T: Record> MemoryEntityRepository<T> {
    pub fn archived() -> Self {
        Self {
            unique_secondary: false,
            ..Self::default()
        }
    }
}

fn field_matches<T: Record>(item: &T, field: &str, value: &str) -> bool {
    bson::to_document(item)
        .ok()
        .and_then(|doc| doc.get_str(field).ok().map(|v| v == value))
        .unwrap_or(false)
}

#[async_trait]
impl<T: Record> EntityRepository<T> for MemoryEntityRepository<T> {
    async fn list(&self) -> Result<Vec<T>> {
        let items = self.items.lock().await;
        // Newest first, matching the MongoDB sort
        Ok(items.iter().rev().cloned().collect())
    }

    async fn find_by_business_id(&self, id: &str) -> Result<Option<T>> {
        let items = self.items.lock().await;
        Ok(items.iter().find(|i| i.business_id() == id).cloned())
    }

    async fn find_by_object_id(&self, oid: &ObjectId) -> Result<Option<T>> {
        let items = self.items.lock().await;
        Ok(items
            .iter()
            .find(|i| i.object_id().as_ref() == Some(oid))
            .cloned())
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Option<T>> {
        let items = self.items.lock().await;
        Ok(items
            .iter()
            .find(|i| field_matches(*i, field, value))
            .cloned())
    }

    async fn insert(&self, mut item: T) -> Result<ObjectId> {
        let mut items = self.items.lock().await;

        if items.iter().any(|i| i.business_id() == item.business_id()) {
            return Err(duplicate("id"));
        }
        if self.unique_secondary {
            if let Some((field, value)) = item.unique_field() {
                if items.iter().any(|i| field_matches(i, field, value)) {
                    return Err(duplicate(field));
                }
            }
        }

        let oid = ObjectId::new();
        let mut doc = bson::to_document(&item)?;
        doc.insert("_id", oid);
        item = bson::from_document(doc)?;
        item.mut_metadata().stamp_created();
        items.push(item);
        Ok(oid)
    }

    async fn delete_by_business_id(&self, id: &str) -> Result<bool> {
        let mut items = self.items.lock().await;
        let before = items.len();
        items.retain(|i| i.business_id() != id);
        Ok(items.len() < before)
    }

    async fn set_fields(&self, id: &str, fields: Document) -> Result<bool> {
        let mut items = self.items.lock().await;
        match items.iter_mut().find(|i| i.business_id() == id) {
            Some(item) => {
                let mut updated = apply_fields(&*item, fields)?;
                updated.mut_metadata().updated_at = Some(BsonDateTime::now());
                *item = updated;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryVerificationLedger {
    records: Mutex<HashMap<String, VerificationDoc>>,
}

impl MemoryVerificationLedger {
    /// Move a lock deadline, standing in for the clock advancing
    #[cfg(test)]
    pub async fn set_lock_until(&self, email: &str, until: Option<DateTime<Utc>>) {
        if let Some(record) = self.records.lock().await.get_mut(email) {
            record.lock_until = until.map(BsonDateTime::from_chrono);
        }
    }

    /// Move a code expiry, standing in for the clock advancing
    #[cfg(test)]
    pub async fn set_code_expiry(&self, email: &str, expires: DateTime<Utc>) {
        if let Some(record) = self.records.lock().await.get_mut(email) {
            record.verification_code_expires = Some(BsonDateTime::from_chrono(expires));
        }
    }
}

#[async_trait]
impl VerificationLedger for MemoryVerificationLedger {
    async fn find(&self, email: &str) -> Result<Option<VerificationDoc>> {
        Ok(self.records.lock().await.get(email).cloned())
    }

    async fn issue_code(
        &self,
        email: &str,
        code_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(email.to_string())
            .or_insert_with(|| VerificationDoc::new(email));
        record.verification_code = Some(code_hash);
        record.verification_code_expires = Some(BsonDateTime::from_chrono(expires_at));
        record.metadata.updated_at = Some(BsonDateTime::now());
        Ok(())
    }

    async fn record_failure(&self, email: &str, now: DateTime<Utc>) -> Result<VerificationDoc> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(email)
            .ok_or_else(|| MarketError::NotFound("No verification request for this email".into()))?;

        record.failed_attempts += 1;
        if record.failed_attempts >= MAX_FAILED_ATTEMPTS {
            record.failed_attempts = 0;
            record.lock_until = Some(BsonDateTime::from_chrono(now + lock_duration()));
        }
        Ok(record.clone())
    }

    async fn record_success(&self, email: &str) -> Result<()> {
        if let Some(record) = self.records.lock().await.get_mut(email) {
            record.failed_attempts = 0;
            record.lock_until = None;
            record.verification_code = None;
            record.verification_code_expires = None;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStoreRepository {
    stores: Mutex<Vec<StoreDoc>>,
    product_counts: Mutex<HashMap<ObjectId, u64>>,
    fail_inserts: std::sync::atomic::AtomicBool,
}

impl MemoryStoreRepository {
    /// Record how many products a store has
    pub async fn set_product_count(&self, store: ObjectId, count: u64) {
        self.product_counts.lock().await.insert(store, count);
    }

    /// Number of stores that are not soft-deleted
    pub async fn count(&self) -> usize {
        let stores = self.stores.lock().await;
        stores.iter().filter(|s| !s.metadata.is_deleted).count()
    }

    /// Make every subsequent insert fail with a database error
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreRepository for MemoryStoreRepository {
    async fn insert(&self, mut store: StoreDoc) -> Result<ObjectId> {
        if self.fail_inserts.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MarketError::Database("Insert failed: store unavailable".into()));
        }
        let id = ObjectId::new();
        store.oid = Some(id);
        store.metadata.stamp_created();
        self.stores.lock().await.push(store);
        Ok(id)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<StoreDoc>> {
        let stores = self.stores.lock().await;
        Ok(stores
            .iter()
            .find(|s| s.oid.as_ref() == Some(id) && !s.metadata.is_deleted)
            .cloned())
    }

    async fn find_by_owner(&self, owner: &ObjectId) -> Result<Option<StoreDoc>> {
        let stores = self.stores.lock().await;
        Ok(stores
            .iter()
            .find(|s| &s.owner == owner && !s.metadata.is_deleted)
            .cloned())
    }

    async fn update_if_unmodified(
        &self,
        id: &ObjectId,
        revision: i64,
        fields: Document,
    ) -> Result<bool> {
        let mut stores = self.stores.lock().await;
        match stores
            .iter_mut()
            .find(|s| s.oid.as_ref() == Some(id) && !s.metadata.is_deleted)
        {
            Some(store) if store.revision == revision => {
                let mut updated = apply_fields(&*store, fields)?;
                updated.revision = revision + 1;
                updated.metadata.updated_at = Some(BsonDateTime::now());
                *store = updated;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_products(&self, store: &ObjectId) -> Result<u64> {
        Ok(self
            .product_counts
            .lock()
            .await
            .get(store)
            .copied()
            .unwrap_or(0))
    }
}

#[derive(Default)]
pub struct MemoryActivityRepository {
    entries: Mutex<Vec<ActivityLogDoc>>,
}

#[async_trait]
impl ActivityRepository for MemoryActivityRepository {
    async fn append(&self, mut entry: ActivityLogDoc) -> Result<()> {
        entry.oid = Some(ObjectId::new());
        entry.metadata.stamp_created();
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn list_recent(&self) -> Result<Vec<ActivityLogDoc>> {
        Ok(self.entries.lock().await.iter().rev().cloned().collect())
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<ActivityLogDoc>> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().find(|e| e.oid.as_ref() == Some(id)).cloned())
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.oid.as_ref() != Some(id));
        Ok(entries.len() < before)
    }
}

#[derive(Default)]
pub struct MemoryGeneralInfoRepository {
    info: Mutex<Option<GeneralInfoDoc>>,
}

#[async_trait]
impl GeneralInfoRepository for MemoryGeneralInfoRepository {
    async fn get(&self) -> Result<Option<GeneralInfoDoc>> {
        Ok(self.info.lock().await.clone())
    }

    async fn upsert(&self, mut info: GeneralInfoDoc) -> Result<bool> {
        let mut current = self.info.lock().await;
        let created = current.is_none();
        match current.as_ref() {
            Some(existing) => {
                info.oid = existing.oid;
                info.metadata = existing.metadata.clone();
                info.metadata.updated_at = Some(BsonDateTime::now());
            }
            None => {
                info.oid = Some(ObjectId::new());
                info.metadata.stamp_created();
            }
        }
        *current = Some(info);
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::CategoryDoc;

    fn category(id: &str, label: &str) -> CategoryDoc {
        CategoryDoc {
            oid: None,
            metadata: Default::default(),
            id: id.into(),
            label: label.into(),
        }
    }

    #[tokio::test]
    async fn test_entity_uniqueness() {
        let repo = MemoryEntityRepository::<CategoryDoc>::default();
        let oid = repo.insert(category("CAT-1", "Shoes")).await.unwrap();

        let stored = repo.find_by_object_id(&oid).await.unwrap().unwrap();
        assert_eq!(stored.id, "CAT-1");
        assert!(stored.metadata.created_at.is_some());

        assert!(matches!(
            repo.insert(category("CAT-1", "Bags")).await,
            Err(MarketError::Conflict(_))
        ));
        assert!(matches!(
            repo.insert(category("CAT-2", "Shoes")).await,
            Err(MarketError::Conflict(_))
        ));
        assert!(repo
            .find_by_field("label", "Shoes")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_set_fields() {
        let repo = MemoryEntityRepository::<CategoryDoc>::default();
        repo.insert(category("CAT-1", "Shoes")).await.unwrap();

        assert!(repo
            .set_fields("CAT-1", bson::doc! { "label": "Sneakers" })
            .await
            .unwrap());
        let stored = repo.find_by_business_id("CAT-1").await.unwrap().unwrap();
        assert_eq!(stored.label, "Sneakers");
        assert!(!repo
            .set_fields("CAT-9", bson::doc! { "label": "x" })
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_failure_counter_locks_at_threshold() {
        let ledger = MemoryVerificationLedger::default();
        let now = Utc::now();
        ledger
            .issue_code("a@b.c", "hash".into(), now + chrono::Duration::minutes(10))
            .await
            .unwrap();

        assert_eq!(ledger.record_failure("a@b.c", now).await.unwrap().failed_attempts, 1);
        assert_eq!(ledger.record_failure("a@b.c", now).await.unwrap().failed_attempts, 2);

        let locked = ledger.record_failure("a@b.c", now).await.unwrap();
        assert_eq!(locked.failed_attempts, 0);
        assert_eq!(locked.lock_remaining_minutes(now), Some(60));

        ledger.record_success("a@b.c").await.unwrap();
        let cleared = ledger.find("a@b.c").await.unwrap().unwrap();
        assert!(cleared.lock_until.is_none());
        assert!(cleared.verification_code.is_none());
    }

    #[tokio::test]
    async fn test_store_revision_guard() {
        let repo = MemoryStoreRepository::default();
        let owner = ObjectId::new();
        let id = repo
            .insert(StoreDoc {
                oid: None,
                metadata: Default::default(),
                owner,
                store_name: "Tindahan ni Aling Nena".into(),
                stall_numbers: vec!["A-12".into()],
                permit: "https://cdn.example/permit.pdf".into(),
                profile_picture: None,
                description: None,
                contact_number: "09171234567".into(),
                email: "nena@example.com".into(),
                organization: None,
                linked_accounts: Vec::new(),
                views: 0,
                revision: 0,
            })
            .await
            .unwrap();

        assert!(repo
            .update_if_unmodified(&id, 0, bson::doc! { "storeName": "Nena's" })
            .await
            .unwrap());
        // Stale revision loses
        assert!(!repo
            .update_if_unmodified(&id, 0, bson::doc! { "storeName": "Other" })
            .await
            .unwrap());

        let store = repo.find_by_owner(&owner).await.unwrap().unwrap();
        assert_eq!(store.store_name, "Nena's");
        assert_eq!(store.revision, 1);
    }
}
