//! MongoDB implementations of the repository traits

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use super::{
    AccountRepository, ActivityRepository, ArchivePair, EntityRepository, GeneralInfoRepository,
    Repositories, StoreRepository, VerificationLedger,
};
use crate::db::schemas::{
    lock_duration, AccountDoc, AccountStatus, ActivityLogDoc, AdminDoc, CategoryDoc,
    GeneralInfoDoc, LinkDoc, OrganizationDoc, ProductTypeDoc, StoreDoc, VerificationDoc,
    ACCOUNT_COLLECTION, ACTIVITY_COLLECTION, ADMIN_COLLECTION, ARCHIVED_ADMIN_COLLECTION,
    ARCHIVED_CATEGORY_COLLECTION, ARCHIVED_LINK_COLLECTION, ARCHIVED_ORGANIZATION_COLLECTION,
    ARCHIVED_PRODUCT_TYPE_COLLECTION, CATEGORY_COLLECTION, GENERAL_INFO_COLLECTION,
    LINK_COLLECTION, MAX_FAILED_ATTEMPTS, ORGANIZATION_COLLECTION, PRODUCT_COLLECTION,
    PRODUCT_TYPE_COLLECTION, STORE_COLLECTION, VERIFICATION_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection, Record};
use crate::types::{MarketError, Result};

/// Open every collection and build the repository bundle
pub(super) async fn open_all(client: &MongoClient) -> Result<Repositories> {
    Ok(Repositories {
        accounts: Arc::new(MongoAccountRepository {
            accounts: client.collection(ACCOUNT_COLLECTION).await?,
        }),
        admins: pair::<AdminDoc>(client, ADMIN_COLLECTION, ARCHIVED_ADMIN_COLLECTION).await?,
        categories: pair::<CategoryDoc>(client, CATEGORY_COLLECTION, ARCHIVED_CATEGORY_COLLECTION)
            .await?,
        organizations: pair::<OrganizationDoc>(
            client,
            ORGANIZATION_COLLECTION,
            ARCHIVED_ORGANIZATION_COLLECTION,
        )
        .await?,
        product_types: pair::<ProductTypeDoc>(
            client,
            PRODUCT_TYPE_COLLECTION,
            ARCHIVED_PRODUCT_TYPE_COLLECTION,
        )
        .await?,
        links: pair::<LinkDoc>(client, LINK_COLLECTION, ARCHIVED_LINK_COLLECTION).await?,
        verifications: Arc::new(MongoVerificationLedger {
            records: client.collection(VERIFICATION_COLLECTION).await?,
        }),
        stores: Arc::new(MongoStoreRepository {
            stores: client.collection(STORE_COLLECTION).await?,
            client: client.clone(),
        }),
        activity: Arc::new(MongoActivityRepository {
            entries: client.collection(ACTIVITY_COLLECTION).await?,
        }),
        general_info: Arc::new(MongoGeneralInfoRepository {
            info: client.collection(GENERAL_INFO_COLLECTION).await?,
        }),
    })
}

async fn pair<T: Record>(
    client: &MongoClient,
    active: &str,
    archived: &str,
) -> Result<ArchivePair<T>> {
    Ok(ArchivePair {
        active: Arc::new(MongoEntityRepository::<T> {
            collection: client.collection(active).await?,
        }),
        archived: Arc::new(MongoEntityRepository::<T> {
            collection: client.archive_collection(archived).await?,
        }),
    })
}

pub struct MongoAccountRepository {
    accounts: MongoCollection<AccountDoc>,
}

#[async_trait]
impl AccountRepository for MongoAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountDoc>> {
        self.accounts.find_one(doc! { "email": email }).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<AccountDoc>> {
        self.accounts.find_one(doc! { "_id": id }).await
    }

    async fn insert(&self, account: AccountDoc) -> Result<ObjectId> {
        self.accounts.insert_one(account).await
    }

    async fn remove(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.accounts.delete_one(doc! { "_id": id }).await? > 0)
    }

    async fn set_status(&self, id: &ObjectId, status: AccountStatus) -> Result<bool> {
        let result = self
            .accounts
            .set_fields(
                doc! { "_id": id },
                doc! {
                    "status": status.as_str(),
                    "isVerified": status == AccountStatus::Verified,
                },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn soft_delete(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.accounts.soft_delete(doc! { "_id": id }).await?.matched_count > 0)
    }
}

pub struct MongoEntityRepository<T: Record> {
    collection: MongoCollection<T>,
}

#[async_trait]
impl<T: Record> EntityRepository<T> for MongoEntityRepository<T> {
    async fn list(&self) -> Result<Vec<T>> {
        self.collection
            .find_many(doc! {}, Some(doc! { "metadata.createdAt": -1 }))
            .await
    }

    async fn find_by_business_id(&self, id: &str) -> Result<Option<T>> {
        self.collection.find_one(doc! { "id": id }).await
    }

    async fn find_by_object_id(&self, oid: &ObjectId) -> Result<Option<T>> {
        self.collection.find_one(doc! { "_id": oid }).await
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Option<T>> {
        self.collection.find_one(doc! { field: value }).await
    }

    async fn insert(&self, item: T) -> Result<ObjectId> {
        self.collection.insert_one(item).await
    }

    async fn delete_by_business_id(&self, id: &str) -> Result<bool> {
        Ok(self.collection.delete_one(doc! { "id": id }).await? > 0)
    }

    async fn set_fields(&self, id: &str, fields: Document) -> Result<bool> {
        let result = self.collection.set_fields(doc! { "id": id }, fields).await?;
        Ok(result.matched_count > 0)
    }
}

pub struct MongoVerificationLedger {
    records: MongoCollection<VerificationDoc>,
}

#[async_trait]
impl VerificationLedger for MongoVerificationLedger {
    async fn find(&self, email: &str) -> Result<Option<VerificationDoc>> {
        self.records.find_one(doc! { "email": email }).await
    }

    async fn issue_code(
        &self,
        email: &str,
        code_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let now = BsonDateTime::now();
        self.records
            .upsert_one(
                doc! { "email": email },
                doc! {
                    "$set": {
                        "verificationCode": code_hash,
                        "verificationCodeExpires": BsonDateTime::from_chrono(expires_at),
                        "metadata.updatedAt": now,
                    },
                    "$setOnInsert": {
                        "failedAttempts": 0,
                        "metadata.isDeleted": false,
                        "metadata.createdAt": now,
                    },
                },
            )
            .await?;
        Ok(())
    }

    async fn record_failure(&self, email: &str, now: DateTime<Utc>) -> Result<VerificationDoc> {
        let counted = self
            .records
            .find_one_and_update(
                doc! { "email": email },
                doc! {
                    "$inc": { "failedAttempts": 1 },
                    "$set": { "metadata.updatedAt": BsonDateTime::from_chrono(now) },
                },
            )
            .await?
            .ok_or_else(|| MarketError::NotFound("No verification request for this email".into()))?;

        if counted.failed_attempts < MAX_FAILED_ATTEMPTS {
            return Ok(counted);
        }

        // Only the writer that crossed the threshold sets the lock
        let locked = self
            .records
            .find_one_and_update(
                doc! { "email": email, "failedAttempts": { "$gte": MAX_FAILED_ATTEMPTS } },
                doc! {
                    "$set": {
                        "failedAttempts": 0,
                        "lockUntil": BsonDateTime::from_chrono(now + lock_duration()),
                    },
                },
            )
            .await?;

        match locked {
            Some(doc) => Ok(doc),
            None => {
                debug!(email = %email, "Lock already applied by a concurrent attempt");
                self.records
                    .find_one(doc! { "email": email })
                    .await?
                    .ok_or_else(|| {
                        MarketError::NotFound("No verification request for this email".into())
                    })
            }
        }
    }

    async fn record_success(&self, email: &str) -> Result<()> {
        self.records
            .update_one(
                doc! { "email": email },
                doc! {
                    "$set": {
                        "failedAttempts": 0,
                        "metadata.updatedAt": BsonDateTime::now(),
                    },
                    "$unset": {
                        "lockUntil": "",
                        "verificationCode": "",
                        "verificationCodeExpires": "",
                    },
                },
            )
            .await?;
        Ok(())
    }
}

pub struct MongoStoreRepository {
    stores: MongoCollection<StoreDoc>,
    client: MongoClient,
}

#[async_trait]
impl StoreRepository for MongoStoreRepository {
    async fn insert(&self, store: StoreDoc) -> Result<ObjectId> {
        self.stores.insert_one(store).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<StoreDoc>> {
        self.stores.find_one(doc! { "_id": id }).await
    }

    async fn find_by_owner(&self, owner: &ObjectId) -> Result<Option<StoreDoc>> {
        self.stores.find_one(doc! { "owner": owner }).await
    }

    async fn update_if_unmodified(
        &self,
        id: &ObjectId,
        revision: i64,
        mut fields: Document,
    ) -> Result<bool> {
        // Documents written before revisions existed have no field at all
        let revision_filter = if revision == 0 {
            Bson::Document(doc! { "$in": [0_i64, Bson::Null] })
        } else {
            Bson::Int64(revision)
        };

        fields.insert("metadata.updatedAt", BsonDateTime::now());
        let result = self
            .stores
            .update_one(
                doc! {
                    "_id": id,
                    "revision": revision_filter,
                    "metadata.isDeleted": { "$ne": true },
                },
                doc! { "$set": fields, "$inc": { "revision": 1_i64 } },
            )
            .await?;

        Ok(result.modified_count > 0)
    }

    async fn count_products(&self, store: &ObjectId) -> Result<u64> {
        self.client
            .count_documents(PRODUCT_COLLECTION, doc! { "storeId": store })
            .await
    }
}

pub struct MongoActivityRepository {
    entries: MongoCollection<ActivityLogDoc>,
}

#[async_trait]
impl ActivityRepository for MongoActivityRepository {
    async fn append(&self, entry: ActivityLogDoc) -> Result<()> {
        self.entries.insert_one(entry).await.map(|_| ())
    }

    async fn list_recent(&self) -> Result<Vec<ActivityLogDoc>> {
        self.entries
            .find_many(doc! {}, Some(doc! { "metadata.createdAt": -1 }))
            .await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<ActivityLogDoc>> {
        self.entries.find_one(doc! { "_id": id }).await
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.entries.delete_one(doc! { "_id": id }).await? > 0)
    }
}

pub struct MongoGeneralInfoRepository {
    info: MongoCollection<GeneralInfoDoc>,
}

#[async_trait]
impl GeneralInfoRepository for MongoGeneralInfoRepository {
    async fn get(&self) -> Result<Option<GeneralInfoDoc>> {
        self.info.find_one(doc! {}).await
    }

    async fn upsert(&self, info: GeneralInfoDoc) -> Result<bool> {
        let mut fields = bson::to_document(&info)?;
        fields.remove("_id");
        fields.remove("metadata");

        let now = BsonDateTime::now();
        fields.insert("metadata.updatedAt", now);

        let result = self
            .info
            .upsert_one(
                doc! {},
                doc! {
                    "$set": fields,
                    "$setOnInsert": {
                        "metadata.isDeleted": false,
                        "metadata.createdAt": now,
                    },
                },
            )
            .await?;

        Ok(result.upserted_id.is_some())
    }
}
