//! MongoDB client and collection wrapper
//!
//! Typed collections apply their schema indexes on open, stamp metadata on
//! insert and hide soft-deleted documents from reads.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::MarketError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Documents addressed by a human-assigned business `id`
pub trait Record:
    Serialize + DeserializeOwned + Clone + Unpin + Send + Sync + IntoIndexes + MutMetadata + 'static
{
    fn object_id(&self) -> Option<ObjectId>;

    /// Drop the storage id so the document can be inserted elsewhere
    fn clear_object_id(&mut self);

    fn business_id(&self) -> &str;

    /// Secondary unique field as `(stored field name, value)`
    fn unique_field(&self) -> Option<(&'static str, &str)> {
        None
    }
}

/// Unique index on a single field
pub fn unique_index(field: &str) -> (Document, Option<IndexOptions>) {
    (
        doc! { field: 1 },
        Some(
            IndexOptions::builder()
                .unique(true)
                .name(format!("{}_unique", field))
                .build(),
        ),
    )
}

/// Indexes every business-keyed collection carries
pub fn business_indexes() -> Vec<(Document, Option<IndexOptions>)> {
    vec![unique_index("id")]
}

/// Filter that hides soft-deleted documents
fn not_deleted(mut filter: Document) -> Document {
    filter.insert("metadata.isDeleted", doc! { "$ne": true });
    filter
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => err.to_string().contains("E11000"),
    }
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, MarketError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| MarketError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MarketError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, MarketError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get a typed archive collection.
    ///
    /// Only the business `id` is unique here. Secondary unique indexes left
    /// over from the active schema are dropped, since archived records may
    /// share a label with an active one or with each other.
    pub async fn archive_collection<T>(
        &self,
        name: &str,
    ) -> Result<MongoCollection<T>, MarketError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        let collection = MongoCollection::open(&self.client, &self.db_name, name, business_indexes())
            .await?;

        let keep: Vec<String> = business_indexes()
            .into_iter()
            .filter_map(|(_, opts)| opts.and_then(|o| o.name))
            .collect();
        let stale: Vec<String> = T::into_indices()
            .into_iter()
            .filter_map(|(_, opts)| opts.and_then(|o| o.name))
            .filter(|name| !keep.contains(name))
            .collect();
        collection.drop_indexes_named(&stale).await?;

        Ok(collection)
    }

    /// Count live documents in an untyped collection
    pub async fn count_documents(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<u64, MarketError> {
        self.client
            .database(&self.db_name)
            .collection::<Document>(collection)
            .count_documents(not_deleted(filter))
            .await
            .map_err(|e| MarketError::Database(format!("Count failed: {}", e)))
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply the schema indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, MarketError> {
        Self::open(client, db_name, collection_name, T::into_indices()).await
    }

    /// Create a new collection with an explicit index set
    pub async fn open(
        client: &Client,
        db_name: &str,
        collection_name: &str,
        indices: Vec<(Document, Option<IndexOptions>)>,
    ) -> Result<Self, MarketError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes(indices).await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(
        &self,
        schema_indices: Vec<(Document, Option<IndexOptions>)>,
    ) -> Result<(), MarketError> {
        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| MarketError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Drop the named indexes that currently exist
    async fn drop_indexes_named(&self, names: &[String]) -> Result<(), MarketError> {
        if names.is_empty() {
            return Ok(());
        }

        let existing = self
            .inner
            .list_index_names()
            .await
            .map_err(|e| MarketError::Database(format!("Failed to list indexes: {}", e)))?;

        for name in names.iter().filter(|n| existing.contains(n)) {
            self.inner
                .drop_index(name.as_str())
                .await
                .map_err(|e| MarketError::Database(format!("Failed to drop index {}: {}", name, e)))?;
            info!(collection = %self.inner.name(), index = %name, "Dropped index");
        }

        Ok(())
    }

    /// Insert a document, setting metadata timestamps.
    ///
    /// Unique index violations surface as [`MarketError::Conflict`].
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, MarketError> {
        item.mut_metadata().stamp_created();

        let result = self.inner.insert_one(item).await.map_err(|e| {
            if is_duplicate_key(&e) {
                MarketError::Conflict("A record with the same unique value already exists".into())
            } else {
                MarketError::Database(format!("Insert failed: {}", e))
            }
        })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| MarketError::Database("Failed to get inserted ID".into()))
    }

    /// Find one live document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, MarketError> {
        self.inner
            .find_one(not_deleted(filter))
            .await
            .map_err(|e| MarketError::Database(format!("Find failed: {}", e)))
    }

    /// Find live documents by filter, optionally sorted
    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<T>, MarketError> {
        use futures_util::StreamExt;

        let cursor = self
            .inner
            .find(not_deleted(filter))
            .sort(sort.unwrap_or_default())
            .await
            .map_err(|e| MarketError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Update one document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, MarketError> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    MarketError::Conflict("A record with the same unique value already exists".into())
                } else {
                    MarketError::Database(format!("Update failed: {}", e))
                }
            })
    }

    /// `$set` fields on one live document, bumping `metadata.updatedAt`
    pub async fn set_fields(
        &self,
        filter: Document,
        mut fields: Document,
    ) -> Result<UpdateResult, MarketError> {
        fields.insert("metadata.updatedAt", DateTime::now());
        self.update_one(not_deleted(filter), doc! { "$set": fields })
            .await
    }

    /// Insert or replace the fields of one document
    pub async fn upsert_one(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, MarketError> {
        self.inner
            .update_one(filter, update)
            .upsert(true)
            .await
            .map_err(|e| MarketError::Database(format!("Upsert failed: {}", e)))
    }

    /// Atomically update and return the document as it is afterwards
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<Option<T>, MarketError> {
        self.inner
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| MarketError::Database(format!("Find and update failed: {}", e)))
    }

    /// Hard delete one document, returning how many were removed
    pub async fn delete_one(&self, filter: Document) -> Result<u64, MarketError> {
        self.inner
            .delete_one(filter)
            .await
            .map(|r| r.deleted_count)
            .map_err(|e| MarketError::Database(format!("Delete failed: {}", e)))
    }

    /// Soft delete a document
    pub async fn soft_delete(&self, filter: Document) -> Result<UpdateResult, MarketError> {
        let update = doc! {
            "$set": {
                "metadata.isDeleted": true,
                "metadata.deletedAt": DateTime::now(),
                "metadata.updatedAt": DateTime::now(),
            }
        };

        self.update_one(not_deleted(filter), update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_deleted_filter() {
        let filter = not_deleted(doc! { "email": "a@b.c" });
        assert_eq!(filter.get_str("email").unwrap(), "a@b.c");
        assert!(filter.get_document("metadata.isDeleted").is_ok());
    }

    #[test]
    fn test_unique_index_named_after_field() {
        let (keys, opts) = unique_index("label");
        assert_eq!(keys, doc! { "label": 1 });
        let opts = opts.unwrap();
        assert_eq!(opts.unique, Some(true));
        assert_eq!(opts.name.as_deref(), Some("label_unique"));
    }
}
