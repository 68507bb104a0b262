//! Store views and updates

use bson::{doc, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::{activity::ActivityLogger, is_https_url, parse_object_id, reconcile, Actor};
use crate::auth::SubjectType;
use crate::db::schemas::{LinkDoc, LinkedAccount, OrganizationDoc, StoreDoc};
use crate::repository::{EntityRepository, StoreRepository};
use crate::types::{MarketError, Result};

/// Attempts at the read-reconcile-swap loop before giving up
const MAX_UPDATE_ATTEMPTS: usize = 3;

/// A linked account with its platform expanded
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccountView {
    pub platform: String,
    pub platform_name: String,
    /// Platform logo
    pub logo: String,
    pub url: String,
}

/// Store as returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    pub store_name: String,
    pub stall_numbers: Vec<String>,
    pub permit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub contact_number: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    pub linked_accounts: Vec<LinkedAccountView>,
    pub no_of_products: u64,
    pub views: i64,
}

/// One entry of an incoming linked-account list
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingLink {
    pub platform: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Partial store update. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreUpdate {
    pub store_name: Option<String>,
    pub stall_numbers: Option<Vec<String>>,
    pub profile_picture: Option<String>,
    pub description: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub organization: Option<String>,
    pub linked_accounts: Option<Vec<IncomingLink>>,
}

#[derive(Clone)]
pub struct StoreService {
    stores: Arc<dyn StoreRepository>,
    links: Arc<dyn EntityRepository<LinkDoc>>,
    organizations: Arc<dyn EntityRepository<OrganizationDoc>>,
    activity: ActivityLogger,
}

impl StoreService {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        links: Arc<dyn EntityRepository<LinkDoc>>,
        organizations: Arc<dyn EntityRepository<OrganizationDoc>>,
        activity: ActivityLogger,
    ) -> Self {
        Self {
            stores,
            links,
            organizations,
            activity,
        }
    }

    pub async fn create(&self, store: StoreDoc) -> Result<ObjectId> {
        self.stores.insert(store).await
    }

    pub async fn find_by_owner(&self, owner: &ObjectId) -> Result<Option<StoreDoc>> {
        self.stores.find_by_owner(owner).await
    }

    /// Resolve an organization reference to an active organization's id
    pub async fn resolve_organization(&self, raw: &str) -> Result<ObjectId> {
        let oid = parse_object_id(raw, "organization")?;
        match self.organizations.find_by_object_id(&oid).await? {
            Some(_) => Ok(oid),
            None => Err(MarketError::Validation("Unknown organization".into())),
        }
    }

    pub async fn get_store(&self, id: &ObjectId) -> Result<StoreProfile> {
        let store = self
            .stores
            .find_by_id(id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Store not found".into()))?;
        self.profile(store).await
    }

    /// Expand platform links and organization and count products
    pub async fn profile(&self, store: StoreDoc) -> Result<StoreProfile> {
        let store_id = store
            .oid
            .ok_or_else(|| MarketError::Internal("Store without id".into()))?;

        let mut linked_accounts = Vec::with_capacity(store.linked_accounts.len());
        for account in store.linked_accounts.iter().filter(|a| !a.is_deleted) {
            match self.links.find_by_object_id(&account.platform).await? {
                Some(platform) => linked_accounts.push(LinkedAccountView {
                    platform: account.platform.to_hex(),
                    platform_name: platform.label,
                    logo: platform.link,
                    url: account.url.clone(),
                }),
                // Platform archived since the link was made
                None => debug!(platform = %account.platform, "Skipping link to missing platform"),
            }
        }

        let organization_name = match store.organization {
            Some(org) => self
                .organizations
                .find_by_object_id(&org)
                .await?
                .map(|o| o.organization_name),
            None => None,
        };

        let no_of_products = self.stores.count_products(&store_id).await?;

        Ok(StoreProfile {
            id: store_id.to_hex(),
            owner: store.owner.to_hex(),
            store_name: store.store_name,
            stall_numbers: store.stall_numbers,
            permit: store.permit,
            profile_picture: store.profile_picture,
            description: store.description,
            contact_number: store.contact_number,
            email: store.email,
            organization: store.organization.map(|o| o.to_hex()),
            organization_name,
            linked_accounts,
            no_of_products,
            views: store.views,
        })
    }

    /// Apply a partial update, reconciling linked accounts against the
    /// stored list. The write only lands if nobody changed the store since
    /// it was read; otherwise the read and merge are retried.
    pub async fn update_store(
        &self,
        actor: &Actor,
        id: &ObjectId,
        update: StoreUpdate,
    ) -> Result<StoreProfile> {
        let incoming = self.validate_links(update.linked_accounts.as_deref()).await?;
        let mut fields = self.scalar_fields(&update).await?;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let store = self
                .stores
                .find_by_id(id)
                .await?
                .ok_or_else(|| MarketError::NotFound("Store not found".into()))?;

            if actor.kind == SubjectType::Account && store.owner != actor.id {
                return Err(MarketError::Forbidden(
                    "You can only update your own store".into(),
                ));
            }

            if let Some(incoming) = &incoming {
                let merged = reconcile(&store.linked_accounts, incoming);
                fields.insert("linkedAccounts", bson::to_bson(&merged)?);
            }

            if self
                .stores
                .update_if_unmodified(id, store.revision, fields.clone())
                .await?
            {
                let store = self
                    .stores
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| MarketError::NotFound("Store not found".into()))?;
                info!(store = %id, attempt, "Store updated");
                self.activity
                    .record(actor, format!("Updated store ({})", store.store_name))
                    .await;
                return self.profile(store).await;
            }

            debug!(store = %id, attempt, "Store changed underneath update, retrying");
        }

        Err(MarketError::Conflict(
            "Store was modified concurrently, please retry".into(),
        ))
    }

    async fn scalar_fields(&self, update: &StoreUpdate) -> Result<Document> {
        let mut fields = doc! {};
        let mut errors = Vec::new();

        if let Some(name) = &update.store_name {
            if name.trim().is_empty() {
                errors.push("storeName cannot be empty");
            }
            fields.insert("storeName", name.trim());
        }
        if let Some(stalls) = &update.stall_numbers {
            let stalls: Vec<&str> = stalls
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect();
            if stalls.is_empty() {
                errors.push("stallNumbers must list at least one stall");
            }
            fields.insert("stallNumbers", stalls);
        }
        if let Some(picture) = &update.profile_picture {
            fields.insert("profilePicture", picture.trim());
        }
        if let Some(description) = &update.description {
            fields.insert("description", description.trim());
        }
        if let Some(contact) = &update.contact_number {
            if contact.trim().is_empty() {
                errors.push("contactNumber cannot be empty");
            }
            fields.insert("contactNumber", contact.trim());
        }
        if let Some(email) = &update.email {
            let email = super::normalize_email(email);
            if !super::is_valid_email(&email) {
                errors.push("email must be a valid email address");
            }
            fields.insert("email", email);
        }

        if !errors.is_empty() {
            return Err(MarketError::Validation(errors.join(", ")));
        }

        if let Some(org) = &update.organization {
            fields.insert("organization", self.resolve_organization(org).await?);
        }

        Ok(fields)
    }

    async fn validate_links(
        &self,
        incoming: Option<&[IncomingLink]>,
    ) -> Result<Option<Vec<LinkedAccount>>> {
        let Some(incoming) = incoming else {
            return Ok(None);
        };

        let mut parsed = Vec::with_capacity(incoming.len());
        for link in incoming {
            let platform = parse_object_id(&link.platform, "platform")?;
            if !link.is_deleted {
                if !is_https_url(link.url.trim()) {
                    return Err(MarketError::Validation(
                        "Linked account url must be an https URL".into(),
                    ));
                }
                if self.links.find_by_object_id(&platform).await?.is_none() {
                    return Err(MarketError::Validation("Unknown platform".into()));
                }
            }
            parsed.push(LinkedAccount {
                platform,
                url: link.url.trim().to_string(),
                is_deleted: link.is_deleted,
            });
        }
        Ok(Some(parsed))
    }
}
