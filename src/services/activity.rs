//! Activity log
//!
//! Mutations record who did what. A failure to write the log is logged and
//! swallowed so it never fails the request that triggered it.

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::warn;

use super::Actor;
use crate::auth::SubjectType;
use crate::db::schemas::{ActivityLogDoc, AdminDoc};
use crate::repository::{AccountRepository, ActivityRepository, EntityRepository};
use crate::types::{MarketError, Result};

/// Name recorded when the actor can no longer be resolved
pub const UNKNOWN_USER: &str = "Unknown User";

#[derive(Clone)]
pub struct ActivityLogger {
    entries: Arc<dyn ActivityRepository>,
    accounts: Arc<dyn AccountRepository>,
    admins: Arc<dyn EntityRepository<AdminDoc>>,
}

impl ActivityLogger {
    pub fn new(
        entries: Arc<dyn ActivityRepository>,
        accounts: Arc<dyn AccountRepository>,
        admins: Arc<dyn EntityRepository<AdminDoc>>,
    ) -> Self {
        Self {
            entries,
            accounts,
            admins,
        }
    }

    /// "First Last" of the acting principal
    pub async fn actor_name(&self, actor: &Actor) -> String {
        let name = match actor.kind {
            SubjectType::Admin => self
                .admins
                .find_by_object_id(&actor.id)
                .await
                .map(|a| a.map(|a| a.full_name())),
            SubjectType::Account => self
                .accounts
                .find_by_id(&actor.id)
                .await
                .map(|a| a.map(|a| a.full_name())),
        };

        match name {
            Ok(Some(name)) => name,
            Ok(None) => UNKNOWN_USER.to_string(),
            Err(e) => {
                warn!(actor = %actor.id, error = %e, "Could not resolve actor name");
                UNKNOWN_USER.to_string()
            }
        }
    }

    /// Append an entry. Never fails.
    pub async fn record(&self, actor: &Actor, action: impl Into<String>) {
        let action = action.into();
        let username = self.actor_name(actor).await;

        if let Err(e) = self
            .entries
            .append(ActivityLogDoc::new(username, action.clone()))
            .await
        {
            warn!(action = %action, error = %e, "Failed to write activity log");
        }
    }

    pub async fn list(&self) -> Result<Vec<ActivityLogDoc>> {
        self.entries.list_recent().await
    }

    pub async fn get(&self, id: &ObjectId) -> Result<ActivityLogDoc> {
        self.entries
            .find_by_id(id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Activity log not found".into()))
    }

    pub async fn delete(&self, id: &ObjectId) -> Result<()> {
        if self.entries.delete(id).await? {
            Ok(())
        } else {
            Err(MarketError::NotFound("Activity log not found".into()))
        }
    }
}
