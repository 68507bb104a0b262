//! Admin-side account moderation

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::info;

use super::{ActivityLogger, Actor};
use crate::db::schemas::{AccountDoc, AccountStatus};
use crate::repository::AccountRepository;
use crate::types::{MarketError, Result};

#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    activity: ActivityLogger,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountRepository>, activity: ActivityLogger) -> Self {
        Self { accounts, activity }
    }

    async fn existing(&self, id: &ObjectId) -> Result<AccountDoc> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Account not found".into()))
    }

    /// Verify, block or reopen an account. Verified accounts can log in.
    pub async fn set_status(
        &self,
        actor: &Actor,
        id: &ObjectId,
        status: AccountStatus,
    ) -> Result<AccountDoc> {
        actor.require_admin()?;
        let account = self.existing(id).await?;

        if !self.accounts.set_status(id, status).await? {
            return Err(MarketError::NotFound("Account not found".into()));
        }

        info!(account = %id, status = status.as_str(), "Account status changed");
        self.activity
            .record(
                actor,
                format!(
                    "Updated account status ({}) to {}",
                    account.full_name(),
                    status.as_str()
                ),
            )
            .await;
        self.existing(id).await
    }

    pub async fn delete(&self, actor: &Actor, id: &ObjectId) -> Result<()> {
        actor.require_admin()?;
        let account = self.existing(id).await?;

        if !self.accounts.soft_delete(id).await? {
            return Err(MarketError::NotFound("Account not found".into()));
        }

        info!(account = %id, "Account deleted");
        self.activity
            .record(actor, format!("Deleted account ({})", account.full_name()))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SubjectType;
    use crate::db::schemas::Metadata;
    use crate::repository::Repositories;
    use chrono::NaiveDate;

    fn account(email: &str) -> AccountDoc {
        AccountDoc {
            oid: None,
            metadata: Metadata::new(),
            first_name: "Maria".into(),
            middle_name: None,
            last_name: "Clara".into(),
            birthday: NaiveDate::from_ymd_opt(1995, 2, 14).unwrap(),
            contact_number: "09181234567".into(),
            address: None,
            username: "mclara".into(),
            email: email.into(),
            password: "hash".into(),
            status: AccountStatus::Pending,
            is_verified: false,
        }
    }

    fn setup() -> (AccountService, Repositories) {
        let repos = Repositories::in_memory();
        let logger = ActivityLogger::new(
            repos.activity.clone(),
            repos.accounts.clone(),
            repos.admins.active.clone(),
        );
        (AccountService::new(repos.accounts.clone(), logger), repos)
    }

    fn admin() -> Actor {
        Actor {
            id: ObjectId::new(),
            kind: SubjectType::Admin,
        }
    }

    #[tokio::test]
    async fn test_verify_then_delete() {
        let (service, repos) = setup();
        let id = repos.accounts.insert(account("maria@taytay.test")).await.unwrap();

        let verified = service
            .set_status(&admin(), &id, AccountStatus::Verified)
            .await
            .unwrap();
        assert!(verified.is_verified);

        service.delete(&admin(), &id).await.unwrap();
        assert!(repos.accounts.find_by_id(&id).await.unwrap().is_none());
        assert!(matches!(
            service.delete(&admin(), &id).await,
            Err(MarketError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_accounts_cannot_moderate() {
        let (service, repos) = setup();
        let id = repos.accounts.insert(account("maria@taytay.test")).await.unwrap();
        let seller = Actor {
            id,
            kind: SubjectType::Account,
        };

        assert!(matches!(
            service.set_status(&seller, &id, AccountStatus::Verified).await,
            Err(MarketError::Forbidden(_))
        ));
    }
}
