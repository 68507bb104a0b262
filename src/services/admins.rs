//! Admin management
//!
//! New admins get a generated password that is mailed to them. If the mail
//! cannot be delivered the admin is removed again, since nobody would know
//! the password.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use super::{
    archive::ArchiveService, is_valid_email, mailer::Mailer, normalize_email, ActivityLogger,
    Actor, OutgoingMail,
};
use crate::auth::{generate_password, hash_password};
use crate::db::schemas::{AdminDoc, AdminRole, AdminStatus, Metadata};
use crate::repository::AccountRepository;
use crate::types::{MarketError, Result};

const GENERATED_PASSWORD_LEN: usize = 12;

/// Admin creation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdmin {
    pub id: String,
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(default)]
    pub role: AdminRole,
}

impl NewAdmin {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.id.trim().is_empty() {
            errors.push("id is required");
        }
        if !is_valid_email(&normalize_email(&self.email)) {
            errors.push("email must be a valid email address");
        }
        if self.first_name.trim().is_empty() {
            errors.push("firstName is required");
        }
        if self.last_name.trim().is_empty() {
            errors.push("lastName is required");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MarketError::Validation(errors.join(", ")))
        }
    }
}

#[derive(Clone)]
pub struct AdminService {
    archive: ArchiveService<AdminDoc>,
    accounts: Arc<dyn AccountRepository>,
    mailer: Arc<dyn Mailer>,
    activity: ActivityLogger,
}

impl AdminService {
    pub fn new(
        archive: ArchiveService<AdminDoc>,
        accounts: Arc<dyn AccountRepository>,
        mailer: Arc<dyn Mailer>,
        activity: ActivityLogger,
    ) -> Self {
        Self {
            archive,
            accounts,
            mailer,
            activity,
        }
    }

    /// Archive/restore operations for admins
    pub fn archive(&self) -> &ArchiveService<AdminDoc> {
        &self.archive
    }

    pub async fn create(&self, actor: &Actor, input: NewAdmin) -> Result<AdminDoc> {
        input.validate()?;
        let email = normalize_email(&input.email);

        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(MarketError::Conflict("Email already registered".into()));
        }

        let password = generate_password(GENERATED_PASSWORD_LEN);
        let admin = AdminDoc {
            oid: None,
            metadata: Metadata::new(),
            id: input.id.trim().to_string(),
            email: email.clone(),
            first_name: input.first_name.trim().to_string(),
            middle_name: input
                .middle_name
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            last_name: input.last_name.trim().to_string(),
            password: hash_password(&password)?,
            status: AdminStatus::Active,
            role: input.role,
        };

        let stored = self.archive.insert_new(admin).await?;
        let name = stored.full_name();

        if let Err(e) = self
            .mailer
            .send(OutgoingMail::admin_welcome(&email, &name, &password))
            .await
        {
            error!(admin = %stored.id, error = %e, "Welcome mail failed, removing admin");
            if let Err(undo) = self.archive.active().delete_by_business_id(&stored.id).await {
                error!(admin = %stored.id, error = %undo, "Failed to remove undeliverable admin");
            }
            return Err(e);
        }

        info!(admin = %stored.id, "Admin created");
        self.activity
            .record(actor, format!("Created admin ({})", name))
            .await;
        Ok(stored)
    }

    pub async fn set_status(&self, actor: &Actor, id: &str, status: AdminStatus) -> Result<AdminDoc> {
        let updated = self
            .archive
            .active()
            .set_fields(id, bson::doc! { "status": bson::to_bson(&status)? })
            .await?;
        if !updated {
            return Err(MarketError::NotFound("Admin not found".into()));
        }

        let admin = self
            .archive
            .active()
            .find_by_business_id(id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Admin not found".into()))?;

        self.activity
            .record(
                actor,
                format!("Updated admin status ({}) to {:?}", admin.full_name(), status),
            )
            .await;
        Ok(admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{verify_password, SubjectType};
    use crate::repository::memory::MemoryRepositories;
    use crate::services::OutboxMailer;
    use bson::oid::ObjectId;

    fn setup() -> (AdminService, Arc<OutboxMailer>, crate::repository::Repositories) {
        let repos = MemoryRepositories::new().into_repositories();
        let logger = ActivityLogger::new(
            repos.activity.clone(),
            repos.accounts.clone(),
            repos.admins.active.clone(),
        );
        let outbox = Arc::new(OutboxMailer::new());
        let service = AdminService::new(
            ArchiveService::new(repos.admins.clone(), logger.clone()),
            repos.accounts.clone(),
            outbox.clone(),
            logger,
        );
        (service, outbox, repos)
    }

    fn actor() -> Actor {
        Actor {
            id: ObjectId::new(),
            kind: SubjectType::Admin,
        }
    }

    fn new_admin() -> NewAdmin {
        NewAdmin {
            id: "ADM-2".into(),
            email: " Andres@Taytay.Test ".into(),
            first_name: "Andres".into(),
            middle_name: None,
            last_name: "Bonifacio".into(),
            role: AdminRole::SuperAdmin,
        }
    }

    #[tokio::test]
    async fn test_create_mails_working_password() {
        let (service, outbox, _) = setup();
        let admin = service.create(&actor(), new_admin()).await.unwrap();
        assert_eq!(admin.email, "andres@taytay.test");

        let mail = outbox.last_to("andres@taytay.test").unwrap();
        let password = mail
            .html
            .split("Temporary password: <strong>")
            .nth(1)
            .and_then(|rest| rest.split("</strong>").next())
            .unwrap();
        assert_eq!(password.len(), GENERATED_PASSWORD_LEN);
        assert!(verify_password(password, &admin.password).unwrap());
    }

    #[tokio::test]
    async fn test_undeliverable_admin_is_removed() {
        let (service, outbox, repos) = setup();
        outbox.fail_deliveries(true);

        assert!(matches!(
            service.create(&actor(), new_admin()).await,
            Err(MarketError::Mail(_))
        ));
        assert!(repos
            .admins
            .active
            .find_by_business_id("ADM-2")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_set_status() {
        let (service, _, _) = setup();
        service.create(&actor(), new_admin()).await.unwrap();

        let admin = service
            .set_status(&actor(), "ADM-2", AdminStatus::Inactive)
            .await
            .unwrap();
        assert_eq!(admin.status, AdminStatus::Inactive);

        assert!(matches!(
            service
                .set_status(&actor(), "ADM-404", AdminStatus::Active)
                .await,
            Err(MarketError::NotFound(_))
        ));
    }
}
