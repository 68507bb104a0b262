//! Archive/restore lifecycle
//!
//! Admins and the taxonomies live in an active collection and a parallel
//! archived one. Archiving moves a record out of the active collection,
//! restoring moves it back. A business `id` is in at most one of the two.
//!
//! Each move is insert-then-delete. If the delete fails and the source record
//! is still there, the insert is undone. When the outcome of the delete
//! cannot be confirmed the copy stays, so the worst case is a record in both
//! collections and never a record in neither.

use std::sync::Arc;
use tracing::{error, info, warn};

use super::{activity::ActivityLogger, Actor};
use crate::db::schemas::{AdminDoc, CategoryDoc, LinkDoc, OrganizationDoc, ProductTypeDoc};
use crate::db::Record;
use crate::repository::{ArchivePair, EntityRepository};
use crate::types::{MarketError, Result};

/// Kinds that support archive/restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Admin,
    Category,
    Organization,
    ProductType,
    Link,
}

impl ArchiveKind {
    pub const ALL: [ArchiveKind; 5] = [
        Self::Admin,
        Self::Category,
        Self::Organization,
        Self::ProductType,
        Self::Link,
    ];

    /// Lower-case noun used in activity log lines
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Category => "category",
            Self::Organization => "organization",
            Self::ProductType => "product type",
            Self::Link => "link",
        }
    }

    /// Capitalized noun used in client messages
    pub fn title(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Category => "Category",
            Self::Organization => "Organization",
            Self::ProductType => "Product type",
            Self::Link => "Link",
        }
    }

    /// Path segment of the active collection, e.g. `product-types`
    pub fn route_segment(&self) -> &'static str {
        match self {
            Self::Admin => "admins",
            Self::Category => "categories",
            Self::Organization => "organizations",
            Self::ProductType => "product-types",
            Self::Link => "links",
        }
    }

    pub fn from_route_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.route_segment() == segment)
    }
}

/// A record kind managed by [`ArchiveService`]
pub trait Archivable: Record {
    const KIND: ArchiveKind;

    /// Human readable name for activity log lines
    fn display_name(&self) -> String;

    /// How the secondary unique field is named in conflict messages
    fn unique_label() -> &'static str {
        "value"
    }
}

impl Archivable for AdminDoc {
    const KIND: ArchiveKind = ArchiveKind::Admin;

    fn display_name(&self) -> String {
        self.full_name()
    }

    fn unique_label() -> &'static str {
        "email"
    }
}

impl Archivable for CategoryDoc {
    const KIND: ArchiveKind = ArchiveKind::Category;

    fn display_name(&self) -> String {
        self.label.clone()
    }

    fn unique_label() -> &'static str {
        "label"
    }
}

impl Archivable for OrganizationDoc {
    const KIND: ArchiveKind = ArchiveKind::Organization;

    fn display_name(&self) -> String {
        self.organization_name.clone()
    }

    fn unique_label() -> &'static str {
        "name"
    }
}

impl Archivable for ProductTypeDoc {
    const KIND: ArchiveKind = ArchiveKind::ProductType;

    fn display_name(&self) -> String {
        self.label.clone()
    }

    fn unique_label() -> &'static str {
        "label"
    }
}

impl Archivable for LinkDoc {
    const KIND: ArchiveKind = ArchiveKind::Link;

    fn display_name(&self) -> String {
        self.label.clone()
    }
}

/// Archive/restore manager for one kind
pub struct ArchiveService<T: Archivable> {
    pair: ArchivePair<T>,
    activity: ActivityLogger,
}

impl<T: Archivable> Clone for ArchiveService<T> {
    fn clone(&self) -> Self {
        Self {
            pair: self.pair.clone(),
            activity: self.activity.clone(),
        }
    }
}

impl<T: Archivable> ArchiveService<T> {
    pub fn new(pair: ArchivePair<T>, activity: ActivityLogger) -> Self {
        Self { pair, activity }
    }

    pub fn active(&self) -> &Arc<dyn EntityRepository<T>> {
        &self.pair.active
    }

    pub fn kind(&self) -> ArchiveKind {
        T::KIND
    }

    pub async fn list_active(&self) -> Result<Vec<T>> {
        self.pair.active.list().await
    }

    pub async fn list_archived(&self) -> Result<Vec<T>> {
        self.pair.archived.list().await
    }

    /// Create a record and log it
    pub async fn create(&self, actor: &Actor, item: T) -> Result<T> {
        let stored = self.insert_new(item).await?;
        self.activity
            .record(
                actor,
                format!("Created {} ({})", T::KIND.noun(), stored.display_name()),
            )
            .await;
        Ok(stored)
    }

    /// Insert a new active record without logging it.
    ///
    /// The business id must be unused in both collections and the secondary
    /// field unused among active records.
    pub async fn insert_new(&self, item: T) -> Result<T> {
        let id = item.business_id().to_string();

        if self.pair.archived.find_by_business_id(&id).await?.is_some() {
            return Err(MarketError::Conflict(format!(
                "{} with this ID exists in the archive",
                T::KIND.title()
            )));
        }
        self.ensure_active_free(&item).await?;

        let oid = self.pair.active.insert(item).await?;
        info!(kind = T::KIND.noun(), id = %id, "Record created");

        self.pair
            .active
            .find_by_object_id(&oid)
            .await?
            .ok_or_else(|| MarketError::Database(format!("{} vanished after insert", id)))
    }

    /// Move an active record into the archive
    pub async fn archive(&self, actor: &Actor, id: &str) -> Result<T> {
        let record = self
            .pair
            .active
            .find_by_business_id(id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("{} not found", T::KIND.title())))?;

        self.transfer(&record, &self.pair.active, &self.pair.archived)
            .await?;

        info!(kind = T::KIND.noun(), id = %id, "Record archived");
        self.activity
            .record(
                actor,
                format!("Archived {} ({})", T::KIND.noun(), record.display_name()),
            )
            .await;
        Ok(record)
    }

    /// Move an archived record back into the active collection
    pub async fn restore(&self, actor: &Actor, id: &str) -> Result<T> {
        let record = self
            .pair
            .archived
            .find_by_business_id(id)
            .await?
            .ok_or_else(|| {
                MarketError::NotFound(format!("Archived {} not found", T::KIND.noun()))
            })?;

        self.ensure_active_free(&record).await?;
        self.transfer(&record, &self.pair.archived, &self.pair.active)
            .await?;

        info!(kind = T::KIND.noun(), id = %id, "Record restored");
        self.activity
            .record(
                actor,
                format!("Restored {} ({})", T::KIND.noun(), record.display_name()),
            )
            .await;
        Ok(record)
    }

    async fn ensure_active_free(&self, item: &T) -> Result<()> {
        let title = T::KIND.title();

        if self
            .pair
            .active
            .find_by_business_id(item.business_id())
            .await?
            .is_some()
        {
            return Err(MarketError::Conflict(format!(
                "{} with this ID already exists",
                title
            )));
        }

        if let Some((field, value)) = item.unique_field() {
            if self.pair.active.find_by_field(field, value).await?.is_some() {
                return Err(MarketError::Conflict(format!(
                    "{} with this {} already exists",
                    title,
                    T::unique_label()
                )));
            }
        }

        Ok(())
    }

    /// Copy `record` into `to`, then remove it from `from`.
    ///
    /// The copy is only undone once the source is known to still hold the
    /// record. A delete may commit even though it reports an error.
    async fn transfer(
        &self,
        record: &T,
        from: &Arc<dyn EntityRepository<T>>,
        to: &Arc<dyn EntityRepository<T>>,
    ) -> Result<()> {
        let id = record.business_id();
        let mut copy = record.clone();
        copy.clear_object_id();

        to.insert(copy).await?;

        let failure = match from.delete_by_business_id(id).await {
            Ok(true) => return Ok(()),
            // Someone else moved it between our read and delete
            Ok(false) => MarketError::Conflict(format!(
                "{} was modified concurrently, please retry",
                T::KIND.title()
            )),
            Err(e) => match from.find_by_business_id(id).await {
                Ok(Some(_)) => e,
                Ok(None) => {
                    warn!(
                        kind = T::KIND.noun(),
                        id = %id,
                        error = %e,
                        "Delete reported an error but the source copy is gone; move completed"
                    );
                    return Ok(());
                }
                Err(recheck) => {
                    error!(
                        kind = T::KIND.noun(),
                        id = %id,
                        error = %recheck,
                        "Could not confirm delete; record may exist in both collections"
                    );
                    return Err(e);
                }
            },
        };

        if let Err(undo) = to.delete_by_business_id(id).await {
            error!(
                kind = T::KIND.noun(),
                id = %id,
                error = %undo,
                "Failed to undo copy; record exists in both collections"
            );
        }
        Err(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SubjectType;
    use crate::db::schemas::{AdminRole, AdminStatus};
    use crate::repository::memory::MemoryRepositories;
    use crate::repository::{ActivityRepository, Repositories};
    use bson::oid::ObjectId;

    struct Fixture {
        repos: Repositories,
        activity: Arc<dyn ActivityRepository>,
        actor: Actor,
    }

    async fn fixture() -> Fixture {
        let memory = MemoryRepositories::new();
        let activity: Arc<dyn ActivityRepository> = memory.activity.clone();
        let repos = memory.into_repositories();
        let actor_oid = repos
            .admins
            .active
            .insert(admin("ADM-0", "root@taytay.test", "Maria", "Clara"))
            .await
            .unwrap();
        Fixture {
            repos,
            activity,
            actor: Actor {
                id: actor_oid,
                kind: SubjectType::Admin,
            },
        }
    }

    fn logger(f: &Fixture) -> ActivityLogger {
        ActivityLogger::new(
            Arc::clone(&f.activity),
            Arc::clone(&f.repos.accounts),
            Arc::clone(&f.repos.admins.active),
        )
    }

    fn admin(id: &str, email: &str, first: &str, last: &str) -> AdminDoc {
        AdminDoc {
            oid: None,
            metadata: Default::default(),
            id: id.into(),
            email: email.into(),
            first_name: first.into(),
            middle_name: None,
            last_name: last.into(),
            password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            status: AdminStatus::Active,
            role: AdminRole::Admin,
        }
    }

    fn category(id: &str, label: &str) -> CategoryDoc {
        CategoryDoc {
            oid: None,
            metadata: Default::default(),
            id: id.into(),
            label: label.into(),
        }
    }

    #[tokio::test]
    async fn test_archive_restore_round_trip_keeps_admin_fields() {
        let f = fixture().await;
        let service = ArchiveService::new(f.repos.admins.clone(), logger(&f));

        let created = service
            .create(&f.actor, admin("ADM-7", "jose@taytay.test", "Jose", "Rizal"))
            .await
            .unwrap();

        service.archive(&f.actor, "ADM-7").await.unwrap();
        assert!(f
            .repos
            .admins
            .active
            .find_by_business_id("ADM-7")
            .await
            .unwrap()
            .is_none());
        let archived = service.list_archived().await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_ne!(archived[0].oid, created.oid);

        let restored = service.restore(&f.actor, "ADM-7").await.unwrap();
        assert_eq!(restored.password, created.password);
        assert!(service.list_archived().await.unwrap().is_empty());

        let active = f
            .repos
            .admins
            .active
            .find_by_business_id("ADM-7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.email, "jose@taytay.test");
        assert_eq!(active.password, created.password);
        assert_eq!(active.role, AdminRole::Admin);

        let actions: Vec<String> = f
            .activity
            .list_recent()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                "Restored admin (Jose Rizal)",
                "Archived admin (Jose Rizal)",
                "Created admin (Jose Rizal)",
            ]
        );
    }

    #[tokio::test]
    async fn test_activity_names_the_actor() {
        let f = fixture().await;
        let service = ArchiveService::new(f.repos.categories.clone(), logger(&f));
        service
            .create(&f.actor, category("CAT-1", "Ukay-ukay"))
            .await
            .unwrap();

        let entries = f.activity.list_recent().await.unwrap();
        assert_eq!(entries[0].username, "Maria Clara");
        assert_eq!(entries[0].action, "Created category (Ukay-ukay)");

        let ghost = Actor {
            id: ObjectId::new(),
            kind: SubjectType::Account,
        };
        service.archive(&ghost, "CAT-1").await.unwrap();
        let entries = f.activity.list_recent().await.unwrap();
        assert_eq!(entries[0].username, "Unknown User");
    }

    #[tokio::test]
    async fn test_restore_conflicts() {
        let f = fixture().await;
        let service = ArchiveService::new(f.repos.categories.clone(), logger(&f));

        service.create(&f.actor, category("CAT-1", "Shoes")).await.unwrap();
        service.archive(&f.actor, "CAT-1").await.unwrap();

        // Same label taken while archived
        service.create(&f.actor, category("CAT-2", "Shoes")).await.unwrap();
        let err = service.restore(&f.actor, "CAT-1").await.unwrap_err();
        assert!(matches!(err, MarketError::Conflict(ref m) if m == "Category with this label already exists"));

        // Same id reinserted behind our back
        f.repos
            .categories
            .active
            .insert(category("CAT-1", "Bags"))
            .await
            .unwrap();
        let err = service.restore(&f.actor, "CAT-1").await.unwrap_err();
        assert!(matches!(err, MarketError::Conflict(ref m) if m == "Category with this ID already exists"));

        // Archived record untouched by failed restores
        assert_eq!(service.list_archived().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_conflicts() {
        let f = fixture().await;
        let service = ArchiveService::new(f.repos.organizations.clone(), logger(&f));
        let org = |id: &str, name: &str| OrganizationDoc {
            oid: None,
            metadata: Default::default(),
            id: id.into(),
            organization_name: name.into(),
        };

        service
            .create(&f.actor, org("ORG-1", "Taytay Tiangge Vendors"))
            .await
            .unwrap();

        let err = service
            .create(&f.actor, org("ORG-1", "Other"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict(ref m) if m.contains("ID")));

        let err = service
            .create(&f.actor, org("ORG-2", "Taytay Tiangge Vendors"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict(ref m) if m.contains("name")));

        service.archive(&f.actor, "ORG-1").await.unwrap();
        let err = service
            .create(&f.actor, org("ORG-1", "Fresh"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict(ref m) if m.contains("archive")));
    }

    #[tokio::test]
    async fn test_missing_records() {
        let f = fixture().await;
        let service = ArchiveService::new(f.repos.links.clone(), logger(&f));

        assert!(matches!(
            service.archive(&f.actor, "LNK-404").await,
            Err(MarketError::NotFound(_))
        ));
        assert!(matches!(
            service.restore(&f.actor, "LNK-404").await,
            Err(MarketError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_archived_records_may_share_a_label() {
        let f = fixture().await;
        let service = ArchiveService::new(f.repos.categories.clone(), logger(&f));

        service.create(&f.actor, category("CAT-1", "Shoes")).await.unwrap();
        service.archive(&f.actor, "CAT-1").await.unwrap();
        service.create(&f.actor, category("CAT-2", "Shoes")).await.unwrap();
        service.archive(&f.actor, "CAT-2").await.unwrap();
        assert_eq!(service.list_archived().await.unwrap().len(), 2);

        // Only one of them can be active again
        service.restore(&f.actor, "CAT-1").await.unwrap();
        let err = service.restore(&f.actor, "CAT-2").await.unwrap_err();
        assert!(matches!(err, MarketError::Conflict(ref m) if m == "Category with this label already exists"));
    }

    /// Delete that fails after (or instead of) removing the record
    struct FailingDelete<T: Record> {
        inner: Arc<dyn EntityRepository<T>>,
        commits: bool,
    }

    #[async_trait::async_trait]
    impl<T: Record> EntityRepository<T> for FailingDelete<T> {
        async fn list(&self) -> Result<Vec<T>> {
            self.inner.list().await
        }

        async fn find_by_business_id(&self, id: &str) -> Result<Option<T>> {
            self.inner.find_by_business_id(id).await
        }

        async fn find_by_object_id(&self, oid: &ObjectId) -> Result<Option<T>> {
            self.inner.find_by_object_id(oid).await
        }

        async fn find_by_field(&self, field: &str, value: &str) -> Result<Option<T>> {
            self.inner.find_by_field(field, value).await
        }

        async fn insert(&self, item: T) -> Result<ObjectId> {
            self.inner.insert(item).await
        }

        async fn delete_by_business_id(&self, id: &str) -> Result<bool> {
            if self.commits {
                self.inner.delete_by_business_id(id).await?;
            }
            Err(MarketError::Database("socket timeout".into()))
        }

        async fn set_fields(&self, id: &str, fields: bson::Document) -> Result<bool> {
            self.inner.set_fields(id, fields).await
        }
    }

    async fn flaky_categories(f: &Fixture, commits: bool) -> ArchiveService<CategoryDoc> {
        let pair = ArchivePair {
            active: Arc::new(FailingDelete {
                inner: Arc::clone(&f.repos.categories.active),
                commits,
            }) as Arc<dyn EntityRepository<CategoryDoc>>,
            archived: Arc::clone(&f.repos.categories.archived),
        };
        let service = ArchiveService::new(pair, logger(f));
        service.create(&f.actor, category("CAT-1", "Shoes")).await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_archive_completes_when_delete_commits_but_errors() {
        let f = fixture().await;
        let service = flaky_categories(&f, true).await;

        service.archive(&f.actor, "CAT-1").await.unwrap();

        let categories = &f.repos.categories;
        assert!(categories.active.find_by_business_id("CAT-1").await.unwrap().is_none());
        assert!(categories.archived.find_by_business_id("CAT-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_archive_undoes_copy_when_delete_fails() {
        let f = fixture().await;
        let service = flaky_categories(&f, false).await;

        let err = service.archive(&f.actor, "CAT-1").await.unwrap_err();
        assert!(matches!(err, MarketError::Database(ref m) if m == "socket timeout"));

        let categories = &f.repos.categories;
        assert!(categories.active.find_by_business_id("CAT-1").await.unwrap().is_some());
        assert!(categories.archived.find_by_business_id("CAT-1").await.unwrap().is_none());
    }

    #[test]
    fn test_route_segments() {
        for kind in ArchiveKind::ALL {
            assert_eq!(ArchiveKind::from_route_segment(kind.route_segment()), Some(kind));
        }
        assert_eq!(ArchiveKind::from_route_segment("stores"), None);
    }
}
