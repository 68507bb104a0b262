//! HTTP server and shared application state

pub mod http;

use std::sync::Arc;
use std::time::Instant;

use crate::auth::SessionIssuer;
use crate::config::Args;
use crate::db::schemas::{CategoryDoc, LinkDoc, OrganizationDoc, ProductTypeDoc};
use crate::repository::Repositories;
use crate::services::{
    AccountService, ActivityLogger, AdminService, ArchiveService, AuthService, GeneralInfoService,
    Mailer, StoreService,
};

pub use http::run;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub auth: AuthService,
    pub accounts: AccountService,
    pub admins: AdminService,
    pub categories: ArchiveService<CategoryDoc>,
    pub organizations: ArchiveService<OrganizationDoc>,
    pub product_types: ArchiveService<ProductTypeDoc>,
    pub links: ArchiveService<LinkDoc>,
    pub stores: StoreService,
    pub activity: ActivityLogger,
    pub general_info: GeneralInfoService,
    /// `mongodb` or `memory`
    pub storage: &'static str,
    pub started_at: Instant,
}

impl AppState {
    /// Wire every service onto one set of repositories
    pub fn new(
        args: Args,
        repos: Repositories,
        mailer: Arc<dyn Mailer>,
        sessions: SessionIssuer,
        storage: &'static str,
    ) -> Self {
        let activity = ActivityLogger::new(
            repos.activity.clone(),
            repos.accounts.clone(),
            repos.admins.active.clone(),
        );

        let stores = StoreService::new(
            repos.stores.clone(),
            repos.links.active.clone(),
            repos.organizations.active.clone(),
            activity.clone(),
        );

        let auth = AuthService::new(
            repos.accounts.clone(),
            repos.admins.active.clone(),
            repos.verifications.clone(),
            stores.clone(),
            Arc::clone(&mailer),
            sessions,
        );

        let admins = AdminService::new(
            ArchiveService::new(repos.admins.clone(), activity.clone()),
            repos.accounts.clone(),
            mailer,
            activity.clone(),
        );

        Self {
            args,
            auth,
            accounts: AccountService::new(repos.accounts.clone(), activity.clone()),
            admins,
            categories: ArchiveService::new(repos.categories.clone(), activity.clone()),
            organizations: ArchiveService::new(repos.organizations.clone(), activity.clone()),
            product_types: ArchiveService::new(repos.product_types.clone(), activity.clone()),
            links: ArchiveService::new(repos.links.clone(), activity.clone()),
            stores,
            general_info: GeneralInfoService::new(repos.general_info.clone(), activity.clone()),
            activity,
            storage,
            started_at: Instant::now(),
        }
    }
}
