//! Archive/restore routes
//!
//! Every archivable kind gets the same five routes:
//! - GET    /{kind}                       - Active records (admin roster needs an admin)
//! - POST   /{kind}                       - Create (admin)
//! - DELETE /{kind}/:id/archive           - Move to the archive (admin)
//! - GET    /archive-{kind}               - Archived records (admin)
//! - POST   /archive-{kind}/:id/restore   - Move back (admin)
//!
//! Admins additionally have `PUT /admins/:id/status`.

use bytes::Bytes;
use hyper::{Method, Request, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

use super::common::{
    method_not_allowed, ok_with, parse_json_body, render, require_admin, BoxBody,
    RouteResult,
};
use crate::db::schemas::{
    AdminDoc, AdminStatus, CategoryDoc, LinkDoc, Metadata, OrganizationDoc, ProductTypeDoc,
};
use crate::server::AppState;
use crate::services::{is_https_url, AdminView, ArchiveKind, ArchiveService, Archivable, NewAdmin};
use crate::types::{MarketError, Result};

/// Request body that becomes a new record of some kind
pub trait NewRecord: DeserializeOwned {
    type Doc: Archivable;

    fn into_doc(self) -> Result<Self::Doc>;
}

fn required(value: String, field: &str, errors: &mut Vec<String>) -> String {
    let value = value.trim().to_string();
    if value.is_empty() {
        errors.push(format!("{} is required", field));
    }
    value
}

fn finish<T>(errors: Vec<String>, doc: T) -> Result<T> {
    if errors.is_empty() {
        Ok(doc)
    } else {
        Err(MarketError::Validation(errors.join(", ")))
    }
}

#[derive(Debug, Deserialize)]
pub struct LabelInput {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationInput {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub organization_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkInput {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Logo URL
    #[serde(default)]
    pub link: String,
}

/// Categories and product types share the `{id, label}` shape
#[derive(Debug, Deserialize)]
pub struct CategoryInput(LabelInput);

#[derive(Debug, Deserialize)]
pub struct ProductTypeInput(LabelInput);

impl NewRecord for CategoryInput {
    type Doc = CategoryDoc;

    fn into_doc(self) -> Result<CategoryDoc> {
        let mut errors = Vec::new();
        let doc = CategoryDoc {
            oid: None,
            metadata: Metadata::new(),
            id: required(self.0.id, "id", &mut errors),
            label: required(self.0.label, "label", &mut errors),
        };
        finish(errors, doc)
    }
}

impl NewRecord for ProductTypeInput {
    type Doc = ProductTypeDoc;

    fn into_doc(self) -> Result<ProductTypeDoc> {
        let mut errors = Vec::new();
        let doc = ProductTypeDoc {
            oid: None,
            metadata: Metadata::new(),
            id: required(self.0.id, "id", &mut errors),
            label: required(self.0.label, "label", &mut errors),
        };
        finish(errors, doc)
    }
}

impl NewRecord for OrganizationInput {
    type Doc = OrganizationDoc;

    fn into_doc(self) -> Result<OrganizationDoc> {
        let mut errors = Vec::new();
        let doc = OrganizationDoc {
            oid: None,
            metadata: Metadata::new(),
            id: required(self.id, "id", &mut errors),
            organization_name: required(self.organization_name, "organizationName", &mut errors),
        };
        finish(errors, doc)
    }
}

impl NewRecord for LinkInput {
    type Doc = LinkDoc;

    fn into_doc(self) -> Result<LinkDoc> {
        let mut errors = Vec::new();
        let link = self.link.trim().to_string();
        if !is_https_url(&link) {
            errors.push("link must be an https URL".to_string());
        }
        let doc = LinkDoc {
            oid: None,
            metadata: Metadata::new(),
            id: required(self.id, "id", &mut errors),
            label: required(self.label, "label", &mut errors),
            link,
        };
        finish(errors, doc)
    }
}

/// How records of a kind are shown to clients
pub trait Presentable {
    type View: Serialize;

    fn present(&self) -> Self::View;
}

macro_rules! present_as_is {
    ($($doc:ty),*) => {
        $(
            impl Presentable for $doc {
                type View = $doc;

                fn present(&self) -> $doc {
                    self.clone()
                }
            }
        )*
    };
}

present_as_is!(CategoryDoc, OrganizationDoc, ProductTypeDoc, LinkDoc);

impl Presentable for AdminDoc {
    type View = AdminView;

    fn present(&self) -> AdminView {
        AdminView::from(self)
    }
}

fn present_all<T: Presentable>(items: &[T]) -> Vec<T::View> {
    items.iter().map(Presentable::present).collect()
}

async fn handle_list<T: Archivable + Presentable>(
    req: &Request<Bytes>,
    state: &AppState,
    service: &ArchiveService<T>,
) -> RouteResult {
    // Taxonomies are public, the admin roster is not
    if service.kind() == ArchiveKind::Admin {
        require_admin(req, state)?;
    }
    let items = service.list_active().await?;
    ok_with(
        &format!("{} retrieved", service.kind().title()),
        present_all(&items),
    )
}

async fn handle_list_archived<T: Archivable + Presentable>(
    req: &Request<Bytes>,
    state: &AppState,
    service: &ArchiveService<T>,
) -> RouteResult {
    require_admin(req, state)?;
    let items = service.list_archived().await?;
    ok_with(
        &format!("Archived {} retrieved", service.kind().noun()),
        present_all(&items),
    )
}

async fn handle_create<I>(
    req: &Request<Bytes>,
    state: &AppState,
    service: &ArchiveService<I::Doc>,
) -> RouteResult
where
    I: NewRecord,
    I::Doc: Presentable,
{
    let actor = require_admin(req, state)?;
    let input: I = parse_json_body(req)?;
    let created = service.create(&actor, input.into_doc()?).await?;
    ok_with(
        &format!("{} created", service.kind().title()),
        created.present(),
    )
}

async fn handle_archive<T: Archivable + Presentable>(
    req: &Request<Bytes>,
    state: &AppState,
    service: &ArchiveService<T>,
    id: &str,
) -> RouteResult {
    let actor = require_admin(req, state)?;
    let archived = service.archive(&actor, id).await?;
    ok_with(
        &format!("{} archived", service.kind().title()),
        archived.present(),
    )
}

async fn handle_restore<T: Archivable + Presentable>(
    req: &Request<Bytes>,
    state: &AppState,
    service: &ArchiveService<T>,
    id: &str,
) -> RouteResult {
    let actor = require_admin(req, state)?;
    let restored = service.restore(&actor, id).await?;
    ok_with(
        &format!("{} restored", service.kind().title()),
        restored.present(),
    )
}

async fn handle_create_admin(req: &Request<Bytes>, state: &AppState) -> RouteResult {
    let actor = require_admin(req, state)?;
    let input: NewAdmin = parse_json_body(req)?;
    let admin = state.admins.create(&actor, input).await?;
    ok_with("Admin created", AdminView::from(&admin))
}

#[derive(Debug, Deserialize)]
struct AdminStatusRequest {
    status: AdminStatus,
}

async fn handle_admin_status(req: &Request<Bytes>, state: &AppState, id: &str) -> RouteResult {
    let actor = require_admin(req, state)?;
    let body: AdminStatusRequest = parse_json_body(req)?;
    let admin = state.admins.set_status(&actor, id, body.status).await?;
    ok_with("Admin status updated", AdminView::from(&admin))
}

/// Routes that work the same for every kind
enum Lifecycle<'a> {
    List,
    Archive(&'a str),
    ListArchived,
    Restore(&'a str),
}

enum ArchiveRoute<'a> {
    Create,
    Lifecycle(Lifecycle<'a>),
    AdminStatus(&'a str),
    MethodNotAllowed,
}

fn match_route<'a>(
    kind: ArchiveKind,
    archived: bool,
    method: &Method,
    segments: &[&'a str],
) -> Option<ArchiveRoute<'a>> {
    let route = match (archived, segments) {
        (false, [_]) if *method == Method::GET => ArchiveRoute::Lifecycle(Lifecycle::List),
        (false, [_]) if *method == Method::POST => ArchiveRoute::Create,
        (false, [_, id, "archive"]) if *method == Method::DELETE => {
            ArchiveRoute::Lifecycle(Lifecycle::Archive(id))
        }
        (false, [_, id, "status"]) if kind == ArchiveKind::Admin && *method == Method::PUT => {
            ArchiveRoute::AdminStatus(id)
        }
        (true, [_]) if *method == Method::GET => ArchiveRoute::Lifecycle(Lifecycle::ListArchived),
        (true, [_, id, "restore"]) if *method == Method::POST => {
            ArchiveRoute::Lifecycle(Lifecycle::Restore(id))
        }
        (false, [_]) | (false, [_, _, "archive"]) | (true, [_]) | (true, [_, _, "restore"]) => {
            ArchiveRoute::MethodNotAllowed
        }
        (false, [_, _, "status"]) if kind == ArchiveKind::Admin => ArchiveRoute::MethodNotAllowed,
        _ => return None,
    };
    Some(route)
}

async fn run<T: Archivable + Presentable>(
    lifecycle: Lifecycle<'_>,
    req: &Request<Bytes>,
    state: &AppState,
    service: &ArchiveService<T>,
) -> RouteResult {
    match lifecycle {
        Lifecycle::List => handle_list(req, state, service).await,
        Lifecycle::Archive(id) => handle_archive(req, state, service, id).await,
        Lifecycle::ListArchived => handle_list_archived(req, state, service).await,
        Lifecycle::Restore(id) => handle_restore(req, state, service, id).await,
    }
}

/// Handle archive routes. Returns `None` when the path is not one of them.
pub async fn handle_archive_request(
    req: &Request<Bytes>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let segments: Vec<&str> = req.uri().path().trim_matches('/').split('/').collect();
    let first = *segments.first()?;

    let (kind, archived) = match first.strip_prefix("archive-") {
        Some(rest) => (ArchiveKind::from_route_segment(rest)?, true),
        None => (ArchiveKind::from_route_segment(first)?, false),
    };

    let state = state.as_ref();
    let result = match match_route(kind, archived, req.method(), &segments)? {
        ArchiveRoute::MethodNotAllowed => return Some(method_not_allowed()),
        ArchiveRoute::AdminStatus(id) => handle_admin_status(req, state, id).await,
        ArchiveRoute::Create => match kind {
            ArchiveKind::Admin => handle_create_admin(req, state).await,
            ArchiveKind::Category => {
                handle_create::<CategoryInput>(req, state, &state.categories).await
            }
            ArchiveKind::Organization => {
                handle_create::<OrganizationInput>(req, state, &state.organizations).await
            }
            ArchiveKind::ProductType => {
                handle_create::<ProductTypeInput>(req, state, &state.product_types).await
            }
            ArchiveKind::Link => handle_create::<LinkInput>(req, state, &state.links).await,
        },
        ArchiveRoute::Lifecycle(lifecycle) => match kind {
            ArchiveKind::Admin => run(lifecycle, req, state, state.admins.archive()).await,
            ArchiveKind::Category => run(lifecycle, req, state, &state.categories).await,
            ArchiveKind::Organization => run(lifecycle, req, state, &state.organizations).await,
            ArchiveKind::ProductType => run(lifecycle, req, state, &state.product_types).await,
            ArchiveKind::Link => run(lifecycle, req, state, &state.links).await,
        },
    };

    Some(render(result, state.args.expose_error_details()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_matching() {
        let route = match_route(ArchiveKind::Category, false, &Method::DELETE, &["categories", "CAT-1", "archive"]);
        assert!(matches!(route, Some(ArchiveRoute::Lifecycle(Lifecycle::Archive("CAT-1")))));

        let route = match_route(ArchiveKind::Link, true, &Method::POST, &["archive-links", "LNK-1", "restore"]);
        assert!(matches!(route, Some(ArchiveRoute::Lifecycle(Lifecycle::Restore("LNK-1")))));

        let route = match_route(ArchiveKind::Admin, false, &Method::PUT, &["admins", "ADM-1", "status"]);
        assert!(matches!(route, Some(ArchiveRoute::AdminStatus("ADM-1"))));

        let route = match_route(ArchiveKind::Category, false, &Method::PUT, &["categories", "CAT-1", "status"]);
        assert!(route.is_none());

        let route = match_route(ArchiveKind::Category, false, &Method::PATCH, &["categories"]);
        assert!(matches!(route, Some(ArchiveRoute::MethodNotAllowed)));
    }

    #[test]
    fn test_link_input_requires_https_logo() {
        let input = LinkInput {
            id: "LNK-1".into(),
            label: "Shopee".into(),
            link: "http://cdn.test/shopee.png".into(),
        };
        assert!(matches!(input.into_doc(), Err(MarketError::Validation(_))));
    }

    #[test]
    fn test_admin_view_hides_password() {
        let admin = AdminDoc {
            oid: None,
            metadata: Metadata::new(),
            id: "ADM-1".into(),
            email: "root@taytay.test".into(),
            first_name: "Root".into(),
            middle_name: None,
            last_name: "Admin".into(),
            password: "$argon2id$secret".into(),
            status: AdminStatus::Active,
            role: Default::default(),
        };
        let json = serde_json::to_value(admin.present()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["id"], "ADM-1");
    }
}
