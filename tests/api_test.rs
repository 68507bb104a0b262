//! End-to-end API tests against in-memory storage

use bytes::Bytes;
use clap::Parser;
use http_body_util::BodyExt;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use hyper::{HeaderMap, Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

use taytay_market::auth::{hash_password, SessionIssuer, SubjectType};
use taytay_market::config::Args;
use taytay_market::db::schemas::{AdminDoc, AdminRole, AdminStatus, Metadata};
use taytay_market::repository::memory::MemoryRepositories;
use taytay_market::repository::{AccountRepository, EntityRepository, Repositories, StoreRepository};
use taytay_market::routes::dispatch;
use taytay_market::server::AppState;
use taytay_market::services::OutboxMailer;

const SELLER_FORM: &str = "firstName=Juan&lastName=Dela+Cruz&birthday=1990-06-12\
&contactNumber=09171234567&username=juandc&email=Juan%40Taytay.test\
&password=maganda123&storeName=JDC+Garments&stallNumbers=B-3%2C+B-4\
&permit=https%3A%2F%2Fcdn.taytay.test%2Fpermits%2Fjdc.pdf";

struct TestApp {
    state: Arc<AppState>,
    memory: MemoryRepositories,
    repos: Repositories,
    outbox: Arc<OutboxMailer>,
    admin_token: String,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestApp {
    async fn new() -> Self {
        let args = Args::parse_from(["taytay-market", "--dev-mode"]);
        let memory = MemoryRepositories::new();
        let repos = memory.clone().into_repositories();
        let outbox = Arc::new(OutboxMailer::new());
        let state = Arc::new(AppState::new(
            args,
            repos.clone(),
            outbox.clone(),
            SessionIssuer::new_dev(),
            "memory",
        ));

        let admin_id = repos
            .admins
            .active
            .insert(AdminDoc {
                oid: None,
                metadata: Metadata::new(),
                id: "ADM-1".into(),
                email: "root@taytay.test".into(),
                first_name: "Rosa".into(),
                middle_name: None,
                last_name: "Santos".into(),
                password: hash_password("admin-password-1").unwrap(),
                status: AdminStatus::Active,
                role: AdminRole::SuperAdmin,
            })
            .await
            .unwrap();
        let admin_token = state
            .auth
            .sessions()
            .issue(&admin_id.to_hex(), SubjectType::Admin)
            .unwrap();

        Self {
            state,
            memory,
            repos,
            outbox,
            admin_token,
        }
    }

    async fn send(&self, req: Request<Bytes>) -> Reply {
        let response = dispatch(Arc::clone(&self.state), req).await;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>, token: Option<&str>) -> Reply {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let bytes = match body {
            Some(body) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Bytes::from(body.to_string())
            }
            None => Bytes::new(),
        };
        self.send(builder.body(bytes).unwrap()).await
    }

    async fn admin(&self, method: Method, path: &str, body: Option<Value>) -> Reply {
        let token = self.admin_token.clone();
        self.call(method, path, body, Some(&token)).await
    }

    async fn register_seller(&self) -> Reply {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/auth/register")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Bytes::from_static(SELLER_FORM.as_bytes()))
            .unwrap();
        self.send(req).await
    }

    fn last_code(&self, email: &str) -> String {
        let html = self.outbox.last_to(email).unwrap().html;
        html.split("<strong>")
            .nth(1)
            .and_then(|rest| rest.split("</strong>").next())
            .unwrap()
            .to_string()
    }
}

#[tokio::test]
async fn test_seller_signup_review_and_two_step_login() {
    let app = TestApp::new().await;

    let reply = app.register_seller().await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let account = app
        .repos
        .accounts
        .find_by_email("juan@taytay.test")
        .await
        .unwrap()
        .unwrap();
    let account_id = account.oid.unwrap().to_hex();

    // Pending accounts are turned away at the password step
    let login = json!({"email": "juan@taytay.test", "password": "maganda123"});
    let reply = app.call(Method::POST, "/auth/login", Some(login.clone()), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["status"], "fail");

    let reply = app
        .admin(
            Method::PUT,
            &format!("/accounts/{}/status", account_id),
            Some(json!({"status": "verified"})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["data"]["isVerified"], true);

    let reply = app.call(Method::POST, "/auth/login", Some(login), None).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["data"]["userType"], "account");
    assert_eq!(reply.body["data"]["userId"], account_id);
    assert!(reply.body["data"]["user"].get("password").is_none());

    let reply = app
        .call(
            Method::POST,
            "/auth/send-verification",
            Some(json!({"email": "juan@taytay.test"})),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let code = app.last_code("juan@taytay.test");

    let reply = app
        .call(
            Method::POST,
            "/auth/verify-code",
            Some(json!({
                "code": code,
                "email": "juan@taytay.test",
                "userId": account_id,
                "userType": "account",
            })),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let cookie = reply
        .headers
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("authToken="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=None"));
    let session = cookie.split(';').next().unwrap().to_string();

    let req = Request::builder()
        .method(Method::GET)
        .uri("/auth/user")
        .header(COOKIE, session)
        .body(Bytes::new())
        .unwrap();
    let reply = app.send(req).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["data"]["user"]["email"], "juan@taytay.test");
    assert_eq!(reply.body["data"]["store"]["storeName"], "JDC Garments");
    assert_eq!(reply.body["data"]["store"]["stallNumbers"], json!(["B-3", "B-4"]));
    assert_eq!(reply.body["data"]["store"]["noOfProducts"], 0);

    let reply = app.call(Method::POST, "/auth/logout", None, None).await;
    let cleared = reply.headers.get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_wrong_codes_lock_the_email() {
    let app = TestApp::new().await;
    app.register_seller().await;
    let account = app
        .repos
        .accounts
        .find_by_email("juan@taytay.test")
        .await
        .unwrap()
        .unwrap();
    let account_id = account.oid.unwrap().to_hex();
    app.admin(
        Method::PUT,
        &format!("/accounts/{}/status", account_id),
        Some(json!({"status": "verified"})),
    )
    .await;

    app.call(
        Method::POST,
        "/auth/send-verification",
        Some(json!({"email": "juan@taytay.test"})),
        None,
    )
    .await;
    let code = app.last_code("juan@taytay.test");
    let wrong = if code == "123456" { "654321" } else { "123456" };

    let attempt = |code: String| {
        json!({
            "code": code,
            "email": "juan@taytay.test",
            "userId": account_id,
            "userType": "account",
        })
    };

    for _ in 0..3 {
        let reply = app
            .call(Method::POST, "/auth/verify-code", Some(attempt(wrong.to_string())), None)
            .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["message"], "Invalid or expired code");
    }

    let reply = app
        .call(Method::POST, "/auth/verify-code", Some(attempt(code)), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(reply.body["message"]
        .as_str()
        .unwrap()
        .starts_with("Too many failed attempts"));
    assert!(reply.headers.get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_register_twice_conflicts() {
    let app = TestApp::new().await;
    assert_eq!(app.register_seller().await.status, StatusCode::OK);

    let reply = app.register_seller().await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["message"], "Email already registered");

    // Nothing new written by the rejected attempt
    assert_eq!(app.memory.accounts.count().await, 1);
    assert_eq!(app.memory.stores.count().await, 1);
}

#[tokio::test]
async fn test_session_required_for_profile() {
    let app = TestApp::new().await;

    let reply = app.call(Method::GET, "/auth/user", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let mut tampered = app.admin_token.clone();
    tampered.push('x');
    let reply = app.call(Method::GET, "/auth/user", None, Some(&tampered)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = app.admin(Method::GET, "/auth/user", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["user"]["userType"], "admin");
}

#[tokio::test]
async fn test_category_archive_lifecycle() {
    let app = TestApp::new().await;
    let shirts = json!({"id": "CAT-1", "label": "Shirts"});

    let reply = app.admin(Method::POST, "/categories", Some(shirts.clone())).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let reply = app.admin(Method::POST, "/categories", Some(shirts.clone())).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = app
        .admin(
            Method::POST,
            "/categories",
            Some(json!({"id": "CAT-2", "label": "Shirts"})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["message"], "Category with this label already exists");

    let reply = app.admin(Method::DELETE, "/categories/CAT-1/archive", None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app.call(Method::GET, "/categories", None, None).await;
    assert_eq!(reply.body["data"], json!([]));

    let reply = app.admin(Method::POST, "/categories", Some(shirts)).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["message"], "Category with this ID exists in the archive");

    let reply = app.admin(Method::GET, "/archive-categories", None).await;
    assert_eq!(reply.body["data"][0]["id"], "CAT-1");

    let reply = app
        .admin(Method::POST, "/archive-categories/CAT-1/restore", None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app
        .admin(Method::POST, "/archive-categories/CAT-1/restore", None)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app.call(Method::GET, "/categories", None, None).await;
    assert_eq!(reply.body["data"][0]["label"], "Shirts");

    let reply = app.admin(Method::GET, "/activity-logs", None).await;
    let actions: Vec<&str> = reply.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert_eq!(
        actions,
        vec![
            "Restored category (Shirts)",
            "Archived category (Shirts)",
            "Created category (Shirts)",
        ]
    );
    assert_eq!(reply.body["data"][0]["username"], "Rosa Santos");
}

#[tokio::test]
async fn test_mutations_need_an_admin() {
    let app = TestApp::new().await;
    let body = json!({"id": "ORG-1", "organizationName": "Taytay Tiangge Vendors"});

    let reply = app.call(Method::POST, "/organizations", Some(body.clone()), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    app.register_seller().await;
    let account = app
        .repos
        .accounts
        .find_by_email("juan@taytay.test")
        .await
        .unwrap()
        .unwrap();
    let seller = app
        .state
        .auth
        .sessions()
        .issue(&account.oid.unwrap().to_hex(), SubjectType::Account)
        .unwrap();

    let reply = app
        .call(Method::POST, "/organizations", Some(body), Some(&seller))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app.call(Method::GET, "/admins", None, Some(&seller)).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_creation_and_deactivation() {
    let app = TestApp::new().await;

    let reply = app
        .admin(
            Method::POST,
            "/admins",
            Some(json!({
                "id": "ADM-2",
                "email": "andres@taytay.test",
                "firstName": "Andres",
                "lastName": "Bonifacio",
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert!(reply.body["data"].get("password").is_none());
    assert!(app.outbox.last_to("andres@taytay.test").is_some());

    let reply = app
        .admin(Method::PUT, "/admins/ADM-2/status", Some(json!({"status": "Inactive"})))
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["data"]["status"], "Inactive");

    let reply = app.admin(Method::GET, "/admins", None).await;
    assert_eq!(reply.body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_store_update_reconciles_links() {
    let app = TestApp::new().await;

    let reply = app
        .admin(
            Method::POST,
            "/links",
            Some(json!({"id": "LNK-1", "label": "Shopee", "link": "https://cdn.taytay.test/shopee.png"})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let shopee = app
        .repos
        .links
        .active
        .find_by_business_id("LNK-1")
        .await
        .unwrap()
        .unwrap()
        .oid
        .unwrap()
        .to_hex();

    app.register_seller().await;
    let owner = app
        .repos
        .accounts
        .find_by_email("juan@taytay.test")
        .await
        .unwrap()
        .unwrap()
        .oid
        .unwrap();
    let store = app
        .repos
        .stores
        .find_by_owner(&owner)
        .await
        .unwrap()
        .unwrap()
        .oid
        .unwrap()
        .to_hex();
    let seller = app
        .state
        .auth
        .sessions()
        .issue(&owner.to_hex(), SubjectType::Account)
        .unwrap();
    let path = format!("/stores/{}", store);

    let reply = app
        .call(
            Method::PUT,
            &path,
            Some(json!({
                "description": "Denim and shirts",
                "linkedAccounts": [{"platform": shopee, "url": "https://shopee.ph/jdc"}],
            })),
            Some(&seller),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["data"]["description"], "Denim and shirts");
    assert_eq!(reply.body["data"]["linkedAccounts"][0]["platformName"], "Shopee");

    // Same platform, new URL: updated in place
    let reply = app
        .call(
            Method::PUT,
            &path,
            Some(json!({"linkedAccounts": [{"platform": shopee, "url": "https://shopee.ph/jdc-official"}]})),
            Some(&seller),
        )
        .await;
    let links = reply.body["data"]["linkedAccounts"].as_array().unwrap().clone();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["url"], "https://shopee.ph/jdc-official");

    let reply = app
        .call(
            Method::PUT,
            &path,
            Some(json!({"linkedAccounts": [{"platform": shopee, "isDeleted": true}]})),
            Some(&seller),
        )
        .await;
    assert_eq!(reply.body["data"]["linkedAccounts"], json!([]));

    // Public view
    let reply = app.call(Method::GET, &path, None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["storeName"], "JDC Garments");

    // Someone else's store
    let stranger = app
        .state
        .auth
        .sessions()
        .issue(&bson::oid::ObjectId::new().to_hex(), SubjectType::Account)
        .unwrap();
    let reply = app
        .call(Method::PUT, &path, Some(json!({"description": "mine now"})), Some(&stranger))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_general_information_and_misc_routes() {
    let app = TestApp::new().await;

    let reply = app.call(Method::GET, "/general-information", None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app
        .admin(
            Method::PUT,
            "/general-information",
            Some(json!({"about": "Garment capital of the Philippines", "mrt": "Alight at Santolan"})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let reply = app.call(Method::GET, "/general-information", None, None).await;
    assert_eq!(reply.body["data"]["mrt"], "Alight at Santolan");

    let reply = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["storage"], "memory");

    let reply = app.call(Method::GET, "/nowhere", None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app.call(Method::PATCH, "/categories", None, None).await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[test]
fn test_router_runs_on_a_plain_runtime() {
    let app = tokio_test::block_on(TestApp::new());
    let reply = tokio_test::block_on(app.call(Method::GET, "/healthz", None, None));
    assert_eq!(reply.status, StatusCode::OK);
}
