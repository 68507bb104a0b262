//! Authentication orchestration
//!
//! Login is two steps. `login` checks the password and the status gate and
//! tells the client who it is talking to. The client then asks for an
//! emailed one-time code (`send_verification`) and trades it for a session
//! token (`login_verification`).
//!
//! Per email the ledger moves through:
//!
//! ```text
//! NO_CODE --send--> CODE_ACTIVE --correct code--> VERIFIED
//!                   CODE_ACTIVE --wrong/expired--> CODE_ACTIVE (attempts + 1)
//!                   CODE_ACTIVE --third failure--> LOCKED (1 hour)
//!                   LOCKED --lock elapsed--> NO_CODE
//! ```

use bson::oid::ObjectId;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    is_https_url, is_valid_email, mailer::Mailer, normalize_email, stores::StoreService, Actor,
    OutgoingMail, StoreProfile,
};
use crate::auth::{
    generate_code, hash_password, verify_password, SessionIssuer, SubjectType,
};
use crate::db::schemas::{
    code_ttl, lockout_message, AccountDoc, AccountStatus, AdminDoc, AdminRole, AdminStatus,
    Metadata, StoreDoc,
};
use crate::repository::{AccountRepository, EntityRepository, VerificationLedger};
use crate::types::{MarketError, Result};

const MIN_PASSWORD_LEN: usize = 8;

/// A resolved credential holder
#[derive(Debug, Clone)]
pub enum Principal {
    Admin(AdminDoc),
    Account(AccountDoc),
}

impl Principal {
    pub fn kind(&self) -> SubjectType {
        match self {
            Self::Admin(_) => SubjectType::Admin,
            Self::Account(_) => SubjectType::Account,
        }
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::Admin(a) => a.oid,
            Self::Account(a) => a.oid,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Self::Admin(a) => &a.email,
            Self::Account(a) => &a.email,
        }
    }

    fn password_hash(&self) -> &str {
        match self {
            Self::Admin(a) => &a.password,
            Self::Account(a) => &a.password,
        }
    }

    /// Reject principals whose status does not allow a session
    pub fn check_status(&self) -> Result<()> {
        match self {
            Self::Admin(admin) if admin.status == AdminStatus::Inactive => Err(
                MarketError::Forbidden("Your admin account is inactive. Contact a super admin.".into()),
            ),
            Self::Account(account) => match account.status {
                AccountStatus::Pending => Err(MarketError::Forbidden(
                    "Your account is not verified yet. Please wait for an admin to review your store."
                        .into(),
                )),
                AccountStatus::Blocked => Err(MarketError::Forbidden(
                    "Your account has been blocked. Contact support.".into(),
                )),
                AccountStatus::Verified => Ok(()),
            },
            Self::Admin(_) => Ok(()),
        }
    }

    /// Projection without the password hash
    pub fn public(&self) -> PublicPrincipal {
        let oid = self.object_id().map(|o| o.to_hex()).unwrap_or_default();
        match self {
            Self::Admin(a) => PublicPrincipal::Admin(AdminView::from(a)),
            Self::Account(a) => PublicPrincipal::Account(AccountView {
                oid,
                first_name: a.first_name.clone(),
                middle_name: a.middle_name.clone(),
                last_name: a.last_name.clone(),
                birthday: a.birthday,
                contact_number: a.contact_number.clone(),
                address: a.address.clone(),
                username: a.username.clone(),
                email: a.email.clone(),
                status: a.status,
                is_verified: a.is_verified,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminView {
    #[serde(rename = "_id")]
    pub oid: String,
    pub id: String,
    pub email: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub status: AdminStatus,
    pub role: AdminRole,
}

impl From<&AdminDoc> for AdminView {
    fn from(a: &AdminDoc) -> Self {
        Self {
            oid: a.oid.map(|o| o.to_hex()).unwrap_or_default(),
            id: a.id.clone(),
            email: a.email.clone(),
            first_name: a.first_name.clone(),
            middle_name: a.middle_name.clone(),
            last_name: a.last_name.clone(),
            status: a.status,
            role: a.role,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    #[serde(rename = "_id")]
    pub oid: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub birthday: NaiveDate,
    pub contact_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub username: String,
    pub email: String,
    pub status: AccountStatus,
    pub is_verified: bool,
}

/// Principal as shown to clients, tagged with `userType`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "userType", rename_all = "lowercase")]
pub enum PublicPrincipal {
    Admin(AdminView),
    Account(AccountView),
}

/// Result of the password step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub user: PublicPrincipal,
    pub user_type: SubjectType,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

/// Result of the code step
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub token: String,
    pub user_type: SubjectType,
    pub user_id: String,
}

/// The logged-in principal with their store, if any
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user: PublicPrincipal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreProfile>,
}

/// Stall numbers arrive as a list in JSON and as a comma-separated string in forms
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StallNumbers {
    Many(Vec<String>),
    One(String),
}

impl StallNumbers {
    fn into_vec(self) -> Vec<String> {
        let raw = match self {
            Self::Many(items) => items,
            Self::One(joined) => joined.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Seller sign-up: account fields plus the store it will own
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    /// `YYYY-MM-DD`
    pub birthday: String,
    pub contact_number: String,
    #[serde(default)]
    pub address: Option<String>,
    pub username: String,
    pub email: String,
    pub password: String,

    pub store_name: String,
    pub stall_numbers: StallNumbers,
    /// URL of the uploaded business permit
    pub permit: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_contact_number(raw: &str) -> bool {
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    (10..=13).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    admins: Arc<dyn EntityRepository<AdminDoc>>,
    ledger: Arc<dyn VerificationLedger>,
    stores: StoreService,
    mailer: Arc<dyn Mailer>,
    sessions: SessionIssuer,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        admins: Arc<dyn EntityRepository<AdminDoc>>,
        ledger: Arc<dyn VerificationLedger>,
        stores: StoreService,
        mailer: Arc<dyn Mailer>,
        sessions: SessionIssuer,
    ) -> Self {
        Self {
            accounts,
            admins,
            ledger,
            stores,
            mailer,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Look up by email, admins first
    pub async fn find_principal_by_email(&self, email: &str) -> Result<Option<Principal>> {
        if let Some(admin) = self.admins.find_by_field("email", email).await? {
            return Ok(Some(Principal::Admin(admin)));
        }
        Ok(self
            .accounts
            .find_by_email(email)
            .await?
            .map(Principal::Account))
    }

    pub async fn find_principal(&self, kind: SubjectType, id: &ObjectId) -> Result<Option<Principal>> {
        Ok(match kind {
            SubjectType::Admin => self.admins.find_by_object_id(id).await?.map(Principal::Admin),
            SubjectType::Account => self.accounts.find_by_id(id).await?.map(Principal::Account),
        })
    }

    async fn ensure_unlocked(&self, email: &str) -> Result<()> {
        if let Some(record) = self.ledger.find(email).await? {
            if let Some(minutes) = record.lock_remaining_minutes(Utc::now()) {
                warn!(email = %email, minutes, "Rejected request for locked email");
                return Err(MarketError::Forbidden(lockout_message(minutes)));
            }
        }
        Ok(())
    }

    /// Password step
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(MarketError::Validation(
                "email and password are required".into(),
            ));
        }

        let principal = self
            .find_principal_by_email(&email)
            .await?
            .ok_or_else(|| MarketError::NotFound("No account found on that email".into()))?;

        if !verify_password(password, principal.password_hash())? {
            warn!(email = %email, "Login failed - invalid password");
            return Err(MarketError::Unauthorized("Invalid credentials".into()));
        }

        principal.check_status()?;
        self.ensure_unlocked(&email).await?;

        let user_id = principal
            .object_id()
            .map(|o| o.to_hex())
            .ok_or_else(|| MarketError::Internal("Principal without id".into()))?;

        let store = match &principal {
            Principal::Account(account) => match account.oid {
                Some(oid) => self
                    .stores
                    .find_by_owner(&oid)
                    .await?
                    .and_then(|s| s.oid)
                    .map(|s| s.to_hex()),
                None => None,
            },
            Principal::Admin(_) => None,
        };

        info!(email = %email, kind = %principal.kind(), "Password accepted, awaiting code");
        Ok(LoginOutcome {
            user: principal.public(),
            user_type: principal.kind(),
            user_id,
            store,
        })
    }

    /// Issue and mail a fresh code, replacing any outstanding one
    pub async fn send_verification(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(MarketError::Validation("A valid email is required".into()));
        }

        if self.find_principal_by_email(&email).await?.is_none() {
            return Err(MarketError::NotFound("No account found on that email".into()));
        }
        self.ensure_unlocked(&email).await?;

        let code = generate_code();
        let expires_at = Utc::now() + code_ttl();
        self.ledger
            .issue_code(&email, hash_password(&code)?, expires_at)
            .await?;

        self.mailer
            .send(OutgoingMail::verification_code(&email, &code))
            .await?;

        info!(email = %email, "Verification code sent");
        Ok(())
    }

    /// Code step: trade a valid code for a session token
    pub async fn login_verification(
        &self,
        code: &str,
        email: &str,
        user_id: &str,
        user_type: SubjectType,
    ) -> Result<SessionGrant> {
        let email = normalize_email(email);
        let code = code.trim();
        let now = Utc::now();

        let record = self.ledger.find(&email).await?.ok_or_else(|| {
            MarketError::NotFound("No verification request found for this email".into())
        })?;

        if let Some(minutes) = record.lock_remaining_minutes(now) {
            warn!(email = %email, minutes, "Verification attempt on locked email");
            return Err(MarketError::Forbidden(lockout_message(minutes)));
        }

        let mismatch = || MarketError::Unauthorized("Verification does not match this account".into());
        let oid = ObjectId::parse_str(user_id.trim()).map_err(|_| mismatch())?;
        let principal = self
            .find_principal(user_type, &oid)
            .await?
            .filter(|p| p.email() == email)
            .ok_or_else(mismatch)?;
        principal.check_status()?;

        let matches = match (&record.verification_code, record.has_live_code(now)) {
            (Some(hash), true) => verify_password(code, hash)?,
            _ => false,
        };

        if !matches {
            let after = self.ledger.record_failure(&email, now).await?;
            if after.lock_until.is_some() {
                warn!(email = %email, "Too many failed codes, email locked");
            } else {
                warn!(email = %email, attempts = after.failed_attempts, "Invalid verification code");
            }
            return Err(MarketError::BadRequest("Invalid or expired code".into()));
        }

        self.ledger.record_success(&email).await?;
        let user_id = oid.to_hex();
        let token = self.sessions.issue(&user_id, user_type)?;

        info!(email = %email, kind = %user_type, "Session issued");
        Ok(SessionGrant {
            token,
            user_type,
            user_id,
        })
    }

    /// Create a pending account and its store
    pub async fn register(&self, input: RegisterInput) -> Result<ObjectId> {
        let email = normalize_email(&input.email);
        let stall_numbers = input.stall_numbers.clone().into_vec();

        let mut errors = Vec::new();
        if input.first_name.trim().is_empty() {
            errors.push("firstName is required");
        }
        if input.last_name.trim().is_empty() {
            errors.push("lastName is required");
        }
        if input.username.trim().is_empty() {
            errors.push("username is required");
        }
        if !is_valid_email(&email) {
            errors.push("email must be a valid email address");
        }
        if input.password.len() < MIN_PASSWORD_LEN {
            errors.push("password must be at least 8 characters");
        }
        let birthday = NaiveDate::parse_from_str(input.birthday.trim(), "%Y-%m-%d").ok();
        if birthday.is_none() {
            errors.push("birthday must be a YYYY-MM-DD date");
        }
        if !is_contact_number(input.contact_number.trim()) {
            errors.push("contactNumber must be 10 to 13 digits");
        }
        if input.store_name.trim().is_empty() {
            errors.push("storeName is required");
        }
        if stall_numbers.is_empty() {
            errors.push("stallNumbers must list at least one stall");
        }
        if !is_https_url(input.permit.trim()) {
            errors.push("permit must be an https URL");
        }
        let birthday = match birthday {
            Some(b) if errors.is_empty() => b,
            _ => return Err(MarketError::Validation(errors.join(", "))),
        };

        if self.find_principal_by_email(&email).await?.is_some() {
            return Err(MarketError::Conflict("Email already registered".into()));
        }

        let organization = match optional(input.organization) {
            Some(raw) => Some(self.stores.resolve_organization(&raw).await?),
            None => None,
        };

        let contact_number = input.contact_number.trim().to_string();
        let account = AccountDoc {
            oid: None,
            metadata: Metadata::new(),
            first_name: input.first_name.trim().to_string(),
            middle_name: optional(input.middle_name),
            last_name: input.last_name.trim().to_string(),
            birthday,
            contact_number: contact_number.clone(),
            address: optional(input.address),
            username: input.username.trim().to_string(),
            email: email.clone(),
            password: hash_password(&input.password)?,
            status: AccountStatus::Pending,
            is_verified: false,
        };

        let account_id = self.accounts.insert(account).await?;

        let store = StoreDoc {
            oid: None,
            metadata: Metadata::new(),
            owner: account_id,
            store_name: input.store_name.trim().to_string(),
            stall_numbers,
            permit: input.permit.trim().to_string(),
            profile_picture: None,
            description: optional(input.description),
            contact_number,
            email: email.clone(),
            organization,
            linked_accounts: Vec::new(),
            views: 0,
            revision: 0,
        };

        if let Err(e) = self.stores.create(store).await {
            warn!(email = %email, error = %e, "Store creation failed, removing account");
            if let Err(undo) = self.accounts.remove(&account_id).await {
                error!(
                    account = %account_id,
                    error = %undo,
                    "Failed to remove account after store failure"
                );
            }
            return Err(e);
        }

        info!(email = %email, account = %account_id, "Account registered");
        Ok(account_id)
    }

    /// The session's principal, password stripped, with their store expanded
    pub async fn get_logged_in_user(&self, actor: &Actor) -> Result<Profile> {
        let principal = self
            .find_principal(actor.kind, &actor.id)
            .await?
            .ok_or_else(|| MarketError::NotFound("User not found".into()))?;

        let store = match &principal {
            Principal::Account(_) => match self.stores.find_by_owner(&actor.id).await? {
                Some(store) => Some(self.stores.profile(store).await?),
                None => None,
            },
            Principal::Admin(_) => None,
        };

        Ok(Profile {
            user: principal.public(),
            store,
        })
    }
}
