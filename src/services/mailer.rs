//! Transactional mail
//!
//! Production sends through the Brevo HTTP API. Development mode keeps mail
//! in an outbox and logs it instead.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::types::{MarketError, Result};

const BREVO_ENDPOINT: &str = "https://api.brevo.com/v3/smtp/email";

/// A rendered message ready to hand to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html: String,
}

impl OutgoingMail {
    /// One-time login code
    pub fn verification_code(to: &str, code: &str) -> Self {
        Self {
            to: to.to_string(),
            to_name: None,
            subject: "Your Taytay Marketplace Verification Code".into(),
            html: format!(
                "<p>Your verification code is: <strong>{}</strong></p>\
                 <p>This code will expire in 10 minutes.</p>",
                code
            ),
        }
    }

    /// Credentials for an admin created from the dashboard
    pub fn admin_welcome(to: &str, name: &str, password: &str) -> Self {
        Self {
            to: to.to_string(),
            to_name: Some(name.to_string()),
            subject: "Your Taytay Marketplace Admin Account".into(),
            html: format!(
                "<p>Hello {},</p>\
                 <p>An admin account has been created for you.</p>\
                 <p>Email: <strong>{}</strong><br/>Temporary password: <strong>{}</strong></p>\
                 <p>Please change your password after your first login.</p>",
                name, to, password
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoSendEmailBody {
    sender: BrevoAddress,
    to: Vec<BrevoAddress>,
    subject: String,
    html_content: String,
}

/// Brevo transactional email client
pub struct BrevoMailer {
    client: reqwest::Client,
    api_key: String,
    sender_email: String,
    sender_name: String,
}

impl BrevoMailer {
    pub fn new(api_key: String, sender_email: String, sender_name: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(MarketError::Config("BREVO_API_KEY is required".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| MarketError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            sender_email,
            sender_name,
        })
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let body = BrevoSendEmailBody {
            sender: BrevoAddress {
                email: self.sender_email.clone(),
                name: Some(self.sender_name.clone()),
            },
            to: vec![BrevoAddress {
                email: mail.to.clone(),
                name: mail.to_name,
            }],
            subject: mail.subject,
            html_content: mail.html,
        };

        let response = self
            .client
            .post(BREVO_ENDPOINT)
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(to = %mail.to, %status, "Brevo rejected message");
            return Err(MarketError::Mail(format!(
                "Brevo responded {}: {}",
                status, detail
            )));
        }

        debug!(to = %mail.to, "Mail accepted by Brevo");
        Ok(())
    }
}

/// Keeps mail in memory instead of sending it
#[derive(Default)]
pub struct OutboxMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: AtomicBool,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail
    pub fn fail_deliveries(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Most recent message addressed to `email`
    pub fn last_to(&self, email: &str) -> Option<OutgoingMail> {
        self.sent().into_iter().rev().find(|m| m.to == email)
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MarketError::Mail("Outbox is rejecting mail".into()));
        }

        info!(to = %mail.to, subject = %mail.subject, "Mail kept in outbox");
        debug!(body = %mail.html, "Outbox mail body");

        self.sent
            .lock()
            .map_err(|_| MarketError::Internal("Outbox lock poisoned".into()))?
            .push(mail);
        Ok(())
    }
}
