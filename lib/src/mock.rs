//! Stand-ins for external collaborators and generation of mock data.
//!
//! The in-memory [`RecordingMailer`] and [`FakeGateway`] are used by tests
//! and by the dev mode, where nothing should leave the machine.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::collective::{self, ApplicationForm};
use crate::email::{Email, Mailer};
use crate::payment::{CheckoutRequest, CheckoutSession, PaymentGateway};
use crate::user::{self, Access, User};
use crate::{auth, Config, Database, ErrorKind, Result};

/// Mailer that keeps the sent messages in memory.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    failing: Vec<String>,
}

impl RecordingMailer {
    /// Mailer failing to deliver anything to the provided address.
    pub fn failing_for(address: &str) -> Self {
        Self {
            failing: vec![address.to_string()],
            ..Default::default()
        }
    }

    /// Messages delivered so far.
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        if self.failing.contains(&email.to) {
            return Err(ErrorKind::EmailFailedSend(format!("mailbox {} unavailable", email.to)).into());
        }
        self.sent
            .lock()
            .map_err(|e| ErrorKind::Other(e.to_string()))?
            .push(email.clone());
        Ok(())
    }
}

/// Payment gateway handing out local checkout urls.
#[derive(Default)]
pub struct FakeGateway {
    requests: Mutex<Vec<CheckoutRequest>>,
    fail: bool,
}

impl FakeGateway {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        if self.fail {
            return Err(ErrorKind::PaymentGateway("gateway unavailable".to_string()).into());
        }
        self.requests
            .lock()
            .map_err(|e| ErrorKind::Other(e.to_string()))?
            .push(request.clone());
        let id = format!("cs_test_{}", request.order_id.simple());
        Ok(CheckoutSession {
            url: request.success_url.replace("{CHECKOUT_SESSION_ID}", &id),
            id,
        })
    }
}

/// Generates and saves mock data in the database.
pub fn generate(config: &Config, db: &Database) -> Result<()> {
    let owner = mock_user(db, "test@mail.com", "Test", Access::GUIDE_AND_PLANNER)?;
    let applicant = mock_user(db, "applicant@mail.com", "Applicant", Access::GUIDE_AND_PLANNER)?;
    mock_user(db, "freebie@mail.com", "Freebie", Access::for_product(crate::ProductId::Freebie))?;

    if collective::latest_application(db, applicant.id)?.is_none() {
        collective::submit(
            db,
            &applicant,
            ApplicationForm {
                why_join: "To find my people".to_string(),
                music_goals: "Release an EP and book a small tour".to_string(),
                guide_impact: "It helped me plan my year".to_string(),
                community_hopes: "Accountability".to_string(),
                current_stage: "Independent, first release out".to_string(),
                additional_info: None,
            },
        )?;
    }

    if config.admins.is_empty() {
        log::warn!("no admins configured, mock users can't access the back-office");
    }
    log::info!("mock data generated (owner: {})", owner.email);
    Ok(())
}

fn mock_user(db: &Database, email: &str, first_name: &str, access: Access) -> Result<User> {
    let (user, _) = user::find_or_create(db, email, |email| {
        let mut user = User::new(email, first_name);
        user.password_hash = Some(auth::hash_password("test")?);
        user.grant(access);
        Ok(user)
    })?;
    Ok(user)
}
