//! The Collective: applications and membership administration.
//!
//! An application goes from pending to either approved or denied, both
//! terminal. A user can hold at most one live (pending or approved)
//! application, enforced with a unique index keyed by the user id.

pub mod portal;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{Collectable, Database, Identifiable, Modified};
use crate::email::{self, Email, Mailer, Template};
use crate::user::{User, UserId};
use crate::{ErrorKind, Result};

pub type ApplicationId = Uuid;

/// Unique index of live applications, keyed by user id.
pub const LIVE_APPLICATION_INDEX: &str = "collective_live_application";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Denied,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Application {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub status: ApplicationStatus,

    pub why_join: String,
    pub music_goals: String,
    pub guide_impact: String,
    pub community_hopes: String,
    pub current_stage: String,
    pub additional_info: Option<String>,

    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Email of the reviewing admin
    pub reviewed_by: Option<String>,
    pub welcome_message: Option<String>,
    pub denial_message: Option<String>,
}

impl Collectable for Application {
    fn get_collection_name() -> &'static str {
        "collective_application"
    }
}

impl Identifiable for Application {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

impl Application {
    pub fn is_pending(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }

    /// Moves a pending application into a terminal state. Returns false if
    /// it was already reviewed.
    fn review(&mut self, status: ApplicationStatus, reviewer: &str, time: DateTime<Utc>) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = status;
        self.reviewed_at = Some(time);
        self.reviewed_by = Some(reviewer.to_string());
        true
    }
}

/// Answers submitted with an application.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplicationForm {
    pub why_join: String,
    pub music_goals: String,
    pub guide_impact: String,
    pub community_hopes: String,
    pub current_stage: String,
    pub additional_info: Option<String>,
}

impl ApplicationForm {
    fn validate(&self) -> Result<()> {
        let required = [
            ("whyJoin", &self.why_join),
            ("musicGoals", &self.music_goals),
            ("guideImpact", &self.guide_impact),
            ("communityHopes", &self.community_hopes),
            ("currentStage", &self.current_stage),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ErrorKind::BadInput(format!("missing required field: {name}")).into());
            }
        }
        Ok(())
    }
}

/// Submits a new application on behalf of the user.
pub fn submit(db: &Database, user: &User, form: ApplicationForm) -> Result<Application> {
    if !user.owns_guide {
        return Err(ErrorKind::NotEligible(
            "you must own The Mindful Musicpreneur Guide to apply".to_string(),
        )
        .into());
    }
    form.validate()?;

    let application = Application {
        id: Uuid::new_v4(),
        user_id: user.id,
        status: ApplicationStatus::Pending,
        why_join: form.why_join.trim().to_string(),
        music_goals: form.music_goals.trim().to_string(),
        guide_impact: form.guide_impact.trim().to_string(),
        community_hopes: form.community_hopes.trim().to_string(),
        current_stage: form.current_stage.trim().to_string(),
        additional_info: form
            .additional_info
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty()),
        created_at: Utc::now(),
        reviewed_at: None,
        reviewed_by: None,
        welcome_message: None,
        denial_message: None,
    };

    db.insert_unique(LIVE_APPLICATION_INDEX, &user.id.to_string(), &application)
        .map_err(|e| match e.kind {
            ErrorKind::Conflict(_) => ErrorKind::Conflict(
                "you already have a pending or approved application".to_string(),
            )
            .into(),
            _ => e,
        })?;
    tracing::info!(user = %user.id, application = %application.id, "collective application submitted");

    Ok(application)
}

fn reviewed(id: ApplicationId, modified: Modified<Application>) -> Result<Application> {
    match modified {
        Modified::Changed(application) => Ok(application),
        Modified::Unchanged(application) => Err(ErrorKind::Conflict(format!(
            "application {id} was already {}",
            application.status
        ))
        .into()),
        Modified::Missing => Err(ErrorKind::NotFound(format!("application {id}")).into()),
    }
}

/// Approves a pending application.
///
/// Stamps the applicant's approval time without making them a member, and
/// sends the welcome email. A failed email doesn't undo the approval.
pub async fn approve(
    db: &Database,
    mailer: &dyn Mailer,
    id: ApplicationId,
    reviewer: &str,
    welcome_message: Option<String>,
) -> Result<Application> {
    let now = Utc::now();
    let welcome_message = welcome_message.filter(|m| !m.trim().is_empty());
    let modified = db.modify::<Application, _>(id, |a| {
        let changed = a.review(ApplicationStatus::Approved, reviewer, now);
        if changed {
            a.welcome_message = welcome_message.clone();
        }
        changed
    })?;
    let application = reviewed(id, modified)?;
    tracing::info!(application = %id, %reviewer, "collective application approved");

    match db.modify::<User, _>(application.user_id, |u| {
        u.approve_for_collective(now);
        true
    })? {
        Modified::Changed(user) | Modified::Unchanged(user) => {
            email::dispatch(
                mailer,
                Email::new(
                    &user.email,
                    Template::CollectiveWelcome {
                        first_name: user.first_name.clone(),
                        message: welcome_message,
                    },
                ),
            )
            .await;
        }
        Modified::Missing => {
            tracing::error!(user = %application.user_id, "approved application of missing user")
        }
    }

    Ok(application)
}

/// Denies a pending application, freeing the user to apply again.
pub async fn deny(
    db: &Database,
    mailer: &dyn Mailer,
    id: ApplicationId,
    reviewer: &str,
    denial_message: Option<String>,
) -> Result<Application> {
    let now = Utc::now();
    let denial_message = denial_message.filter(|m| !m.trim().is_empty());
    let modified = db.modify::<Application, _>(id, |a| {
        let changed = a.review(ApplicationStatus::Denied, reviewer, now);
        if changed {
            a.denial_message = denial_message.clone();
        }
        changed
    })?;
    let application = reviewed(id, modified)?;
    db.remove_at(LIVE_APPLICATION_INDEX, application.user_id.to_string())?;
    tracing::info!(application = %id, %reviewer, "collective application denied");

    match db.find::<User>(application.user_id)? {
        Some(user) => {
            email::dispatch(
                mailer,
                Email::new(
                    &user.email,
                    Template::CollectiveDenied {
                        first_name: user.first_name.clone(),
                        message: denial_message,
                    },
                ),
            )
            .await;
        }
        None => tracing::error!(user = %application.user_id, "denied application of missing user"),
    }

    Ok(application)
}

/// Switches the user's membership directly, bypassing billing.
///
/// Revoking doesn't cancel any running subscription, the next subscription
/// update from the payment processor sets membership again.
pub fn toggle_access(db: &Database, user_id: UserId, grant: bool) -> Result<User> {
    let now = Utc::now();
    match db.modify::<User, _>(user_id, |u| {
        u.set_collective_access(grant, now);
        true
    })? {
        Modified::Changed(user) | Modified::Unchanged(user) => {
            if grant {
                tracing::info!(user = %user_id, "collective access granted manually");
            } else {
                tracing::warn!(
                    user = %user_id,
                    "collective access revoked manually, subscription billing is left untouched"
                );
            }
            Ok(user)
        }
        Modified::Missing => Err(ErrorKind::NotFound(format!("user {user_id}")).into()),
    }
}

/// Latest application of the user, if any.
pub fn latest_application(db: &Database, user_id: UserId) -> Result<Option<Application>> {
    Ok(db
        .get_collection::<Application>()?
        .into_iter()
        .filter(|a| a.user_id == user_id)
        .max_by_key(|a| a.created_at))
}

/// Status of the user's latest application as shown to the applicant.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatusView {
    pub has_application: bool,
    pub status: Option<ApplicationStatus>,
    pub submitted_at: Option<DateTime<Utc>>,
}

pub fn application_status(db: &Database, user_id: UserId) -> Result<ApplicationStatusView> {
    let latest = latest_application(db, user_id)?;
    Ok(ApplicationStatusView {
        has_application: latest.is_some(),
        status: latest.as_ref().map(|a| a.status),
        submitted_at: latest.as_ref().map(|a| a.created_at),
    })
}

/// All applications, optionally filtered by status, newest first.
pub fn applications(db: &Database, status: Option<ApplicationStatus>) -> Result<Vec<Application>> {
    let mut applications = db
        .get_collection::<Application>()?
        .into_iter()
        .filter(|a| status.map_or(true, |s| a.status == s))
        .collect::<Vec<_>>();
    applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(applications)
}

/// Users approved for or holding a membership, most recently approved
/// first.
pub fn members(db: &Database) -> Result<Vec<User>> {
    let mut members = db
        .get_collection::<User>()?
        .into_iter()
        .filter(|u| u.is_collective_member || u.collective_approved_at.is_some())
        .collect::<Vec<_>>();
    members.sort_by(|a, b| b.collective_approved_at.cmp(&a.collective_approved_at));
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingMailer;
    use crate::user;

    fn form() -> ApplicationForm {
        ApplicationForm {
            why_join: "community".to_string(),
            music_goals: "tour".to_string(),
            guide_impact: "clarity".to_string(),
            community_hopes: "support".to_string(),
            current_stage: "releasing".to_string(),
            additional_info: Some("  ".to_string()),
        }
    }

    fn owner(db: &Database) -> User {
        let mut user = User::new("ada@x.com", "Ada");
        user.owns_guide = true;
        user::create(db, &user).unwrap();
        user
    }

    #[test]
    fn guide_ownership_required() {
        let db = Database::temporary().unwrap();
        let user = User::new("b@x.com", "Bea");
        user::create(&db, &user).unwrap();

        let err = submit(&db, &user, form()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NotEligible(_)));
        assert_eq!(db.len::<Application>().unwrap(), 0);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let db = Database::temporary().unwrap();
        let user = owner(&db);
        let mut incomplete = form();
        incomplete.current_stage = " ".to_string();

        let err = submit(&db, &user, incomplete).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadInput(_)));
        assert_eq!(db.len::<Application>().unwrap(), 0);
    }

    #[tokio::test]
    async fn one_live_application_per_user() {
        let db = Database::temporary().unwrap();
        let mailer = RecordingMailer::default();
        let user = owner(&db);

        let first = submit(&db, &user, form()).unwrap();
        assert!(first.additional_info.is_none());
        let err = submit(&db, &user, form()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Conflict(_)));

        deny(&db, &mailer, first.id, "admin@x.com", None).await.unwrap();
        let second = submit(&db, &user, form()).unwrap();

        approve(&db, &mailer, second.id, "admin@x.com", None).await.unwrap();
        let err = submit(&db, &user, form()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Conflict(_)));

        let status = application_status(&db, user.id).unwrap();
        assert_eq!(status.status, Some(ApplicationStatus::Approved));
    }

    #[tokio::test]
    async fn approval_is_terminal_and_not_membership() {
        let db = Database::temporary().unwrap();
        let mailer = RecordingMailer::default();
        let user = owner(&db);
        let application = submit(&db, &user, form()).unwrap();

        let approved = approve(
            &db,
            &mailer,
            application.id,
            "admin@x.com",
            Some("See you Thursday".to_string()),
        )
        .await
        .unwrap();
        let reviewed_at = approved.reviewed_at;

        let stored = db.get::<User>(user.id).unwrap();
        assert!(stored.collective_approved_at.is_some());
        assert!(!stored.is_collective_member);

        let err = approve(&db, &mailer, application.id, "other@x.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Conflict(_)));
        let err = deny(&db, &mailer, application.id, "other@x.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Conflict(_)));

        let stored = db.get::<Application>(application.id).unwrap();
        assert_eq!(stored.reviewed_at, reviewed_at);
        assert_eq!(stored.reviewed_by.as_deref(), Some("admin@x.com"));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].template,
            Template::CollectiveWelcome {
                first_name: "Ada".to_string(),
                message: Some("See you Thursday".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn denial_leaves_access_untouched() {
        let db = Database::temporary().unwrap();
        let mailer = RecordingMailer::default();
        let user = owner(&db);
        let application = submit(&db, &user, form()).unwrap();

        let denied = deny(&db, &mailer, application.id, "admin@x.com", Some("Not yet".to_string()))
            .await
            .unwrap();
        assert_eq!(denied.status, ApplicationStatus::Denied);
        assert_eq!(denied.denial_message.as_deref(), Some("Not yet"));

        let stored = db.get::<User>(user.id).unwrap();
        assert!(stored.collective_approved_at.is_none() && !stored.is_collective_member);
        assert_eq!(mailer.sent()[0].template.name(), "collective_denied");
    }

    #[tokio::test]
    async fn unknown_application_is_not_found() {
        let db = Database::temporary().unwrap();
        let mailer = RecordingMailer::default();
        let err = approve(&db, &mailer, Uuid::new_v4(), "admin@x.com", None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn toggle_grants_and_revokes() {
        let db = Database::temporary().unwrap();
        let user = owner(&db);

        let granted = toggle_access(&db, user.id, true).unwrap();
        assert!(granted.is_collective_member && granted.collective_approved_at.is_some());
        assert_eq!(members(&db).unwrap().len(), 1);

        let revoked = toggle_access(&db, user.id, false).unwrap();
        assert!(!revoked.is_collective_member && revoked.collective_approved_at.is_none());
        assert!(members(&db).unwrap().is_empty());

        assert!(toggle_access(&db, Uuid::new_v4(), true).unwrap_err().is_not_found());
    }
}
