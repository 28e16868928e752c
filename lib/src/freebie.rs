//! Free resource handed out in exchange for joining the mailing list.

use validator::ValidateEmail;

use crate::db::{Database, Modified};
use crate::email::list::{self, Source, Subscriber};
use crate::email::{self, Email, Mailer, Template};
use crate::user::{self, Access, User};
use crate::{ErrorKind, Result};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FreebieRequest {
    pub first_name: String,
    pub email: String,
}

/// Grants the freebie to the address, creating a password-less account if
/// needed, and (re)subscribes it to the mailing list.
pub async fn claim(db: &Database, mailer: &dyn Mailer, request: FreebieRequest) -> Result<User> {
    let first_name = request.first_name.trim().to_string();
    let email = user::normalize_email(&request.email);
    if first_name.is_empty() || email.is_empty() {
        return Err(ErrorKind::BadInput("first name and email are required".to_string()).into());
    }
    if !email.validate_email() {
        return Err(ErrorKind::BadInput("please provide a valid email address".to_string()).into());
    }

    let (user, _) = user::find_or_create(db, &email, |email| Ok(User::new(email, &first_name)))?;
    let user = match db.modify::<User, _>(user.id, |u| {
        u.first_name = first_name.clone();
        u.grant(Access::for_product(crate::ProductId::Freebie));
        u.subscribed = true;
        u.unsubscribed_at = None;
        true
    })? {
        Modified::Changed(user) | Modified::Unchanged(user) => user,
        Modified::Missing => user,
    };

    list::subscribe(db, Subscriber::new(&email, Some(&first_name), Source::Freebie))?;
    tracing::info!(user = %user.id, "freebie claimed");

    email::dispatch(
        mailer,
        Email::new(
            &email,
            Template::Freebie {
                first_name,
                email: email.clone(),
            },
        ),
    )
    .await;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingMailer;

    #[tokio::test]
    async fn claim_resubscribes_existing_user() {
        let db = Database::temporary().unwrap();
        let mailer = RecordingMailer::default();
        let mut existing = User::new("a@x.com", "Old");
        existing.subscribed = false;
        existing.owns_guide = true;
        user::create(&db, &existing).unwrap();

        let request = FreebieRequest {
            first_name: "Ada".to_string(),
            email: "A@x.com".to_string(),
        };
        let user = claim(&db, &mailer, request).await.unwrap();
        assert_eq!(user.id, existing.id);
        assert!(user.owns_freebie && user.owns_guide && user.subscribed);
        assert_eq!(user.first_name, "Ada");

        let subscriber = list::find(&db, "a@x.com").unwrap().unwrap();
        assert_eq!(subscriber.source, Source::Freebie);
        assert_eq!(mailer.sent()[0].template.name(), "freebie");
    }

    #[tokio::test]
    async fn claim_creates_account_without_password() {
        let db = Database::temporary().unwrap();
        let mailer = RecordingMailer::failing_for("b@x.com");
        let request = FreebieRequest {
            first_name: "Bea".to_string(),
            email: "b@x.com".to_string(),
        };
        let user = claim(&db, &mailer, request).await.unwrap();
        assert!(user.password_hash.is_none() && user.owns_freebie);

        let err = claim(&db, &mailer, FreebieRequest::default()).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::BadInput(_)));
    }
}
