use validator::{ValidateEmail, ValidateLength};

use crate::email::list::{self, Source, Subscriber};
use crate::error::{ErrorKind, Result};
use crate::{user, Database, User};

use super::hash_password;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupData {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: Option<String>,
}

/// Registers a new account and adds the address to the mailing list,
/// unless it's already there.
pub fn sign_up(db: &Database, data: SignupData) -> Result<User> {
    let email = user::normalize_email(&data.email);
    if !email.validate_email() {
        return Err(ErrorKind::BadInput("invalid email".to_string()).into());
    }
    if !data.password.validate_length(Some(8), None, None) {
        return Err(ErrorKind::BadInput("password must be at least 8 characters".to_string()).into());
    }
    if data.first_name.trim().is_empty() {
        return Err(ErrorKind::BadInput("first name is required".to_string()).into());
    }

    let mut user = User::new(&email, &data.first_name);
    user.last_name = data
        .last_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    user.password_hash = Some(hash_password(&data.password)?);
    user::create(db, &user).map_err(|e| match e.kind {
        ErrorKind::UserWithEmailAlreadyExists(email) => {
            ErrorKind::Conflict(format!("user with email {email} already exists")).into()
        }
        _ => e,
    })?;

    list::subscribe_if_new(
        db,
        &Subscriber::new(&user.email, Some(&user.first_name), Source::Signup),
    )?;
    tracing::info!(user = %user.id, "new user signed up");

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(email: &str, password: &str) -> SignupData {
        SignupData {
            email: email.to_string(),
            password: password.to_string(),
            first_name: "Ada".to_string(),
            last_name: Some(" ".to_string()),
        }
    }

    #[test]
    fn sign_up_creates_user_and_subscriber() {
        let db = Database::temporary().unwrap();
        let user = sign_up(&db, data("Ada@X.com", "password123")).unwrap();
        assert_eq!(user.email, "ada@x.com");
        assert!(user.last_name.is_none());
        assert!(super::super::login::log_in("ada@x.com", "password123", &db).is_ok());

        let subscriber = list::find(&db, "ada@x.com").unwrap().unwrap();
        assert_eq!(subscriber.source, Source::Signup);

        let err = sign_up(&db, data("ada@x.com", "password123")).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Conflict(_)));
    }

    #[test]
    fn sign_up_validates_input() {
        let db = Database::temporary().unwrap();
        for (email, password) in [("nope", "password123"), ("a@x.com", "short")] {
            let err = sign_up(&db, data(email, password)).unwrap_err();
            assert!(matches!(err.kind, ErrorKind::BadInput(_)));
        }
    }
}
