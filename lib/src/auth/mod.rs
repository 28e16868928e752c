use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use crate::db::{Collectable, Identifiable};
use crate::error::{ErrorKind, Result};
use crate::UserId;

pub mod login;
pub mod signup;

/// Tokens are valid for two weeks after being issued.
pub const TOKEN_LIFETIME_DAYS: i64 = 14;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string();
    Ok(password_hash)
}

pub fn validate_password(password: &[u8], expected_password_hash: &str) -> Result<()> {
    let expected_password_hash = PasswordHash::new(expected_password_hash)
        .map_err(|_| ErrorKind::Other("Failed to parse hash in PHC string format.".to_string()))?;
    Argon2::default()
        .verify_password(password, &expected_password_hash)
        .map_err(|_| ErrorKind::InvalidCredentials)?;
    Ok(())
}

/// Generates a random alphanumeric password. Used for accounts created on
/// someone's behalf, the owner is expected to reset it.
pub fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}

pub type TokenId = Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenMeta {
    pub id: TokenId,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
}

impl Collectable for TokenMeta {
    fn get_collection_name() -> &'static str {
        "access_token"
    }
}

impl Identifiable for TokenMeta {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

impl TokenMeta {
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: TokenId::new_v4(),
            user_id,
            issued_at: Utc::now(),
        }
    }

    /// Returns true if the token is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() - self.issued_at > Duration::days(TOKEN_LIFETIME_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(validate_password(b"correct horse", &hash).is_ok());
        let err = validate_password(b"battery staple", &hash).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidCredentials));
    }

    #[test]
    fn random_passwords_differ() {
        let a = random_password();
        assert_eq!(a.len(), 24);
        assert_ne!(a, random_password());
    }

    #[test]
    fn old_tokens_expire() {
        let mut token = TokenMeta::new(Uuid::new_v4());
        assert!(!token.is_expired());
        token.issued_at = Utc::now() - Duration::days(TOKEN_LIFETIME_DAYS + 1);
        assert!(token.is_expired());
    }
}
