use cookie::{Cookie, SameSite};

use crate::error::{ErrorKind, Result};
use crate::{user, Database, User, UserId};

use super::{validate_password, TokenMeta};

/// Name of the cookie carrying the access token.
pub const TOKEN_COOKIE: &str = "token";

/// Verifies user credentials and issues a new access token.
pub fn log_in(email: &str, password: &str, db: &Database) -> Result<(User, TokenMeta)> {
    let user = user::find_by_email(db, email)?.ok_or(ErrorKind::InvalidCredentials)?;

    let hash = user.password_hash.as_ref().ok_or(ErrorKind::PasswordNotSet)?;
    validate_password(password.as_bytes(), hash)?;

    let token = issue_token(&user.id, db)?;
    Ok((user, token))
}

/// Creates and stores a new access token for the user.
pub fn issue_token(user_id: &UserId, db: &Database) -> Result<TokenMeta> {
    let token = TokenMeta::new(*user_id);
    db.set(&token)?;
    Ok(token)
}

/// Builds the cookie used for keeping the user logged in.
pub fn token_cookie<'c>(token: &TokenMeta) -> Cookie<'c> {
    Cookie::build((TOKEN_COOKIE, token.id.to_string()))
        .same_site(SameSite::Lax)
        .path("/")
        .secure(true)
        .http_only(true)
        .build()
}

/// Resolves the user owning a valid token. Expired tokens are removed.
pub fn authenticate(token: &TokenMeta, db: &Database) -> Result<User> {
    if token.is_expired() {
        db.remove(token)?;
        return Err(ErrorKind::AuthFailed("token expired".to_string()).into());
    }
    db.get::<User>(token.user_id)
        .map_err(|_| ErrorKind::AuthFailed("token user not found".to_string()).into())
}
