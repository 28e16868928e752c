use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_auth::AuthBearer;
use axum_extra::extract::cookie::Key as CookieKey;
use axum_extra::extract::PrivateCookieJar;
use log::debug;
use uuid::Uuid;

use crate::auth::login::{authenticate, TOKEN_COOKIE};
use crate::auth::TokenMeta;
use crate::db::Database;
use crate::error::{Error, ErrorKind};
use crate::user::{self, User as RawUser};
use crate::Config;

fn extension<T: Send + Sync + 'static>(parts: &Parts) -> Result<Arc<T>, Error> {
    parts.extensions.get::<Arc<T>>().cloned().ok_or_else(|| {
        ErrorKind::Other(format!(
            "extension unavailable: {}",
            std::any::type_name::<T>()
        ))
        .into()
    })
}

/// Authenticated user.
///
/// The access token is taken from the bearer authorization header or from
/// the private token cookie, in that order.
#[derive(Clone, Debug)]
pub struct User(pub RawUser);

impl Deref for User {
    type Target = RawUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for User
where
    CookieKey: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let db = extension::<Database>(parts)?;
        let config = extension::<Config>(parts)?;

        // autologin functionality for faster development, can be set in config
        if config.dev.enabled {
            if let Some(autologin_email) = &config.dev.autologin {
                debug!("attempting autologin, uri: {}", parts.uri);
                return match user::find_by_email(&db, autologin_email)? {
                    Some(user) => Ok(User(user)),
                    None => Err(ErrorKind::AuthFailed(format!(
                        "autologin: provided user email that doesn't exist: {autologin_email}"
                    ))
                    .into()),
                };
            }
        }

        // first see if the bearer token is presented with authorization header
        let token = if let Ok(AuthBearer(token)) = AuthBearer::from_request_parts(parts, state).await {
            token
        } else {
            // otherwise try accessing cookie jar and extracting the token cookie
            let jar = PrivateCookieJar::<CookieKey>::from_request_parts(parts, state)
                .await
                .map_err(|_| ErrorKind::AuthFailed("failed reading cookies".to_string()))?;
            jar.get(TOKEN_COOKIE)
                .ok_or_else(|| ErrorKind::AuthFailed("missing access token".to_string()))?
                .value()
                .to_string()
        };

        let token_id = Uuid::from_str(&token)
            .map_err(|_| ErrorKind::AuthFailed("malformed access token".to_string()))?;
        let token = db
            .find::<TokenMeta>(token_id)?
            .ok_or_else(|| ErrorKind::AuthFailed("unknown access token".to_string()))?;

        authenticate(&token, &db).map(User)
    }
}

/// Authenticated user found on the admin allow-list.
#[derive(Clone, Debug)]
pub struct Admin(pub RawUser);

impl Deref for Admin {
    type Target = RawUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Admin
where
    CookieKey: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let User(user) = User::from_request_parts(parts, state).await?;
        let config = extension::<Config>(parts)?;
        crate::admin::ensure_admin(&config, &user).map_err(|e| e.with_user(user.id))?;
        Ok(Admin(user))
    }
}
