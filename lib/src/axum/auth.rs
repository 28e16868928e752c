use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json};
use axum_extra::extract::PrivateCookieJar;
use cookie::Cookie;
use http::StatusCode;
use uuid::Uuid;

use crate::auth::login::{self, TOKEN_COOKIE};
use crate::auth::signup::{self, SignupData};
use crate::auth::TokenMeta;
use crate::error::Result;
use crate::routes;
use crate::user::UserId;

use super::{DbExt, Router};

pub fn router() -> Router {
    Router::new()
        .route(routes::SIGN_UP, post(sign_up))
        .route(routes::LOGIN, post(log_in))
        .route(routes::LOGOUT, get(log_out))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: Uuid,
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
}

/// Creates the account and logs the new user in right away.
pub async fn sign_up(
    Extension(db): DbExt,
    cookies: PrivateCookieJar,
    Json(data): Json<SignupData>,
) -> Result<(StatusCode, PrivateCookieJar, Json<Session>)> {
    let user = signup::sign_up(&db, data)?;
    let token = login::issue_token(&user.id, &db)?;
    Ok((
        StatusCode::CREATED,
        cookies.add(login::token_cookie(&token)),
        Json(Session {
            token: token.id,
            user_id: user.id,
            email: user.email,
            first_name: user.first_name,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    email: String,
    password: String,
}

/// Processes login data and logs the user in.
pub async fn log_in(
    Extension(db): DbExt,
    cookies: PrivateCookieJar,
    Json(data): Json<LoginData>,
) -> Result<(PrivateCookieJar, Json<Session>)> {
    let (user, token) = login::log_in(&data.email, &data.password, &db)?;
    Ok((
        cookies.add(login::token_cookie(&token)),
        Json(Session {
            token: token.id,
            user_id: user.id,
            email: user.email,
            first_name: user.first_name,
        }),
    ))
}

/// Removes the token cookie along with the stored token.
pub async fn log_out(Extension(db): DbExt, cookies: PrivateCookieJar) -> Result<impl IntoResponse> {
    if let Some(cookie) = cookies.get(TOKEN_COOKIE) {
        if let Ok(id) = cookie.value().parse::<Uuid>() {
            if let Some(token) = db.find::<TokenMeta>(id)? {
                db.remove(&token)?;
            }
        }
    }
    let cookies = cookies.remove(Cookie::build(TOKEN_COOKIE).path("/"));
    Ok((cookies, Json(serde_json::json!({ "success": true }))))
}
