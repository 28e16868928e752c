use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json};

use crate::collective::portal::{self, PortalView};
use crate::collective::{self, ApplicationForm, ApplicationStatusView};
use crate::{routes, Result};

use super::{ConfigExt, DbExt, Router, User};

pub fn router() -> Router {
    Router::new()
        .route(routes::COLLECTIVE_APPLY, post(apply))
        .route(routes::COLLECTIVE_APPLICATION_STATUS, get(application_status))
        .route(routes::COLLECTIVE_PORTAL_CONTENT, get(portal_content))
}

pub async fn apply(
    Extension(db): DbExt,
    user: User,
    Json(form): Json<ApplicationForm>,
) -> Result<impl IntoResponse> {
    let application = collective::submit(&db, &user, form).map_err(|e| e.with_user(user.id))?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "applicationId": application.id,
        })),
    ))
}

pub async fn application_status(
    Extension(db): DbExt,
    user: User,
) -> Result<Json<ApplicationStatusView>> {
    collective::application_status(&db, user.id).map(Json)
}

pub async fn portal_content(
    Extension(db): DbExt,
    Extension(config): ConfigExt,
    user: User,
) -> Result<Json<PortalView>> {
    portal::for_member(&db, &config, &user).map(Json)
}
