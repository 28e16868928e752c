use std::str::FromStr;

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json};
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};

use crate::admin::{
    self, Analytics, ApplicationListing, MemberListing, OrderListing, Stats, UserListing,
    UserUpdate,
};
use crate::collective::portal::{self, PortalUpdate};
use crate::collective::{self, ApplicationId, ApplicationStatus};
use crate::email::list;
use crate::user::UserId;
use crate::{routes, ErrorKind, Result};

use super::{Admin, ConfigExt, DbExt, MailerExt, Router};

pub fn router() -> Router {
    Router::new()
        .route(routes::ADMIN_STATS, get(stats))
        .route(routes::ADMIN_ANALYTICS, get(analytics))
        .route(routes::ADMIN_ORDERS, get(orders))
        .route(routes::ADMIN_USERS, get(users))
        .route(routes::ADMIN_USER, get(user_detail).patch(update_user))
        .route(routes::ADMIN_APPLICATIONS, get(applications))
        .route(routes::ADMIN_APPLICATION_APPROVE, post(approve))
        .route(routes::ADMIN_APPLICATION_DENY, post(deny))
        .route(routes::ADMIN_MEMBERS, get(members))
        .route(routes::ADMIN_MEMBER_TOGGLE_ACCESS, post(toggle_access))
        .route(
            routes::ADMIN_PORTAL_CONTENT,
            get(portal_content).put(update_portal_content),
        )
        .route(
            routes::ADMIN_UPLOAD_PDF,
            post(upload_pdf).layer(DefaultBodyLimit::max(50 * 1024 * 1024)),
        )
        .route(routes::ADMIN_EMAILS, get(subscribers))
        .route(routes::ADMIN_EMAIL_EXPORT, get(export_emails))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    status: Option<String>,
}

pub async fn stats(Extension(db): DbExt, _: Admin) -> Result<Json<Stats>> {
    admin::stats(&db).map(Json)
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    30
}

pub async fn analytics(
    Extension(db): DbExt,
    _: Admin,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Analytics>> {
    admin::analytics(&db, query.days).map(Json)
}

pub async fn orders(
    Extension(db): DbExt,
    _: Admin,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<OrderListing>>> {
    admin::orders(&db, query.status.as_deref()).map(Json)
}

pub async fn users(Extension(db): DbExt, _: Admin) -> Result<Json<Vec<UserListing>>> {
    admin::users(&db).map(Json)
}

pub async fn user_detail(
    Extension(db): DbExt,
    _: Admin,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse> {
    let user = admin::user_detail(&db, id)?;
    Ok(Json(serde_json::json!({ "user": user })))
}

pub async fn update_user(
    Extension(db): DbExt,
    Admin(admin): Admin,
    Path(id): Path<UserId>,
    Json(update): Json<UserUpdate>,
) -> Result<impl IntoResponse> {
    let user = admin::update_user(&db, id, &update)?;
    tracing::info!(admin = %admin.email, user = %id, "user flags changed by admin");
    Ok(Json(serde_json::json!({ "user": user })))
}

pub async fn applications(
    Extension(db): DbExt,
    _: Admin,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<ApplicationListing>>> {
    let status = query
        .status
        .map(|s| {
            ApplicationStatus::from_str(&s)
                .map_err(|_| ErrorKind::BadInput(format!("invalid application status: {s}")))
        })
        .transpose()?;
    admin::applications(&db, status).map(Json)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveData {
    welcome_message: Option<String>,
}

pub async fn approve(
    Extension(db): DbExt,
    Extension(mailer): MailerExt,
    Admin(admin): Admin,
    Path(id): Path<ApplicationId>,
    data: Option<Json<ApproveData>>,
) -> Result<impl IntoResponse> {
    let data = data.map(|Json(d)| d).unwrap_or_default();
    collective::approve(&db, mailer.as_ref(), id, &admin.email, data.welcome_message).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyData {
    denial_message: Option<String>,
}

pub async fn deny(
    Extension(db): DbExt,
    Extension(mailer): MailerExt,
    Admin(admin): Admin,
    Path(id): Path<ApplicationId>,
    data: Option<Json<DenyData>>,
) -> Result<impl IntoResponse> {
    let data = data.map(|Json(d)| d).unwrap_or_default();
    collective::deny(&db, mailer.as_ref(), id, &admin.email, data.denial_message).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn members(Extension(db): DbExt, _: Admin) -> Result<Json<Vec<MemberListing>>> {
    admin::members(&db).map(Json)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleAccessData {
    grant_access: bool,
}

pub async fn toggle_access(
    Extension(db): DbExt,
    Admin(admin): Admin,
    Path(user_id): Path<UserId>,
    Json(data): Json<ToggleAccessData>,
) -> Result<impl IntoResponse> {
    let user = collective::toggle_access(&db, user_id, data.grant_access)?;
    tracing::info!(admin = %admin.email, user = %user.id, grant = data.grant_access, "collective access toggled");
    Ok(Json(serde_json::json!({
        "success": true,
        "isCollectiveMember": user.is_collective_member,
    })))
}

pub async fn portal_content(Extension(db): DbExt, _: Admin) -> Result<impl IntoResponse> {
    let content = portal::all(&db)?;
    Ok(Json(serde_json::json!({ "content": content })))
}

pub async fn update_portal_content(
    Extension(db): DbExt,
    Admin(admin): Admin,
    Json(update): Json<PortalUpdate>,
) -> Result<impl IntoResponse> {
    portal::update(&db, update, &admin.email)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Takes a `file` field with the document and a `type` field naming the
/// product it's delivered for: `guide`, `planner` or `freebie`.
pub async fn upload_pdf(
    Extension(config): ConfigExt,
    _: Admin,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut file = None;
    let mut kind = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ErrorKind::BadInput(format!("malformed upload: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ErrorKind::BadInput(format!("malformed upload: {e}")))?;
        match name.as_deref() {
            Some("file") => file = Some(bytes),
            Some("type") => kind = Some(String::from_utf8_lossy(&bytes).trim().to_string()),
            _ => (),
        }
    }

    let file = file.ok_or_else(|| ErrorKind::BadInput("no file provided".to_string()))?;
    let kind = kind.unwrap_or_default();
    let uploaded = admin::upload_pdf(&config, &kind, &file).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "filename": uploaded.filename,
        "size": uploaded.size,
    })))
}

pub async fn subscribers(Extension(db): DbExt, _: Admin) -> Result<impl IntoResponse> {
    let subscribers = list::all(&db)?;
    Ok(Json(serde_json::json!({ "subscribers": subscribers })))
}

pub async fn export_emails(Extension(db): DbExt, _: Admin) -> Result<impl IntoResponse> {
    let csv = list::export_csv(&db)?;
    let file_name = format!(
        "email-subscribers-{}.csv",
        chrono::Utc::now().format("%Y-%m-%d")
    );
    Ok((
        [
            (CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        csv,
    ))
}
