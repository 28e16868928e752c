use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Extension, Json};

use crate::email::list;
use crate::freebie::{self, FreebieRequest};
use crate::{routes, Result};

use super::{DbExt, MailerExt, Router};

pub fn router() -> Router {
    Router::new()
        .route(routes::FREEBIE, post(claim_freebie))
        .route(routes::UNSUBSCRIBE, post(unsubscribe))
}

pub async fn claim_freebie(
    Extension(db): DbExt,
    Extension(mailer): MailerExt,
    Json(request): Json<FreebieRequest>,
) -> Result<impl IntoResponse> {
    freebie::claim(&db, mailer.as_ref(), request).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Freebie sent successfully!",
    })))
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UnsubscribeData {
    pub email: String,
}

/// Unsubscribes the address from marketing emails. Unknown addresses are
/// reported as success too, so the endpoint can't be used to find out who
/// is on the list.
pub async fn unsubscribe(
    Extension(db): DbExt,
    Json(data): Json<UnsubscribeData>,
) -> Result<impl IntoResponse> {
    if data.email.trim().is_empty() {
        return Err(crate::ErrorKind::BadInput("email is required".to_string()).into());
    }
    list::unsubscribe(&db, &data.email)?;
    Ok(Json(serde_json::json!({ "success": true })))
}
