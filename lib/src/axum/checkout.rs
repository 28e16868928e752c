use std::str::FromStr;

use axum::extract::Query;
use axum::routing::{get, post};
use axum::{Extension, Json};

use crate::checkout::{self, OrderSummary, RecipientInfo};
use crate::{routes, ErrorKind, ProductId, Result};

use super::{ConfigExt, DbExt, GatewayExt, Router, User};

pub fn router() -> Router {
    Router::new()
        .route(routes::CHECKOUT, post(create_checkout))
        .route(routes::CHECKOUT_SESSION, get(session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutData {
    product_id: String,
    recipient_info: Option<RecipientInfo>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    url: String,
}

pub async fn create_checkout(
    Extension(db): DbExt,
    Extension(config): ConfigExt,
    Extension(gateway): GatewayExt,
    user: User,
    Json(data): Json<CheckoutData>,
) -> Result<Json<CheckoutResponse>> {
    let product = ProductId::from_str(&data.product_id)
        .map_err(|_| ErrorKind::BadInput(format!("invalid product: {}", data.product_id)))?;
    let session = checkout::initiate_checkout(
        &db,
        &config,
        gateway.as_ref(),
        &user,
        product,
        data.recipient_info,
    )
    .await?;
    Ok(Json(CheckoutResponse { url: session.url }))
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    session_id: String,
}

pub async fn session(
    Extension(db): DbExt,
    user: User,
    Query(query): Query<SessionQuery>,
) -> Result<Json<OrderSummary>> {
    checkout::order_for_session(&db, &user, &query.session_id).map(Json)
}
