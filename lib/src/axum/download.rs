use std::str::FromStr;

use axum::extract::{Path, Query};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json};
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::StatusCode;

use crate::download::{self, Delivery};
use crate::{routes, ErrorKind, ProductId, Result};

use super::{ConfigExt, DbExt, Router, User};

pub fn router() -> Router {
    Router::new()
        .route(routes::DOWNLOAD, get(download_product))
        .route(routes::FREEBIE_DOWNLOAD, get(download_freebie))
}

fn respond(delivery: Delivery) -> Response {
    match delivery {
        Delivery::File { file_name, bytes } => (
            [
                (CONTENT_TYPE, mime::APPLICATION_PDF.to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{file_name}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Delivery::Unavailable { product, file_name } => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "message": "PDF will be available soon. Please check back or contact support.",
                "productId": product,
                "fileName": file_name,
            })),
        )
            .into_response(),
    }
}

pub async fn download_product(
    Extension(db): DbExt,
    Extension(config): ConfigExt,
    user: User,
    Path(product): Path<String>,
) -> Result<Response> {
    let product = ProductId::from_str(&product)
        .map_err(|_| ErrorKind::BadInput(format!("invalid product: {product}")))?;
    let delivery = download::download(&db, &config, &user, product)
        .await
        .map_err(|e| e.with_user(user.id))?;
    Ok(respond(delivery))
}

#[derive(Debug, Deserialize)]
pub struct FreebieQuery {
    email: String,
}

pub async fn download_freebie(
    Extension(db): DbExt,
    Extension(config): ConfigExt,
    Query(query): Query<FreebieQuery>,
) -> Result<Response> {
    let delivery = download::freebie_by_email(&db, &config, &query.email).await?;
    Ok(respond(delivery))
}
