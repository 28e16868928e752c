use std::sync::Arc;

use axum::async_trait;
use axum::body::Body;
use axum::extract::FromRequest;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json};
use http::{Request, StatusCode};

use crate::fulfillment::{self, Outcome};
use crate::payment::stripe::translate;
use crate::{routes, Config, Result};

use super::{DbExt, MailerExt, Router};

/// Stripe event with a verified signature.
pub struct StripeEvent(pub ::stripe::Event);

pub fn router() -> Router {
    Router::new().route(routes::STRIPE_WEBHOOK, post(webhook))
}

fn bad_request(msg: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": msg }))).into_response()
}

#[async_trait]
impl<S> FromRequest<S> for StripeEvent
where
    String: FromRequest<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request<Body>, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let Some(signature) = req
            .headers()
            .get("stripe-signature")
            .and_then(|sig| sig.to_str().ok())
            .map(str::to_string)
        else {
            return Err(bad_request("missing signature"));
        };

        let Some(config) = req.extensions().get::<Arc<Config>>().cloned() else {
            tracing::error!("config extension unavailable");
            return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        };

        let payload = String::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        ::stripe::Webhook::construct_event(
            &payload,
            &signature,
            config.payments.stripe.signing_secret(),
        )
        .map(Self)
        .map_err(|e| {
            tracing::warn!("webhook signature verification failed: {e}");
            bad_request("invalid signature")
        })
    }
}

/// Acknowledges every processed event, including no-ops. Store failures
/// surface as server errors, which makes stripe deliver the event again.
async fn webhook(
    Extension(db): DbExt,
    Extension(mailer): MailerExt,
    StripeEvent(event): StripeEvent,
) -> Result<impl IntoResponse> {
    let event_id = event.id.to_string();
    let outcome = fulfillment::handle(&db, mailer.as_ref(), translate(event)).await?;
    if let Outcome::Skipped(reason) = &outcome {
        tracing::debug!(event = %event_id, "event skipped: {reason}");
    }
    Ok(Json(serde_json::json!({ "received": true })))
}
