//! Payment processing.
//!
//! Checkout happens on a page hosted by the payment processor. We create a
//! checkout session carrying our own identifiers as metadata and later
//! receive them back with the webhook events, translated into
//! [`PaymentEvent`]s.

#[cfg(feature = "stripe")]
pub mod stripe;

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;

use crate::order::{OrderId, Recipient};
use crate::product::{Product, ProductId};
use crate::{Result, UserId};

pub const META_ORDER_ID: &str = "orderId";
pub const META_USER_ID: &str = "userId";
pub const META_PRODUCT_ID: &str = "productId";
pub const META_IS_BOGO: &str = "isBogoOrder";
pub const META_RECIPIENT_EMAIL: &str = "recipientEmail";
pub const META_RECIPIENT_FIRST_NAME: &str = "recipientFirstName";

/// Everything needed for creating a hosted checkout session.
#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub customer_email: String,
    pub product: Product,
    pub recipient: Option<Recipient>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Metadata attached to the session, echoed back on completion.
    pub fn metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::from([
            (META_ORDER_ID.to_string(), self.order_id.to_string()),
            (META_USER_ID.to_string(), self.user_id.to_string()),
            (META_PRODUCT_ID.to_string(), self.product.id.to_string()),
        ]);
        if let Some(recipient) = &self.recipient {
            metadata.insert(META_IS_BOGO.to_string(), "true".to_string());
            metadata.insert(META_RECIPIENT_EMAIL.to_string(), recipient.email.clone());
            metadata.insert(
                META_RECIPIENT_FIRST_NAME.to_string(),
                recipient.first_name.clone(),
            );
        }
        metadata
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Address of the hosted checkout page
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;
}

/// Verified payment processor event, reduced to what the fulfillment
/// workflow needs.
#[derive(Clone, Debug, PartialEq)]
pub enum PaymentEvent {
    CheckoutCompleted(CheckoutCompleted),
    SubscriptionChanged(SubscriptionChanged),
    /// Event of a type we don't act upon
    Ignored(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckoutCompleted {
    pub order_id: Option<OrderId>,
    pub user_id: Option<UserId>,
    pub product: Option<ProductId>,
    pub is_bogo: bool,
    pub recipient: Option<Recipient>,
    /// Payment identifier assigned by the processor
    pub payment_id: Option<String>,
}

impl CheckoutCompleted {
    /// Reads our identifiers back from the session metadata. Malformed
    /// values are treated as missing.
    pub fn from_metadata(metadata: &HashMap<String, String>, payment_id: Option<String>) -> Self {
        let recipient = match (
            metadata.get(META_RECIPIENT_EMAIL),
            metadata.get(META_RECIPIENT_FIRST_NAME),
        ) {
            (Some(email), Some(first_name)) if !email.is_empty() => Some(Recipient {
                email: email.clone(),
                first_name: first_name.clone(),
            }),
            _ => None,
        };
        Self {
            order_id: metadata.get(META_ORDER_ID).and_then(|id| id.parse().ok()),
            user_id: metadata.get(META_USER_ID).and_then(|id| id.parse().ok()),
            product: metadata
                .get(META_PRODUCT_ID)
                .and_then(|id| ProductId::from_str(id).ok()),
            is_bogo: metadata.get(META_IS_BOGO).is_some_and(|v| v == "true"),
            recipient,
            payment_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionChanged {
    pub user_id: Option<UserId>,
    /// Status as reported by the processor, e.g. `active` or `canceled`
    pub status: String,
    pub subscription_id: String,
}

impl SubscriptionChanged {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}
