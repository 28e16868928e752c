//! Checkout initiation.
//!
//! Creates the pending order and hands the buyer over to the payment
//! processor. Access is granted only later, once the processor confirms the
//! payment (see [`crate::fulfillment`]).

use validator::ValidateEmail;

use crate::order::{Order, OrderId, OrderStatus, Recipient};
use crate::payment::{CheckoutRequest, CheckoutSession, PaymentGateway};
use crate::product::{Product, ProductId};
use crate::user::{normalize_email, User};
use crate::{Config, Database, ErrorKind, Result};

/// Gift recipient as submitted by the buyer.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientInfo {
    pub first_name: String,
    pub email: String,
}

/// Validates the purchase and returns the recipient to store on the order.
///
/// Nothing is persisted here, all checks run before the order exists.
fn validate(
    user: &User,
    product: &Product,
    recipient: Option<RecipientInfo>,
) -> Result<Option<Recipient>> {
    if !product.id.is_purchasable() {
        return Err(ErrorKind::BadInput(format!("product {} can't be bought here", product.id)).into());
    }
    if product.id != ProductId::Bogo {
        return Ok(None);
    }

    let recipient = recipient.ok_or_else(|| {
        ErrorKind::BadInput("recipient information required for BOGO".to_string())
    })?;
    let first_name = recipient.first_name.trim();
    let email = normalize_email(&recipient.email);
    if first_name.is_empty() || email.is_empty() {
        return Err(ErrorKind::BadInput("recipient information required for BOGO".to_string()).into());
    }
    if !email.validate_email() {
        return Err(ErrorKind::BadInput(format!("invalid recipient email: {email}")).into());
    }
    if email == normalize_email(&user.email) {
        return Err(ErrorKind::Conflict("can't gift the guide to yourself".to_string()).into());
    }

    Ok(Some(Recipient {
        email,
        first_name: first_name.to_string(),
    }))
}

/// Starts a checkout for a single product.
///
/// The order is persisted as pending before the payment processor is
/// contacted. If creating the session fails the order is marked as failed.
pub async fn initiate_checkout(
    db: &Database,
    config: &Config,
    gateway: &dyn PaymentGateway,
    user: &User,
    product_id: ProductId,
    recipient: Option<RecipientInfo>,
) -> Result<CheckoutSession> {
    let product = Product::find(config, product_id)?;
    let recipient = validate(user, product, recipient)?;

    let mut order = Order::pending(user.id, product, recipient.clone());
    db.set(&order)?;

    let request = CheckoutRequest {
        order_id: order.id,
        user_id: user.id,
        customer_email: user.email.clone(),
        product: product.clone(),
        recipient,
        success_url: config.url("/checkout/success?session_id={CHECKOUT_SESSION_ID}"),
        cancel_url: config.url(&format!("/checkout?product={product_id}&cancelled=true")),
    };

    let session = match gateway.create_checkout_session(&request).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(order = %order.id, "failed creating checkout session: {e}");
            order.status = OrderStatus::Failed;
            db.set(&order)?;
            return Err(e.with_user(user.id));
        }
    };

    order.stripe_session_id = Some(session.id.clone());
    db.set(&order)?;
    tracing::info!(order = %order.id, product = %product_id, "checkout initiated");

    Ok(session)
}

/// Order summary shown once the buyer returns from the checkout page.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: String,
    pub product: Option<ProductId>,
    pub product_name: Option<String>,
    pub total_amount: rust_decimal::Decimal,
    pub currency: String,
    pub is_bogo_order: bool,
    pub recipient_first_name: Option<String>,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            status: order.status.to_string(),
            product: order.product(),
            product_name: order.items.first().map(|i| i.name.clone()),
            total_amount: order.total_amount,
            currency: order.currency.clone(),
            is_bogo_order: order.is_bogo_order,
            recipient_first_name: order.recipient.as_ref().map(|r| r.first_name.clone()),
        }
    }
}

/// Finds the user's order created for the given checkout session.
pub fn order_for_session(db: &Database, user: &User, session_id: &str) -> Result<OrderSummary> {
    db.get_collection::<Order>()?
        .iter()
        .find(|o| o.user_id == user.id && o.stripe_session_id.as_deref() == Some(session_id))
        .map(OrderSummary::from)
        .ok_or_else(|| ErrorKind::NotFound(format!("order for session {session_id}")).into())
}
