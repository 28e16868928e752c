use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::{Collectable, Identifiable};
use crate::product::{Product, ProductId};
use crate::user::UserId;

pub type OrderId = Uuid;

/// Single purchase attempt.
///
/// An order is created in the pending state when checkout is initiated and
/// is completed once the payment processor confirms the payment.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Order {
    /// Unique identifier for the order
    pub id: OrderId,
    /// Id of the user who placed the order
    pub user_id: UserId,
    pub status: OrderStatus,

    pub total_amount: Decimal,
    /// Lowercase ISO currency code, e.g. `usd`
    pub currency: String,
    pub items: Vec<OrderItem>,

    /// Buy-one-gift-one order, granting access to a second person as well
    pub is_bogo_order: bool,
    pub recipient: Option<Recipient>,
    /// Account of the gift recipient, known once the order is fulfilled
    pub recipient_user_id: Option<UserId>,

    /// Checkout session created with the payment processor
    pub stripe_session_id: Option<String>,
    /// Payment identifier reported by the payment processor on completion
    pub payment_intent_id: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Collectable for Order {
    fn get_collection_name() -> &'static str {
        "order"
    }
}

impl Identifiable for Order {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

/// Lifecycle of an order. The only transition out of `Pending` into
/// `Completed` happens once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Recipient {
    pub email: String,
    pub first_name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OrderItem {
    pub product: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl OrderItem {
    pub fn cost(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl From<&Product> for OrderItem {
    fn from(product: &Product) -> Self {
        Self {
            product: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity: 1,
        }
    }
}

impl Order {
    /// Creates a pending order for a single product.
    pub fn pending(user_id: UserId, product: &Product, recipient: Option<Recipient>) -> Self {
        let item = OrderItem::from(product);
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: OrderStatus::Pending,
            total_amount: item.cost(),
            currency: "usd".to_string(),
            items: vec![item],
            is_bogo_order: product.id == ProductId::Bogo,
            recipient,
            recipient_user_id: None,
            stripe_session_id: None,
            payment_intent_id: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Calculates total cost of all order items.
    pub fn total_cost(&self) -> Decimal {
        self.items.iter().map(OrderItem::cost).sum()
    }

    /// Product of the first order item.
    pub fn product(&self) -> Option<ProductId> {
        self.items.first().map(|i| i.product)
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }

    /// Moves the order into the completed state.
    ///
    /// Returns false without touching anything if the order was already
    /// completed, which is what makes repeated payment confirmations for
    /// the same order harmless.
    pub fn complete(&mut self, payment_intent_id: Option<String>, time: DateTime<Utc>) -> bool {
        if self.is_completed() {
            return false;
        }
        self.status = OrderStatus::Completed;
        self.completed_at = Some(time);
        if payment_intent_id.is_some() {
            self.payment_intent_id = payment_intent_id;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn guide() -> Product {
        Product::find(&Config::default(), ProductId::Guide)
            .unwrap()
            .clone()
    }

    #[test]
    fn pending_order_totals_single_item() {
        let order = Order::pending(Uuid::new_v4(), &guide(), None);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, order.total_cost());
        assert_eq!(order.product(), Some(ProductId::Guide));
        assert!(!order.is_bogo_order);
    }

    #[test]
    fn completion_happens_once() {
        let mut order = Order::pending(Uuid::new_v4(), &guide(), None);
        let first = Utc::now();
        assert!(order.complete(Some("pi_1".to_string()), first));
        assert!(!order.complete(Some("pi_2".to_string()), Utc::now()));
        assert_eq!(order.completed_at, Some(first));
        assert_eq!(order.payment_intent_id.as_deref(), Some("pi_1"));
    }

    #[test]
    fn status_serializes_flat() {
        let mut order = Order::pending(Uuid::new_v4(), &guide(), None);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json["completed_at"].is_null());

        let time = Utc::now();
        order.complete(None, time);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["completed_at"], serde_json::to_value(time).unwrap());
    }
}
