use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{Config, ErrorKind, Result};

/// Identifier of a product in the store catalog.
///
/// Serialized in snake case, which is also the form used in checkout
/// metadata and download urls, e.g. `collective_monthly`.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductId {
    /// The Mindful Musicpreneur Guide, bundling the Planner
    Guide,
    /// The Mindful Muse Quarterly Planner
    Planner,
    /// Buy one, gift one: Guide for the buyer and for a named recipient
    Bogo,
    /// Free resource handed out for joining the mailing list
    Freebie,
    CollectiveMonthly,
    CollectiveYearly,
}

impl ProductId {
    /// Collective memberships are recurring subscriptions, everything else
    /// is a one-time payment.
    pub fn is_subscription(&self) -> bool {
        matches!(self, Self::CollectiveMonthly | Self::CollectiveYearly)
    }

    /// Returns true for products that can be bought through the one-time
    /// checkout.
    pub fn is_purchasable(&self) -> bool {
        matches!(self, Self::Guide | Self::Planner | Self::Bogo)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Price in the store currency
    pub price: Decimal,
    pub active: bool,
}

impl Product {
    /// Finds an active product in the configured catalog.
    pub fn find(config: &Config, id: ProductId) -> Result<&Product> {
        config
            .products
            .iter()
            .find(|p| p.id == id && p.active)
            .ok_or_else(|| ErrorKind::BadInput(format!("invalid product: {id}")).into())
    }

    /// Price in the smallest currency unit, as expected by the payment
    /// processor.
    pub fn unit_amount(&self) -> Result<i64> {
        use rust_decimal::prelude::ToPrimitive;
        (self.price * dec!(100))
            .round()
            .to_i64()
            .ok_or_else(|| ErrorKind::Other("failed converting price decimal".to_string()).into())
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (${})", self.name, self.price)
    }
}

/// Standard catalog of products.
pub fn catalog() -> Vec<Product> {
    vec![
        Product {
            id: ProductId::Guide,
            name: "The Mindful Musicpreneur Guide".to_string(),
            description: "200+ page career-shadow field guide for female musicians".to_string(),
            price: dec!(60.00),
            active: true,
        },
        Product {
            id: ProductId::Planner,
            name: "The Mindful Muse Quarterly Planner".to_string(),
            description: "Quarterly planner designed for musicians lives & schedules".to_string(),
            price: dec!(15.00),
            active: true,
        },
        Product {
            id: ProductId::Bogo,
            name: "BOGO - Buy One, Gift One Guide".to_string(),
            description: "Get the Guide for yourself and gift one to another artist".to_string(),
            price: dec!(100.00),
            active: true,
        },
        Product {
            id: ProductId::Freebie,
            name: "Free Resource".to_string(),
            description: "Get started with our free resource for female musicians".to_string(),
            price: Decimal::ZERO,
            active: true,
        },
        Product {
            id: ProductId::CollectiveMonthly,
            name: "The Collective - Monthly".to_string(),
            description: "Monthly membership to The Collective".to_string(),
            price: dec!(47.00),
            active: true,
        },
        Product {
            id: ProductId::CollectiveYearly,
            name: "The Collective - Yearly".to_string(),
            description: "Yearly membership to The Collective (save $67)".to_string(),
            price: dec!(497.00),
            active: true,
        },
    ]
}
