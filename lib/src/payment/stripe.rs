use std::collections::HashMap;

use ::stripe::{
    CheckoutSessionMode, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreatePrice, CreateProduct, Currency, Event, EventObject, EventType, Expandable, IdOrCreate,
};
use async_trait::async_trait;

use crate::{Config, ErrorKind, Result};

use super::{
    CheckoutCompleted, CheckoutRequest, CheckoutSession, PaymentEvent, PaymentGateway,
    SubscriptionChanged, META_USER_ID,
};

/// Payment gateway backed by stripe checkout.
pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Client::new(config.payments.stripe.secret()))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let product = &request.product;
        let product_id = product.id.to_string();

        // Prices are created on the fly from the configured catalog, so the
        // catalog stays the single source of truth for pricing.
        let stripe_product = {
            let mut create_product = CreateProduct::new(&product.name);
            create_product.description = Some(&product.description);
            create_product.metadata = Some(HashMap::from([(
                super::META_PRODUCT_ID.to_string(),
                product_id.clone(),
            )]));
            ::stripe::Product::create(&self.client, create_product).await?
        };
        let stripe_product_id = stripe_product.id.to_string();

        let price = {
            let mut create_price = CreatePrice::new(Currency::USD);
            create_price.product = Some(IdOrCreate::Id(&stripe_product_id));
            create_price.unit_amount = Some(product.unit_amount()?);
            create_price.metadata = Some(HashMap::from([(
                super::META_PRODUCT_ID.to_string(),
                product_id.clone(),
            )]));
            ::stripe::Price::create(&self.client, create_price).await?
        };

        let order_id = request.order_id.to_string();
        let checkout_session = {
            let mut params = CreateCheckoutSession::new();
            params.success_url = Some(&request.success_url);
            params.cancel_url = Some(&request.cancel_url);
            params.customer_email = Some(&request.customer_email);
            params.client_reference_id = Some(&order_id);
            params.mode = Some(CheckoutSessionMode::Payment);
            params.metadata = Some(request.metadata());
            params.line_items = Some(vec![CreateCheckoutSessionLineItems {
                quantity: Some(1),
                price: Some(price.id.to_string()),
                ..Default::default()
            }]);
            ::stripe::CheckoutSession::create(&self.client, params).await?
        };

        match checkout_session.url {
            Some(url) => Ok(CheckoutSession {
                id: checkout_session.id.to_string(),
                url,
            }),
            None => Err(ErrorKind::PaymentGateway(
                "failed getting stripe checkout session url".to_string(),
            )
            .into()),
        }
    }
}

/// Translates a verified stripe event into a payment event.
pub fn translate(event: Event) -> PaymentEvent {
    match (event.type_, event.data.object) {
        (EventType::CheckoutSessionCompleted, EventObject::CheckoutSession(session)) => {
            let payment_id = session.payment_intent.map(|intent| match intent {
                Expandable::Id(id) => id.to_string(),
                Expandable::Object(intent) => intent.id.to_string(),
            });
            PaymentEvent::CheckoutCompleted(CheckoutCompleted::from_metadata(
                &session.metadata.unwrap_or_default(),
                payment_id,
            ))
        }
        (
            EventType::CustomerSubscriptionCreated
            | EventType::CustomerSubscriptionUpdated
            | EventType::CustomerSubscriptionDeleted,
            EventObject::Subscription(subscription),
        ) => PaymentEvent::SubscriptionChanged(SubscriptionChanged {
            user_id: subscription
                .metadata
                .get(META_USER_ID)
                .and_then(|id| id.parse().ok()),
            status: subscription.status.to_string(),
            subscription_id: subscription.id.to_string(),
        }),
        (type_, _) => PaymentEvent::Ignored(format!("{type_:?}")),
    }
}
