//! Order fulfillment driven by payment processor events.
//!
//! Events are delivered at least once, so everything here must hold up when
//! the same event is processed again, possibly concurrently. Completing the
//! order and granting access to the buyer and a gift recipient happen in a
//! single transaction: either the order is left pending with nothing
//! granted, so a redelivery can try again, or all of it is committed and
//! only the delivery that committed it goes on to send emails.

use chrono::Utc;

use crate::db::{Collectable, Modified, Tx, TxResult};
use crate::email::{self, Email, Mailer, Template};
use crate::order::{Order, OrderId, Recipient};
use crate::payment::{CheckoutCompleted, PaymentEvent, SubscriptionChanged};
use crate::product::ProductId;
use crate::user::{self, Access, User, UserId, EMAIL_INDEX};
use crate::{auth, Database, Result};

/// Result of processing a single event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Order completed and access granted
    Fulfilled {
        order: OrderId,
        recipient: Option<UserId>,
        emails_sent: usize,
    },
    /// Order was completed by an earlier delivery of the event
    AlreadyFulfilled(OrderId),
    /// Membership state updated from the subscription
    SubscriptionApplied(UserId),
    /// Event can't be acted upon, e.g. it references an unknown order
    Skipped(String),
}

fn skip(reason: String) -> Outcome {
    tracing::warn!("skipping payment event: {reason}");
    Outcome::Skipped(reason)
}

/// Processes a verified payment event.
///
/// Only store failures are returned as errors, so that the processor can be
/// told to deliver the event again.
pub async fn handle(db: &Database, mailer: &dyn Mailer, event: PaymentEvent) -> Result<Outcome> {
    match event {
        PaymentEvent::CheckoutCompleted(completed) => checkout_completed(db, mailer, completed).await,
        PaymentEvent::SubscriptionChanged(changed) => subscription_changed(db, changed),
        PaymentEvent::Ignored(type_) => {
            tracing::debug!("unhandled payment event type: {type_}");
            Ok(Outcome::Skipped(format!("unhandled event type {type_}")))
        }
    }
}

/// What the fulfillment transaction committed.
enum Committed {
    OrderMissing,
    AlreadyCompleted,
    BuyerMissing(UserId),
    Fulfilled {
        order: Order,
        buyer: User,
        recipient: Option<(User, Recipient)>,
    },
}

pub async fn checkout_completed(
    db: &Database,
    mailer: &dyn Mailer,
    event: CheckoutCompleted,
) -> Result<Outcome> {
    let Some(order_id) = event.order_id else {
        return Ok(skip("missing order id in metadata".to_string()));
    };

    let Some(order) = db.find::<Order>(order_id)? else {
        return Ok(skip(format!("order {order_id} not found")));
    };
    if order.is_completed() {
        tracing::info!(order = %order_id, "order already completed, ignoring redelivery");
        return Ok(Outcome::AlreadyFulfilled(order_id));
    }
    let recipient = if event.is_bogo || order.is_bogo_order {
        event.recipient.clone().or_else(|| order.recipient.clone())
    } else {
        None
    };
    // The transaction may run more than once, so the slow password hash for
    // a possible new gift recipient is prepared outside of it.
    let recipient_password = match recipient {
        Some(_) => Some(auth::hash_password(&auth::random_password())?),
        None => None,
    };

    let now = Utc::now();
    let committed = db.transaction(
        &[Order::get_collection_name(), User::get_collection_name(), EMAIL_INDEX],
        |tx| {
            let Some(mut order) = tx.find::<Order>(order_id)? else {
                return Ok(Committed::OrderMissing);
            };
            if !order.complete(event.payment_id.clone(), now) {
                return Ok(Committed::AlreadyCompleted);
            }

            let user_id = event.user_id.unwrap_or(order.user_id);
            let Some(mut buyer) = tx.find::<User>(user_id)? else {
                tx.set(&order)?;
                return Ok(Committed::BuyerMissing(user_id));
            };
            if let Some(product) = event.product.or_else(|| order.product()) {
                if buyer.grant(Access::for_product(product)) {
                    tx.set(&buyer)?;
                }
            }

            let recipient = match (&recipient, &recipient_password) {
                (Some(recipient), Some(password)) => {
                    let user = provision_recipient(tx, recipient, password)?;
                    order.recipient_user_id = Some(user.id);
                    Some((user, recipient.clone()))
                }
                _ => None,
            };

            tx.set(&order)?;
            Ok(Committed::Fulfilled {
                order,
                buyer,
                recipient,
            })
        },
    )?;

    let (order, buyer, recipient) = match committed {
        Committed::OrderMissing => return Ok(skip(format!("order {order_id} not found"))),
        Committed::AlreadyCompleted => {
            tracing::info!(order = %order_id, "order already completed, ignoring redelivery");
            return Ok(Outcome::AlreadyFulfilled(order_id));
        }
        Committed::BuyerMissing(user_id) => {
            tracing::error!(order = %order_id, user = %user_id, "buyer not found, access not granted");
            return Ok(Outcome::Skipped(format!("user {user_id} not found")));
        }
        Committed::Fulfilled {
            order,
            buyer,
            recipient,
        } => (order, buyer, recipient),
    };
    let product = event.product.or_else(|| order.product());
    tracing::info!(order = %order.id, user = %buyer.id, ?product, "order completed, access granted");

    let mut emails = vec![];
    if order.is_bogo_order || event.is_bogo {
        match &recipient {
            Some((recipient_user, recipient)) => {
                tracing::info!(order = %order.id, user = %recipient_user.id, "gift recipient granted access");
                emails.push(Email::new(
                    &buyer.email,
                    Template::BogoBuyer {
                        first_name: buyer.first_name.clone(),
                        recipient_first_name: recipient.first_name.clone(),
                    },
                ));
                emails.push(Email::new(
                    &recipient.email,
                    Template::BogoRecipient {
                        first_name: recipient.first_name.clone(),
                        buyer_first_name: buyer.first_name.clone(),
                    },
                ));
            }
            None => tracing::warn!(order = %order.id, "BOGO order without recipient details"),
        }
    } else {
        let first_name = buyer.first_name.clone();
        match product {
            Some(ProductId::Guide) => {
                emails.push(Email::new(&buyer.email, Template::GuidePurchase { first_name }))
            }
            Some(ProductId::Planner) => {
                emails.push(Email::new(&buyer.email, Template::PlannerPurchase { first_name }))
            }
            _ => (),
        }
    }

    // Access is committed at this point, failed emails are only logged.
    let mut emails_sent = 0;
    for email in emails {
        if email::dispatch(mailer, email).await {
            emails_sent += 1;
        }
    }

    Ok(Outcome::Fulfilled {
        order: order.id,
        recipient: recipient.map(|(user, _)| user.id),
        emails_sent,
    })
}

/// Finds or creates the gift recipient's account and grants them the Guide
/// along with the Planner.
///
/// New accounts get a random password nobody knows, so they can't be logged
/// into until the password is reset.
fn provision_recipient(tx: &Tx, recipient: &Recipient, password_hash: &str) -> TxResult<User> {
    let email = user::normalize_email(&recipient.email);
    if let Some(mut existing) = tx.find_by_index::<User>(EMAIL_INDEX, &email)? {
        if existing.grant(Access::GUIDE_AND_PLANNER) {
            tx.set(&existing)?;
        }
        return Ok(existing);
    }

    let mut user = User::new(&email, &recipient.first_name);
    user.password_hash = Some(password_hash.to_string());
    user.grant(Access::GUIDE_AND_PLANNER);
    // The index was just checked within this transaction.
    tx.insert_unique(EMAIL_INDEX, &user.email, &user)?;
    Ok(user)
}

pub fn subscription_changed(db: &Database, event: SubscriptionChanged) -> Result<Outcome> {
    let Some(user_id) = event.user_id else {
        return Ok(skip(format!(
            "missing user id in metadata of subscription {}",
            event.subscription_id
        )));
    };

    let active = event.is_active();
    let now = Utc::now();
    match db.modify::<User, _>(user_id, |u| {
        u.apply_subscription(active, &event.subscription_id, now);
        true
    })? {
        Modified::Missing => Ok(skip(format!("user {user_id} not found"))),
        _ => {
            tracing::info!(user = %user_id, status = %event.status, "collective subscription updated");
            Ok(Outcome::SubscriptionApplied(user_id))
        }
    }
}
