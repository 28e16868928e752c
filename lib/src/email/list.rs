//! Mailing list module.
//!
//! Subscribers are stored by their case-folded email address and don't need
//! to have an account. For registered users the `subscribed` flag on the
//! user is kept in sync with the subscriber entry.

use chrono::{DateTime, Utc};

use crate::db::{Collectable, Database, Modified};
use crate::user::{self, User};
use crate::Result;

/// Where the subscriber came from.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Source {
    Signup,
    Freebie,
    Guide,
    Planner,
    Bogo,
    Collective,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Subscriber {
    /// Case-folded email address, also used as the key
    pub email: String,
    pub first_name: Option<String>,
    pub source: Source,

    pub subscribed: bool,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

impl Collectable for Subscriber {
    fn get_collection_name() -> &'static str {
        "email_subscriber"
    }
}

impl Subscriber {
    pub fn new(email: &str, first_name: Option<&str>, source: Source) -> Self {
        Self {
            email: user::normalize_email(email),
            first_name: first_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            source,
            subscribed: true,
            subscribed_at: Utc::now(),
            unsubscribed_at: None,
        }
    }
}

pub fn find(db: &Database, email: &str) -> Result<Option<Subscriber>> {
    db.find_at(
        Subscriber::get_collection_name(),
        user::normalize_email(email),
    )
}

/// Adds the subscriber to the list, re-subscribing an existing entry under
/// the new source.
pub fn subscribe(db: &Database, subscriber: Subscriber) -> Result<Subscriber> {
    let collection = Subscriber::get_collection_name();
    if db.insert_new_at(collection, &subscriber.email, &subscriber)? {
        return Ok(subscriber);
    }
    let first_name = subscriber.first_name.clone();
    let source = subscriber.source;
    let modified = db.modify_at::<Subscriber, _>(collection, &subscriber.email, |s| {
        s.source = source;
        s.subscribed = true;
        s.unsubscribed_at = None;
        if first_name.is_some() {
            s.first_name = first_name.clone();
        }
        true
    })?;
    match modified {
        Modified::Changed(s) | Modified::Unchanged(s) => Ok(s),
        // Removed in between, store as new.
        Modified::Missing => {
            db.set_raw_at(collection, &subscriber, &subscriber.email)?;
            Ok(subscriber)
        }
    }
}

/// Adds the subscriber only if the address is not on the list yet,
/// leaving existing entries untouched.
pub fn subscribe_if_new(db: &Database, subscriber: &Subscriber) -> Result<bool> {
    db.insert_new_at(
        Subscriber::get_collection_name(),
        &subscriber.email,
        subscriber,
    )
}

/// Marks both the list entry and the matching user, if any, as
/// unsubscribed.
///
/// Returns false if the address is not known at all.
pub fn unsubscribe(db: &Database, email: &str) -> Result<bool> {
    let email = user::normalize_email(email);
    let now = Utc::now();

    let subscriber = db.modify_at::<Subscriber, _>(
        Subscriber::get_collection_name(),
        &email,
        |s| {
            if !s.subscribed {
                return false;
            }
            s.subscribed = false;
            s.unsubscribed_at = Some(now);
            true
        },
    )?;

    let user = match user::find_by_email(db, &email)? {
        Some(user) => db.modify::<User, _>(user.id, |u| {
            if !u.subscribed {
                return false;
            }
            u.subscribed = false;
            u.unsubscribed_at = Some(now);
            true
        })?,
        None => Modified::Missing,
    };

    let known = !matches!(subscriber, Modified::Missing) || !matches!(user, Modified::Missing);
    if known {
        log::info!("unsubscribed {email}");
    }
    Ok(known)
}

/// Every entry ever added to the list, unsubscribed ones included, newest
/// first.
pub fn all(db: &Database) -> Result<Vec<Subscriber>> {
    let mut subscribers = db.get_collection::<Subscriber>()?;
    subscribers.sort_by(|a, b| b.subscribed_at.cmp(&a.subscribed_at));
    Ok(subscribers)
}

/// Currently subscribed entries, newest first.
pub fn subscribed(db: &Database) -> Result<Vec<Subscriber>> {
    let mut subscribers = db
        .get_collection::<Subscriber>()?
        .into_iter()
        .filter(|s| s.subscribed)
        .collect::<Vec<_>>();
    subscribers.sort_by(|a, b| b.subscribed_at.cmp(&a.subscribed_at));
    Ok(subscribers)
}

/// Exports currently subscribed entries as csv, newest first.
pub fn export_csv(db: &Database) -> Result<String> {
    let mut out = String::from("Email,First Name,Source,Subscribed At\n");
    for s in subscribed(db)? {
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(&s.email),
            csv_field(s.first_name.as_deref().unwrap_or("")),
            s.source,
            s.subscribed_at.to_rfc3339(),
        ));
    }
    Ok(out)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
