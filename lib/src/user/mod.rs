pub mod access;
pub mod membership;

pub use access::Access;
pub use membership::MembershipType;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{Collectable, Database, Identifiable, Modified};
use crate::error::{ErrorKind, Result};

pub type UserId = Uuid;

/// Name of the unique index mapping case-folded emails to user ids.
pub const EMAIL_INDEX: &str = "user_email";

/// User data structure.
///
/// Doubles as the entitlement record: product ownership and Collective
/// membership are tracked with flags on the user.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct User {
    pub id: UserId,

    /// Case-folded, unique across users
    pub email: String,

    /// Users provisioned by the system (e.g. gift recipients) may not
    /// have chosen a password yet, hence the option type.
    pub password_hash: Option<String>,

    pub first_name: String,
    pub last_name: Option<String>,

    pub owns_guide: bool,
    pub owns_planner: bool,
    pub owns_freebie: bool,

    pub is_collective_member: bool,
    pub collective_approved_at: Option<DateTime<Utc>>,
    pub collective_membership_type: Option<MembershipType>,
    pub collective_stripe_subscription_id: Option<String>,

    /// Marketing emails consent
    pub subscribed: bool,
    pub unsubscribed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            email: String::new(),
            password_hash: None,
            first_name: String::new(),
            last_name: None,
            owns_guide: false,
            owns_planner: false,
            owns_freebie: false,
            is_collective_member: false,
            collective_approved_at: None,
            collective_membership_type: None,
            collective_stripe_subscription_id: None,
            subscribed: true,
            unsubscribed_at: None,
            created_at: Utc::now(),
        }
    }
}

impl Collectable for User {
    fn get_collection_name() -> &'static str {
        "user"
    }
}

impl Identifiable for User {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

impl User {
    pub fn new(email: &str, first_name: &str) -> Self {
        Self {
            email: normalize_email(email),
            first_name: first_name.trim().to_string(),
            ..Default::default()
        }
    }

    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// Canonical form of an email address used for lookups and uniqueness.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Stores a new user, enforcing email uniqueness.
pub fn create(db: &Database, user: &User) -> Result<()> {
    db.insert_unique(EMAIL_INDEX, &user.email, user)
        .map_err(|e| match e.kind {
            ErrorKind::Conflict(_) => ErrorKind::UserWithEmailAlreadyExists(user.email.clone()).into(),
            _ => e,
        })
}

pub fn find_by_email(db: &Database, email: &str) -> Result<Option<User>> {
    db.find_by_index(EMAIL_INDEX, &normalize_email(email))
}

/// Returns the user with the provided email, creating it with `init` if it
/// doesn't exist yet.
///
/// Returns the user along with a flag telling whether it was just created.
/// A concurrent creation of the same email resolves to the user stored by
/// whoever won the race.
pub fn find_or_create(
    db: &Database,
    email: &str,
    init: impl FnOnce(&str) -> Result<User>,
) -> Result<(User, bool)> {
    if let Some(user) = find_by_email(db, email)? {
        return Ok((user, false));
    }
    let user = init(&normalize_email(email))?;
    match create(db, &user) {
        Ok(()) => Ok((user, true)),
        Err(e) if matches!(e.kind, ErrorKind::UserWithEmailAlreadyExists(_)) => {
            let user = find_by_email(db, email)?
                .ok_or_else(|| ErrorKind::UserNotFound(email.to_string()))?;
            Ok((user, false))
        }
        Err(e) => Err(e),
    }
}

/// Atomically raises the user's product access flags.
pub fn grant_access(db: &Database, user: UserId, access: Access) -> Result<Modified<User>> {
    db.modify::<User, _>(user, |u| u.grant(access))
}
