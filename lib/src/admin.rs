//! Back-office reporting.
//!
//! Admins are the users whose emails are listed in the configuration, see
//! [`Config::is_admin`].

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::collective::{self, Application, ApplicationStatus};
use crate::db::{Database, Modified};
use crate::download::{self, PdfDownload};
use crate::email::list;
use crate::order::Order;
use crate::product::ProductId;
use crate::user::{MembershipType, User, UserId};
use crate::{Config, ErrorKind, Result};

/// Fails unless the user is on the admin allow-list.
pub fn ensure_admin(config: &Config, user: &User) -> Result<()> {
    if config.is_admin(&user.email) {
        Ok(())
    } else {
        Err(ErrorKind::Forbidden.into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_orders: usize,
    pub total_revenue: Decimal,
    pub total_users: usize,
    pub pending_applications: usize,
    pub collective_members: usize,
    pub email_subscribers: usize,
}

pub fn stats(db: &Database) -> Result<Stats> {
    let completed = db
        .get_collection::<Order>()?
        .into_iter()
        .filter(Order::is_completed)
        .collect::<Vec<_>>();
    let users = db.get_collection::<User>()?;

    Ok(Stats {
        total_orders: completed.len(),
        total_revenue: completed.iter().map(|o| o.total_amount).sum(),
        total_users: users.len(),
        pending_applications: collective::applications(db, Some(ApplicationStatus::Pending))?.len(),
        collective_members: users.iter().filter(|u| u.is_collective_member).count(),
        email_subscribers: list::subscribed(db)?.len(),
    })
}

/// Short user description embedded in other listings.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub owns_guide: bool,
    pub owns_planner: bool,
    pub is_collective_member: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            owns_guide: user.owns_guide,
            owns_planner: user.owns_planner,
            is_collective_member: user.is_collective_member,
        }
    }
}

fn summary(db: &Database, id: UserId) -> Result<Option<UserSummary>> {
    Ok(db.find::<User>(id)?.as_ref().map(UserSummary::from))
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListing {
    #[serde(flatten)]
    pub order: Order,
    pub user: Option<UserSummary>,
}

/// Orders, optionally filtered by status name, newest first.
pub fn orders(db: &Database, status: Option<&str>) -> Result<Vec<OrderListing>> {
    let mut orders = db
        .get_collection::<Order>()?
        .into_iter()
        .filter(|o| status.map_or(true, |s| o.status.as_str() == s))
        .collect::<Vec<_>>();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
        .into_iter()
        .map(|order| {
            Ok(OrderListing {
                user: summary(db, order.user_id)?,
                order,
            })
        })
        .collect()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListing {
    #[serde(flatten)]
    pub user: UserSummary,
    pub owns_freebie: bool,
    pub subscribed: bool,
    pub created_at: DateTime<Utc>,
    pub orders: usize,
}

/// All users, newest first, without any credentials.
pub fn users(db: &Database) -> Result<Vec<UserListing>> {
    let orders = db.get_collection::<Order>()?;
    let mut users = db.get_collection::<User>()?;
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(users
        .iter()
        .map(|u| UserListing {
            user: UserSummary::from(u),
            owns_freebie: u.owns_freebie,
            subscribed: u.subscribed,
            created_at: u.created_at,
            orders: orders.iter().filter(|o| o.user_id == u.id).count(),
        })
        .collect())
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationListing {
    #[serde(flatten)]
    pub application: Application,
    pub user: Option<UserSummary>,
}

pub fn applications(
    db: &Database,
    status: Option<ApplicationStatus>,
) -> Result<Vec<ApplicationListing>> {
    collective::applications(db, status)?
        .into_iter()
        .map(|application| {
            Ok(ApplicationListing {
                user: summary(db, application.user_id)?,
                application,
            })
        })
        .collect()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberListing {
    #[serde(flatten)]
    pub user: UserSummary,
    pub collective_approved_at: Option<DateTime<Utc>>,
    pub collective_membership_type: Option<MembershipType>,
    pub collective_stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub downloads: usize,
}

pub fn members(db: &Database) -> Result<Vec<MemberListing>> {
    collective::members(db)?
        .iter()
        .map(|u| {
            Ok(MemberListing {
                user: UserSummary::from(u),
                collective_approved_at: u.collective_approved_at,
                collective_membership_type: u.collective_membership_type,
                collective_stripe_subscription_id: u.collective_stripe_subscription_id.clone(),
                created_at: u.created_at,
                downloads: download::count_for_user(db, u.id)?,
            })
        })
        .collect()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectiveAnalytics {
    pub total_applications: usize,
    pub approved_applications: usize,
    pub active_members: usize,
    /// Percentage of all applications that were approved
    pub approval_rate: f64,
}

/// Store activity within a trailing window of days. Dates are UTC days
/// formatted as `YYYY-MM-DD`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub revenue_by_date: BTreeMap<String, Decimal>,
    pub orders_by_date: BTreeMap<String, usize>,
    pub revenue_by_product: BTreeMap<String, Decimal>,
    pub user_growth: BTreeMap<String, usize>,
    pub collective: CollectiveAnalytics,
    /// All-time downloads per product
    pub downloads: BTreeMap<ProductId, usize>,
    /// Ten most recently completed orders
    pub recent_orders: Vec<OrderListing>,
}

fn day(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d").to_string()
}

pub fn analytics(db: &Database, days: u32) -> Result<Analytics> {
    let since = Utc::now() - Duration::days(days.into());

    let mut completed = db
        .get_collection::<Order>()?
        .into_iter()
        .filter(Order::is_completed)
        .filter_map(|o| Some((o.completed_at?, o)))
        .collect::<Vec<_>>();
    completed.sort_by(|a, b| b.0.cmp(&a.0));

    let mut revenue_by_date = BTreeMap::new();
    let mut orders_by_date = BTreeMap::new();
    let mut revenue_by_product = BTreeMap::new();
    for (time, order) in completed.iter().filter(|(t, _)| *t >= since) {
        *revenue_by_date.entry(day(*time)).or_insert(Decimal::ZERO) += order.total_amount;
        *orders_by_date.entry(day(*time)).or_insert(0) += 1;
        for item in &order.items {
            *revenue_by_product
                .entry(item.name.clone())
                .or_insert(Decimal::ZERO) += item.cost();
        }
    }

    let users = db.get_collection::<User>()?;
    let mut user_growth = BTreeMap::new();
    for user in users.iter().filter(|u| u.created_at >= since) {
        *user_growth.entry(day(user.created_at)).or_insert(0) += 1;
    }

    let applications = collective::applications(db, None)?;
    let approved = applications
        .iter()
        .filter(|a| a.status == ApplicationStatus::Approved)
        .count();
    let approval_rate = match applications.len() {
        0 => 0.,
        total => approved as f64 / total as f64 * 100.,
    };

    let mut downloads = BTreeMap::new();
    for download in db.get_collection::<PdfDownload>()? {
        *downloads.entry(download.product).or_insert(0) += 1;
    }

    let recent_orders = completed
        .into_iter()
        .take(10)
        .map(|(_, order)| {
            Ok(OrderListing {
                user: summary(db, order.user_id)?,
                order,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Analytics {
        revenue_by_date,
        orders_by_date,
        revenue_by_product,
        user_growth,
        collective: CollectiveAnalytics {
            total_applications: applications.len(),
            approved_applications: approved,
            active_members: users.iter().filter(|u| u.is_collective_member).count(),
            approval_rate,
        },
        downloads,
        recent_orders,
    })
}

/// Everything known about a single user, without credentials.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserSummary,
    pub owns_freebie: bool,
    pub subscribed: bool,
    pub collective_approved_at: Option<DateTime<Utc>>,
    pub collective_membership_type: Option<MembershipType>,
    pub created_at: DateTime<Utc>,
    /// Newest first
    pub orders: Vec<Order>,
    pub applications: Vec<Application>,
    pub pdf_downloads: Vec<PdfDownload>,
}

impl UserDetail {
    fn new(
        user: &User,
        orders: Vec<Order>,
        applications: Vec<Application>,
        pdf_downloads: Vec<PdfDownload>,
    ) -> Self {
        Self {
            user: UserSummary::from(user),
            owns_freebie: user.owns_freebie,
            subscribed: user.subscribed,
            collective_approved_at: user.collective_approved_at,
            collective_membership_type: user.collective_membership_type,
            created_at: user.created_at,
            orders,
            applications,
            pdf_downloads,
        }
    }
}

pub fn user_detail(db: &Database, id: UserId) -> Result<UserDetail> {
    let user = db
        .find::<User>(id)?
        .ok_or_else(|| ErrorKind::NotFound(format!("user {id}")))?;

    let mut orders = db
        .get_collection::<Order>()?
        .into_iter()
        .filter(|o| o.user_id == id)
        .collect::<Vec<_>>();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let applications = collective::applications(db, None)?
        .into_iter()
        .filter(|a| a.user_id == id)
        .collect();
    let mut downloads = db
        .get_collection::<PdfDownload>()?
        .into_iter()
        .filter(|d| d.user_id == id)
        .collect::<Vec<_>>();
    downloads.sort_by(|a, b| b.time.cmp(&a.time));

    Ok(UserDetail::new(&user, orders, applications, downloads))
}

/// Manual entitlement changes. Fields left out are not touched.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub owns_guide: Option<bool>,
    pub owns_planner: Option<bool>,
    pub is_collective_member: Option<bool>,
}

/// Applies the update to the user's flags. Unlike purchases this can also
/// take product access away.
pub fn update_user(db: &Database, id: UserId, update: &UserUpdate) -> Result<UserSummary> {
    let now = Utc::now();
    match db.modify::<User, _>(id, |u| {
        if let Some(owns) = update.owns_guide {
            u.owns_guide = owns;
        }
        if let Some(owns) = update.owns_planner {
            u.owns_planner = owns;
        }
        if let Some(member) = update.is_collective_member {
            u.set_collective_access(member, now);
        }
        true
    })? {
        Modified::Changed(user) | Modified::Unchanged(user) => {
            tracing::info!(user = %id, ?update, "user updated");
            Ok(UserSummary::from(&user))
        }
        Modified::Missing => Err(ErrorKind::NotFound(format!("user {id}")).into()),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct UploadedPdf {
    pub filename: String,
    pub size: usize,
}

/// Stores the file delivered for one of the downloadable products,
/// replacing the previous one.
pub async fn upload_pdf(config: &Config, kind: &str, bytes: &[u8]) -> Result<UploadedPdf> {
    let file_name = kind
        .parse::<ProductId>()
        .ok()
        .filter(|p| matches!(p, ProductId::Guide | ProductId::Planner | ProductId::Freebie))
        .and_then(download::file_name)
        .ok_or_else(|| ErrorKind::BadInput(format!("invalid pdf type: {kind}")))?;

    let dir = Path::new(&config.storage.pdfs);
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(file_name), bytes).await?;
    tracing::info!(file = file_name, size = bytes.len(), "pdf uploaded");

    Ok(UploadedPdf {
        filename: file_name.to_string(),
        size: bytes.len(),
    })
}
