use std::net::SocketAddr;

use serde::de::DeserializeOwned;

use crate::product::{self, Product};
use crate::Result;

pub static CONFIG_FILE: &str = "musicpreneur.toml";

/// Application configuration.
///
/// # Sensible defaults
///
/// Configuration provided through `Config::default()` allows running the
/// application locally without any config file present. Emails are logged
/// instead of sent and the product catalog contains the standard set of
/// products.
///
/// Using the *struct update syntax* one can initialize a new `Config`, making
/// a few changes right in the definition.
///
/// ```ignore
/// let cfg = Config {
///     admins: vec!["owner@example.com".to_string()],
///     ..Default::default()
/// }
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub name: String,
    pub version: String,

    /// Domain name pointing to the machine running the application.
    pub domain: String,
    /// Public base url used for links in emails and checkout redirects.
    pub app_url: String,
    /// Address on which to serve the application. Defaults to
    /// `127.0.0.1:8080`.
    pub address: SocketAddr,

    pub db: Db,
    pub tracing: Tracing,
    pub email: Email,
    pub payments: Payments,
    pub storage: Storage,

    /// Emails of users allowed to access the admin back-office.
    ///
    /// There are no roles beyond this allow-list: an admin can do
    /// everything, everyone else can do nothing admin-related.
    pub admins: Vec<String>,

    /// Catalog of products available in the store.
    pub products: Vec<Product>,

    /// List of initial users.
    pub users: Vec<User>,

    /// Development mode configuration.
    pub dev: DevMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            domain: "localhost".to_string(),
            app_url: "http://localhost:8080".to_string(),
            address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db: Db::default(),
            tracing: Tracing::default(),
            email: Email::default(),
            payments: Payments::default(),
            storage: Storage::default(),
            admins: vec![],
            products: product::catalog(),
            users: vec![],
            dev: DevMode::default(),
        }
    }
}

impl Config {
    /// Checks the provided email against the admin allow-list.
    pub fn is_admin(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admins.iter().any(|a| a.trim().to_lowercase() == email)
    }

    /// Builds an absolute application url from the provided path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.app_url.trim_end_matches('/'), path)
    }
}

/// Loads application config from toml file at default location.
pub fn load<T: DeserializeOwned>() -> Result<T> {
    load_from(CONFIG_FILE)
}

/// Loads application config from toml file at standard path using provided
/// name.
///
/// For example for `name` == `musicpreneur.toml` we will load both
/// `musicpreneur.toml` and `secret.musicpreneur.toml` from the main project
/// directory. Environment variables override both, e.g.
/// `EMAIL__SMTP_PASSWORD`.
pub fn load_from<T: DeserializeOwned>(name: impl AsRef<str>) -> Result<T> {
    let config = config::Config::builder()
        .add_source(config::File::with_name(name.as_ref()).required(false))
        .add_source(config::File::with_name(&format!("secret.{}", name.as_ref())).required(false))
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix_separator("__"),
        )
        .build()?;

    let config: T = config.try_deserialize()?;

    Ok(config)
}

/// Intermediate abstraction for initiating a user from configuration.
#[derive(Clone, Default, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct User {
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    /// Plain text password, hashed before being stored.
    pub password: Option<String>,
    pub owns_guide: bool,
    pub owns_planner: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Db {
    /// Path to the database directory, relative to current working
    /// directory.
    pub path: String,
}

impl Default for Db {
    fn default() -> Self {
        Self {
            path: "db".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Tracing {
    pub enabled: bool,

    pub mode: crate::tracing::Mode,
    pub level: crate::tracing::Level,

    pub loki_address: String,
}

impl Default for Tracing {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: crate::tracing::Mode::default(),
            level: crate::tracing::Level::default(),
            loki_address: "".to_string(),
        }
    }
}

/// NOTE: make sure to disable on production.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DevMode {
    /// Global switch for all dev mode items.
    pub enabled: bool,
    /// Automatic login flag. Includes the email of the user to be logged in.
    pub autologin: Option<String>,
    /// Populate the database with mock data and complete checkouts locally
    /// instead of going through the payment processor.
    pub mock: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Payments {
    pub stripe: Stripe,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Stripe {
    /// Production secret, used with release builds
    pub secret: String,
    /// Test secret, used with debug builds
    pub test_secret: String,

    /// Production signing secret for verifing incoming webhook events
    pub signing_secret: String,
    /// Test signing secret for verifing incoming webhook events
    pub test_signing_secret: String,
}

impl Stripe {
    pub fn secret(&self) -> &str {
        if cfg!(debug_assertions) {
            &self.test_secret
        } else {
            &self.secret
        }
    }

    pub fn signing_secret(&self) -> &str {
        if cfg!(debug_assertions) {
            &self.test_signing_secret
        } else {
            &self.signing_secret
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Email {
    /// When disabled, messages are written to the log instead of being
    /// sent.
    pub enabled: bool,

    /// Address that the application will use to send emails.
    pub address: String,
    /// Display name used in the `From` header.
    pub sender_name: String,

    // Smtp server and credentials.
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,

    /// Link to the newsletter, mentioned in several of the messages.
    pub substack_url: String,
}

impl Default for Email {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "hello@themindfulmusicpreneur.com".to_string(),
            sender_name: "The Mindful Musicpreneur".to_string(),
            smtp_server: "".to_string(),
            smtp_port: 587,
            smtp_user: "".to_string(),
            smtp_password: "".to_string(),
            substack_url: "https://themindfulmusicpreneur.substack.com".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Storage {
    /// Directory containing the downloadable product files.
    pub pdfs: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            pdfs: "storage/pdfs".to_string(),
        }
    }
}
