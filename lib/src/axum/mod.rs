//! HTTP surface built with axum.
//!
//! Shared state is provided to handlers through request extensions, the
//! router state itself only carries the key used for private cookies.

pub mod admin;
pub mod auth;
pub mod checkout;
pub mod collective;
pub mod download;
pub mod error;
pub mod extract;
pub mod mailing;
#[cfg(feature = "stripe")]
pub mod stripe;

pub use extract::user::{Admin, User};

use std::sync::Arc;

use axum::Extension;
use tower_http::trace::TraceLayer;

use crate::email::Mailer;
use crate::payment::PaymentGateway;
use crate::Result;
use crate::{Config, Database};

pub type Router = axum::Router<cookie::Key>;

pub type ConfigExt = Extension<Arc<Config>>;
pub type DbExt = Extension<Arc<Database>>;
pub type MailerExt = Extension<Arc<dyn Mailer>>;
pub type GatewayExt = Extension<Arc<dyn PaymentGateway>>;

/// Collects all the application routes.
pub fn router() -> Router {
    let router = Router::new()
        .merge(auth::router())
        .merge(checkout::router())
        .merge(download::router())
        .merge(mailing::router())
        .merge(collective::router())
        .merge(admin::router());
    #[cfg(feature = "stripe")]
    let router = router.merge(stripe::router());
    router
}

/// Application state shared by all handlers.
pub struct State {
    pub config: Config,
    pub db: Database,
    pub mailer: Arc<dyn Mailer>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub cookie_key: cookie::Key,
}

/// Puts together the complete application, ready to be served.
pub fn app(state: State) -> axum::Router {
    router()
        .layer(Extension(state.gateway))
        .layer(Extension(state.mailer))
        .layer(Extension(Arc::new(state.config)))
        .layer(Extension(Arc::new(state.db)))
        .layer(TraceLayer::new_for_http())
        .with_state(state.cookie_key)
}

/// Gets the persisted cookie key, generating one on first use.
///
/// In dev mode the key only lives in memory until the application is
/// restarted.
fn cookie_key(config: &Config, db: &Database) -> Result<cookie::Key> {
    if config.dev.enabled {
        return Ok(cookie::Key::generate());
    }
    const COLLECTION: &str = "cookie_keys";
    if let Some(bytes) = db.find_at::<Vec<u8>>(COLLECTION, uuid::Uuid::nil())? {
        if let Ok(key) = cookie::Key::try_from(bytes.as_slice()) {
            return Ok(key);
        }
        log::warn!("stored cookie key is invalid, generating a new one");
    }
    let key = cookie::Key::generate();
    db.set_raw_at(COLLECTION, &key.master().to_vec(), uuid::Uuid::nil())?;
    Ok(key)
}

fn gateway(config: &Config) -> Arc<dyn PaymentGateway> {
    if config.dev.enabled && config.dev.mock {
        log::warn!("dev mock mode, checkouts won't reach the payment processor");
        return Arc::new(crate::mock::FakeGateway::default());
    }
    #[cfg(feature = "stripe")]
    {
        Arc::new(crate::payment::stripe::StripeGateway::from_config(config))
    }
    #[cfg(not(feature = "stripe"))]
    {
        log::warn!("compiled without stripe support, using a fake payment gateway");
        Arc::new(crate::mock::FakeGateway::default())
    }
}

/// Initializes application state and starts the web server.
pub async fn start(config: Config) -> Result<()> {
    crate::tracing::init(&config).unwrap_or_else(|e| {
        log::warn!("failed to initialize tracing (perhaps it was already initialized?): {e}")
    });

    let db = Database::open(&config.db.path)?;
    crate::init::initialize(&config, &db)?;

    if config.dev.enabled && config.dev.mock {
        crate::mock::generate(&config, &db)?;
    }

    let mailer: Arc<dyn Mailer> = Arc::from(crate::email::from_config(&config)?);
    let state = State {
        cookie_key: cookie_key(&config, &db)?,
        gateway: gateway(&config),
        mailer,
        db,
        config,
    };
    let addr = state.config.address;

    tracing::info!("starting server at {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
