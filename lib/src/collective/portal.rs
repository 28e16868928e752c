//! Member portal content, editable by admins.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::user::User;
use crate::{Config, ErrorKind, Result};

pub const COLLECTION: &str = "portal_content";

pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome to The Collective! This is your space for \
    real talk, radical responsibility, and supporting each other's wins.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::AsRefStr, strum::EnumIter, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Key {
    ZoomUrl,
    WelcomeMessage,
    SubstackUrl,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Entry {
    pub key: String,
    pub value: String,
    /// Email of the admin who last changed the value
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

fn value(db: &Database, key: Key) -> Result<Option<String>> {
    Ok(db
        .find_at::<Entry>(COLLECTION, key.as_ref())?
        .map(|e| e.value)
        .filter(|v| !v.is_empty()))
}

/// Portal content as seen by members.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalView {
    pub zoom_url: String,
    pub welcome_message: String,
    pub substack_url: String,
}

/// Reads the portal content, available to Collective members only.
pub fn for_member(db: &Database, config: &Config, user: &User) -> Result<PortalView> {
    if !user.is_collective_member {
        return Err(ErrorKind::Forbidden.into());
    }
    Ok(PortalView {
        zoom_url: value(db, Key::ZoomUrl)?.unwrap_or_default(),
        welcome_message: value(db, Key::WelcomeMessage)?
            .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string()),
        substack_url: value(db, Key::SubstackUrl)?
            .unwrap_or_else(|| config.email.substack_url.clone()),
    })
}

/// All stored entries as a key-value map.
pub fn all(db: &Database) -> Result<BTreeMap<String, String>> {
    Ok(db
        .get_collection_at::<Entry>(COLLECTION)?
        .into_iter()
        .map(|e| (e.key, e.value))
        .collect())
}

/// Partial update of the portal content. Keys left out stay untouched.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalUpdate {
    #[serde(alias = "zoomUrl")]
    pub zoom_url: Option<String>,
    #[serde(alias = "welcomeMessage")]
    pub welcome_message: Option<String>,
    #[serde(alias = "substackUrl")]
    pub substack_url: Option<String>,
}

pub fn update(db: &Database, update: PortalUpdate, admin: &str) -> Result<()> {
    let now = Utc::now();
    let changes = [
        (Key::ZoomUrl, update.zoom_url),
        (Key::WelcomeMessage, update.welcome_message),
        (Key::SubstackUrl, update.substack_url),
    ];
    for (key, value) in changes {
        let Some(value) = value else { continue };
        let entry = Entry {
            key: key.as_ref().to_string(),
            value,
            updated_by: admin.to_string(),
            updated_at: now,
        };
        db.set_raw_at(COLLECTION, &entry, key.as_ref())?;
        tracing::info!(key = key.as_ref(), %admin, "portal content updated");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_see_defaults_and_updates() {
        let db = Database::temporary().unwrap();
        let config = Config::default();
        let mut user = User::new("a@x.com", "Ada");

        assert!(matches!(
            for_member(&db, &config, &user).unwrap_err().kind,
            ErrorKind::Forbidden
        ));

        user.is_collective_member = true;
        let view = for_member(&db, &config, &user).unwrap();
        assert_eq!(view.zoom_url, "");
        assert_eq!(view.welcome_message, DEFAULT_WELCOME_MESSAGE);
        assert_eq!(view.substack_url, config.email.substack_url);

        update(
            &db,
            PortalUpdate {
                zoom_url: Some("https://zoom.us/j/1".to_string()),
                ..Default::default()
            },
            "admin@x.com",
        )
        .unwrap();
        let view = for_member(&db, &config, &user).unwrap();
        assert_eq!(view.zoom_url, "https://zoom.us/j/1");

        let stored = all(&db).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored["zoom_url"], "https://zoom.us/j/1");
    }
}
