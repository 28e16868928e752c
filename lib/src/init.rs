//! Data initialization procedures.
//!
//! The app config can list users expected to exist after the application is
//! started, e.g. the store owner's own account.

use crate::user::{self, Access, User};
use crate::{auth, Config, Database, Result};

/// Initializes database state based on the configuration.
pub fn initialize(config: &Config, db: &Database) -> Result<()> {
    users(config, db)
}

/// Creates users listed in the configuration. Existing users only get
/// their access flags raised, their password is never overwritten.
pub fn users(config: &Config, db: &Database) -> Result<()> {
    for entry in &config.users {
        let access = Access {
            guide: entry.owns_guide,
            planner: entry.owns_planner || entry.owns_guide,
            freebie: false,
        };
        let (user, created) = user::find_or_create(db, &entry.email, |email| {
            let mut user = User::new(email, &entry.first_name);
            user.last_name = entry.last_name.clone();
            if let Some(password) = &entry.password {
                user.password_hash = Some(auth::hash_password(password)?);
            }
            user.grant(access);
            Ok(user)
        })?;
        if created {
            log::info!("created user {} from config", user.email);
        } else if !access.is_empty() {
            user::grant_access(db, user.id, access)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    #[test]
    fn config_users_are_created_once() {
        let db = Database::temporary().unwrap();
        let config = Config {
            users: vec![config::User {
                email: "Owner@x.com".to_string(),
                first_name: "Owner".to_string(),
                password: Some("password123".to_string()),
                owns_guide: true,
                ..Default::default()
            }],
            ..Default::default()
        };

        initialize(&config, &db).unwrap();
        initialize(&config, &db).unwrap();

        let users = db.get_collection::<User>().unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].owns_guide && users[0].owns_planner);
        assert!(auth::login::log_in("owner@x.com", "password123", &db).is_ok());
    }
}
