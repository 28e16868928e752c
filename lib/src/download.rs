//! Downloadable product files.
//!
//! Every authorized download is recorded, which feeds the admin activity
//! reporting.

use std::path::Path;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{Collectable, Database, Identifiable};
use crate::product::ProductId;
use crate::user::{self, User, UserId};
use crate::{Config, ErrorKind, Result};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PdfDownload {
    pub id: Uuid,
    pub user_id: UserId,
    pub product: ProductId,
    pub time: DateTime<Utc>,
}

impl Collectable for PdfDownload {
    fn get_collection_name() -> &'static str {
        "pdf_download"
    }
}

impl Identifiable for PdfDownload {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

/// Name of the file delivered for the product, if the product comes with
/// one.
pub fn file_name(product: ProductId) -> Option<&'static str> {
    match product {
        ProductId::Guide => Some("The_Mindful_Musicpreneur_Guide.pdf"),
        ProductId::Planner => Some("The_Mindful_Muse_Quarterly_Planner.pdf"),
        ProductId::Freebie => Some("Mindful_Musicpreneur_Freebie.pdf"),
        _ => None,
    }
}

/// Checks the user's access flags, returning the file name to deliver.
///
/// Owning the Guide also unlocks the Planner.
pub fn authorize(user: &User, product: ProductId) -> Result<&'static str> {
    let Some(file_name) = file_name(product) else {
        return Err(ErrorKind::BadInput(format!("no download for product {product}")).into());
    };
    let allowed = match product {
        ProductId::Guide => user.owns_guide,
        ProductId::Planner => user.owns_planner || user.owns_guide,
        ProductId::Freebie => user.owns_freebie,
        _ => false,
    };
    if !allowed {
        return Err(ErrorKind::Forbidden.into());
    }
    Ok(file_name)
}

/// Contents handed to the downloading user.
#[derive(Debug)]
pub enum Delivery {
    File {
        file_name: &'static str,
        bytes: Vec<u8>,
    },
    /// File was not uploaded yet
    Unavailable {
        product: ProductId,
        file_name: &'static str,
    },
}

/// Authorizes and records the download, then reads the file from storage.
pub async fn download(
    db: &Database,
    config: &Config,
    user: &User,
    product: ProductId,
) -> Result<Delivery> {
    let file_name = authorize(user, product)?;

    db.set(&PdfDownload {
        id: Uuid::new_v4(),
        user_id: user.id,
        product,
        time: Utc::now(),
    })?;

    let path = Path::new(&config.storage.pdfs).join(file_name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            tracing::info!(user = %user.id, %product, "serving download");
            Ok(Delivery::File { file_name, bytes })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "download file missing from storage");
            Ok(Delivery::Unavailable { product, file_name })
        }
        Err(e) => Err(e.into()),
    }
}

/// Freebie download through the link sent by email, no login required.
pub async fn freebie_by_email(db: &Database, config: &Config, email: &str) -> Result<Delivery> {
    let user = user::find_by_email(db, email)?.ok_or(ErrorKind::Forbidden)?;
    download(db, config, &user, ProductId::Freebie).await
}

pub fn count_for_user(db: &Database, user_id: UserId) -> Result<usize> {
    Ok(db
        .get_collection::<PdfDownload>()?
        .iter()
        .filter(|d| d.user_id == user_id)
        .count())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.storage.pdfs = dir.to_string_lossy().to_string();
        config
    }

    #[test]
    fn guide_unlocks_planner() {
        let mut user = User::new("a@x.com", "Ada");
        assert!(matches!(
            authorize(&user, ProductId::Planner).unwrap_err().kind,
            ErrorKind::Forbidden
        ));
        user.owns_guide = true;
        assert!(authorize(&user, ProductId::Planner).is_ok());
        assert!(authorize(&user, ProductId::Freebie).is_err());
        assert!(matches!(
            authorize(&user, ProductId::Bogo).unwrap_err().kind,
            ErrorKind::BadInput(_)
        ));
    }

    #[tokio::test]
    async fn downloads_are_recorded() {
        let dir = std::env::temp_dir().join(format!("musicpreneur-pdfs-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("The_Mindful_Muse_Quarterly_Planner.pdf"), b"%PDF")
            .await
            .unwrap();
        let config = config(&dir);
        let db = Database::temporary().unwrap();
        let mut user = User::new("a@x.com", "Ada");
        user.owns_guide = true;
        user.owns_planner = true;

        match download(&db, &config, &user, ProductId::Planner).await.unwrap() {
            Delivery::File { bytes, .. } => assert_eq!(bytes, b"%PDF"),
            other => panic!("unexpected delivery: {other:?}"),
        }
        assert!(matches!(
            download(&db, &config, &user, ProductId::Guide).await.unwrap(),
            Delivery::Unavailable { .. }
        ));
        assert!(download(&db, &config, &user, ProductId::Freebie).await.is_err());
        assert_eq!(count_for_user(&db, user.id).unwrap(), 2);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
