mod sled;

use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::Result;

pub use self::sled::{SledDb as Database, Tx, TxResult};

pub trait Identifiable {
    fn get_id(&self) -> Uuid;
}

pub trait Collectable {
    fn get_collection_name() -> &'static str;
}

/// Outcome of an atomic read-modify-write performed with
/// [`Database::modify`].
#[derive(Clone, Debug)]
pub enum Modified<T> {
    /// No entry with the given id exists.
    Missing,
    /// The entry exists but the modification declined to change it.
    Unchanged(T),
    /// The modification was applied and persisted.
    Changed(T),
}

impl<T> Modified<T> {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }

    /// Returns the current value of the entry, if it exists.
    pub fn into_inner(self) -> Option<T> {
        match self {
            Self::Missing => None,
            Self::Unchanged(t) | Self::Changed(t) => Some(t),
        }
    }
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let t: T = pot::from_slice(bytes)?;
    Ok(t)
}

pub fn encode<T: serde::Serialize>(item: &T) -> Result<Vec<u8>> {
    let bytes = pot::to_vec(item)?;
    Ok(bytes)
}
