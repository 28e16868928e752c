use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    abort, ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::Transactional;
use uuid::Uuid;

use crate::error::{Error, ErrorKind};
use crate::Result;

use super::{decode, encode, Collectable, Identifiable, Modified};

#[derive(Clone, Debug)]
pub struct SledDb {
    inner: sled::Db,
}

impl SledDb {
    /// Opens (or creates) the database at the provided path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let inner = sled::Config::default().path(path).open()?;
        Ok(Self { inner })
    }

    /// Creates a database that is removed from disk once dropped.
    pub fn temporary() -> Result<Self> {
        let inner = sled::Config::default().temporary(true).open()?;
        Ok(Self { inner })
    }

    pub fn get_collection<T: DeserializeOwned + Collectable>(&self) -> Result<Vec<T>> {
        self.get_collection_at(T::get_collection_name())
    }

    /// Gets a collection of entries of the same type from the collection
    /// specified by name.
    pub fn get_collection_at<T: DeserializeOwned>(&self, name: impl AsRef<[u8]>) -> Result<Vec<T>> {
        let tree = self.inner.open_tree(name)?;
        let mut out = Vec::new();
        for entry in tree.iter() {
            let (_, value_bytes) = entry?;
            out.push(decode(&value_bytes)?);
        }
        Ok(out)
    }

    /// Returns the length of the collection as defined for the specified type.
    pub fn len<T: Collectable>(&self) -> Result<usize> {
        Ok(self.inner.open_tree(T::get_collection_name())?.len())
    }

    /// Gets an item from the collection defined for the item type, failing
    /// if it doesn't exist.
    pub fn get<T: DeserializeOwned + Collectable>(&self, id: Uuid) -> Result<T> {
        self.find(id)?.ok_or_else(|| {
            ErrorKind::NotFound(format!(
                "entity with id '{}' not found in collection {}",
                id,
                T::get_collection_name()
            ))
            .into()
        })
    }

    /// Gets an item from the collection defined for the item type.
    pub fn find<T: DeserializeOwned + Collectable>(&self, id: Uuid) -> Result<Option<T>> {
        self.find_at(T::get_collection_name(), id)
    }

    /// Gets an item by key from the collection specified by name.
    pub fn find_at<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: impl AsRef<[u8]>,
    ) -> Result<Option<T>> {
        let tree = self.inner.open_tree(collection)?;
        match tree.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + Identifiable + Collectable>(&self, value: &T) -> Result<()> {
        self.set_raw_at(T::get_collection_name(), value, value.get_id())
    }

    pub fn set_raw_at<T: Serialize>(
        &self,
        collection: impl AsRef<[u8]>,
        value: &T,
        key: impl AsRef<[u8]>,
    ) -> Result<()> {
        let tree = self.inner.open_tree(collection)?;
        let encoded = encode(value)?;
        tree.insert(key, encoded)?;
        Ok(())
    }

    /// Stores the value under the key only if the key is not taken yet.
    /// Returns false if an entry already existed.
    pub fn insert_new_at<T: Serialize>(
        &self,
        collection: &str,
        key: impl AsRef<[u8]>,
        value: &T,
    ) -> Result<bool> {
        let tree = self.inner.open_tree(collection)?;
        let encoded = encode(value)?;
        let swapped = tree.compare_and_swap(key, None as Option<&[u8]>, Some(encoded))?;
        Ok(swapped.is_ok())
    }

    pub fn remove<T: Identifiable + Collectable>(&self, value: &T) -> Result<()> {
        let tree = self.inner.open_tree(T::get_collection_name())?;
        tree.remove(value.get_id())?;
        Ok(())
    }

    pub fn remove_at(&self, collection: &str, key: impl AsRef<[u8]>) -> Result<()> {
        let tree = self.inner.open_tree(collection)?;
        tree.remove(key)?;
        Ok(())
    }

    pub fn clear<T: Collectable>(&self) -> Result<()> {
        let tree = self.inner.open_tree(T::get_collection_name())?;
        tree.clear()?;
        Ok(())
    }

    /// Atomically applies `f` to the stored item with the given id.
    ///
    /// `f` returns whether it changed the item. The write is a
    /// compare-and-swap against the bytes that were read, so if another
    /// writer got in between, the item is re-read and `f` runs again on
    /// the fresh value. Two concurrent callers can therefore never both
    /// observe the same state and both apply a transition.
    pub fn modify<T, F>(&self, id: Uuid, f: F) -> Result<Modified<T>>
    where
        T: Serialize + DeserializeOwned + Collectable,
        F: FnMut(&mut T) -> bool,
    {
        self.modify_at(T::get_collection_name(), id, f)
    }

    pub fn modify_at<T, F>(&self, collection: &str, key: impl AsRef<[u8]>, mut f: F) -> Result<Modified<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T) -> bool,
    {
        let tree = self.inner.open_tree(collection)?;
        let key = key.as_ref();
        loop {
            let Some(current) = tree.get(key)? else {
                return Ok(Modified::Missing);
            };
            let mut value: T = decode(&current)?;
            if !f(&mut value) {
                return Ok(Modified::Unchanged(value));
            }
            let encoded = encode(&value)?;
            match tree.compare_and_swap(key, Some(&current), Some(encoded))? {
                Ok(()) => return Ok(Modified::Changed(value)),
                Err(_) => {
                    log::trace!("concurrent write on {collection}, retrying");
                    continue;
                }
            }
        }
    }

    /// Stores a new item while claiming `key` in the `index` tree, both in a
    /// single transaction. Fails with a conflict if the key is already
    /// claimed by another item.
    pub fn insert_unique<T>(&self, index: &str, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Identifiable + Collectable,
    {
        let items = self.inner.open_tree(T::get_collection_name())?;
        let index_tree = self.inner.open_tree(index)?;
        let id = value.get_id().as_bytes().to_vec();
        let encoded = encode(value)?;

        (&items, &index_tree)
            .transaction(|(items, index_tree)| -> ConflictableTransactionResult<(), ()> {
                if index_tree.get(key)?.is_some() {
                    return abort(());
                }
                index_tree.insert(key, id.clone())?;
                items.insert(id.clone(), encoded.clone())?;
                Ok(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(()) => {
                    ErrorKind::Conflict(format!("{index} '{key}' already taken")).into()
                }
                TransactionError::Storage(e) => {
                    ErrorKind::SledTransactionError(e.to_string()).into()
                }
            })
    }

    /// Runs `f` atomically over the named collections.
    ///
    /// Either every write made through the [`Tx`] is committed or none is.
    /// `f` is re-run when a concurrent writer conflicts with it, so it must
    /// not have effects outside the transaction.
    pub fn transaction<R>(
        &self,
        collections: &[&str],
        f: impl Fn(&Tx) -> TxResult<R>,
    ) -> Result<R> {
        let trees = collections
            .iter()
            .map(|name| self.inner.open_tree(name))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        trees
            .as_slice()
            .transaction(|views| {
                f(&Tx {
                    names: collections,
                    trees: views,
                })
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => ErrorKind::SledTransactionError(e.to_string()).into(),
            })
    }

    /// Looks up an item through a unique index maintained with
    /// [`SledDb::insert_unique`].
    pub fn find_by_index<T>(&self, index: &str, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Collectable,
    {
        let index_tree = self.inner.open_tree(index)?;
        match index_tree.get(key)? {
            Some(id) => self.find(Uuid::from_slice(&id)?),
            None => Ok(None),
        }
    }
}

pub type TxResult<T> = ConflictableTransactionResult<T, Error>;

fn aborted(e: impl Into<Error>) -> ConflictableTransactionError<Error> {
    ConflictableTransactionError::Abort(e.into())
}

/// Typed access to the collections taking part in a
/// [`SledDb::transaction`]. Reads see the writes made earlier in the same
/// transaction.
pub struct Tx<'a> {
    names: &'a [&'a str],
    trees: &'a [TransactionalTree],
}

impl Tx<'_> {
    fn tree(&self, collection: &str) -> TxResult<&TransactionalTree> {
        match self.names.iter().position(|name| *name == collection) {
            Some(i) => Ok(&self.trees[i]),
            None => abort(
                ErrorKind::DbError(format!("collection {collection} is not part of the transaction"))
                    .into(),
            ),
        }
    }

    pub fn find<T: DeserializeOwned + Collectable>(&self, id: Uuid) -> TxResult<Option<T>> {
        match self.tree(T::get_collection_name())?.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes).map_err(aborted)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + Identifiable + Collectable>(&self, value: &T) -> TxResult<()> {
        let encoded = encode(value).map_err(aborted)?;
        self.tree(T::get_collection_name())?
            .insert(value.get_id().as_bytes().to_vec(), encoded)?;
        Ok(())
    }

    pub fn find_by_index<T: DeserializeOwned + Collectable>(
        &self,
        index: &str,
        key: &str,
    ) -> TxResult<Option<T>> {
        match self.tree(index)?.get(key)? {
            Some(id) => self.find(Uuid::from_slice(&id).map_err(aborted)?),
            None => Ok(None),
        }
    }

    /// Stores a new item and claims `key` for it in the `index` tree.
    /// Returns false without writing anything if the key is taken.
    pub fn insert_unique<T: Serialize + Identifiable + Collectable>(
        &self,
        index: &str,
        key: &str,
        value: &T,
    ) -> TxResult<bool> {
        let index_tree = self.tree(index)?;
        if index_tree.get(key)?.is_some() {
            return Ok(false);
        }
        index_tree.insert(key, value.get_id().as_bytes().to_vec())?;
        self.set(value)?;
        Ok(true)
    }
}
