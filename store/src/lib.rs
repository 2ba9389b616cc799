#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Key-value persistence for Tower Catch.
//!
//! The only durable medium is an unstructured string store without
//! transactions. [`KeyValueStore`] abstracts that medium with one in-memory
//! implementation for tests and ephemeral sessions and one file-backed
//! implementation that writes every key through a temporary file followed by
//! a rename, so a value is either fully replaced or left untouched.
//! [`Repository`] layers typed records, account namespacing, legacy fallback
//! and corrupt-record recovery on top.

mod repository;

use std::{
    collections::BTreeMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

pub use repository::{AccountRecord, RankLists, RecordKind, Repository};

/// Errors raised by a [`KeyValueStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying file system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A value could not be encoded for storage.
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    /// The store refused the write, for example because its quota is exhausted.
    #[error("store rejected write to `{key}`")]
    Rejected {
        /// Key whose write was refused.
        key: String,
    },
}

/// Synchronous whole-value string storage.
pub trait KeyValueStore {
    /// Reads the value stored under `key`, or `None` when absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replaces the value stored under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes `key`; deleting an absent key succeeds.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// Volatile store that keeps every key in memory.
///
/// Writes can be switched to fail so callers can exercise quota exhaustion.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    reject_writes: bool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with raw entries.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            reject_writes: false,
        }
    }

    /// Makes every subsequent `set` and `remove` fail until switched back.
    pub fn reject_writes(&mut self, reject: bool) {
        self.reject_writes = reject;
    }

    /// Raw view of every stored entry.
    #[must_use]
    pub fn snapshot(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.reject_writes {
            return Err(StoreError::Rejected {
                key: key.to_owned(),
            });
        }
        let _ = self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.reject_writes {
            return Err(StoreError::Rejected {
                key: key.to_owned(),
            });
        }
        let _ = self.entries.remove(key);
        Ok(())
    }
}

/// Durable store keeping one file per key inside a directory.
///
/// File names are the hex encoding of the key, so arbitrary account names map
/// onto portable paths.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens the store rooted at `root`, creating the directory when missing.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the stored values.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.value", hex::encode(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let temp_path = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
