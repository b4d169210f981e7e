//! Key/value storage seams standing in for `localStorage` and `sessionStorage`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Error type returned by storage and cookie seams.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Storage is disabled or throws on access.
    Unavailable(String),
    /// The backing file could not be read or written.
    Io(String),
    /// A stored value could not be encoded or decoded.
    Format(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
            Self::Io(message) => write!(f, "storage io: {message}"),
            Self::Format(message) => write!(f, "storage format: {message}"),
        }
    }
}

impl Error for StorageError {}

/// String key/value store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON value. Missing keys are `Ok(None)`.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| StorageError::Format(err.to_string()))
}

pub fn write_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|err| StorageError::Format(err.to_string()))?;
    store.set(key, &raw)
}

/// In-memory store. Can be switched to unavailable to model a throwing storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
    unavailable: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<'entry>(entries: impl IntoIterator<Item = (&'entry str, &'entry str)>) -> Self {
        let store = Self::default();
        store.entries.borrow_mut().extend(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_owned(), value.to_owned())),
        );
        store
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    /// Direct read that bypasses the availability switch.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.get() {
            Err(StorageError::Unavailable(String::from("store disabled")))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// A store whose every access fails, as in private browsing modes that throw.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable(String::from("access denied")))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable(String::from("access denied")))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable(String::from("access denied")))
    }
}

/// Durable store persisted as one JSON object on disk. Every write rewrites the file,
/// so a later page load sees the state left by the previous one.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|err| StorageError::Format(format!("{}: {err}", path.display())))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(StorageError::Io(err.to_string())),
        };
        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StorageError> {
        let raw = serde_json::to_string_pretty(&*self.entries.borrow())
            .map_err(|err| StorageError::Format(err.to_string()))?;
        fs::write(&self.path, raw).map_err(|err| StorageError::Io(err.to_string()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        self.flush()
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_switches_to_unavailable() {
        let store = MemoryStore::with_entries([("k", "v")]);
        assert_eq!(store.get("k").ok().flatten().as_deref(), Some("v"));
        store.set_unavailable(true);
        assert!(store.get("k").is_err());
        assert!(store.set("k", "w").is_err());
        assert_eq!(store.peek("k").as_deref(), Some("v"));
    }

    #[test]
    fn json_helpers_report_format_errors() {
        let store = MemoryStore::with_entries([("bad", "{not json")]);
        let decoded: Result<Option<Vec<String>>, _> = read_json(&store, "bad");
        assert!(matches!(decoded, Err(StorageError::Format(_))));
        let missing: Result<Option<Vec<String>>, _> = read_json(&store, "missing");
        assert!(matches!(missing, Ok(None)));
    }

    #[test]
    fn file_store_survives_reopen() -> Result<(), StorageError> {
        let dir = tempfile::tempdir().map_err(|err| StorageError::Io(err.to_string()))?;
        let path = dir.path().join("state.json");
        {
            let store = JsonFileStore::open(&path)?;
            store.set("ab015_vid", "vid_123456789")?;
            store.set("gone", "x")?;
            store.remove("gone")?;
        }
        let reopened = JsonFileStore::open(&path)?;
        assert_eq!(reopened.get("ab015_vid")?.as_deref(), Some("vid_123456789"));
        assert_eq!(reopened.get("gone")?, None);
        Ok(())
    }
}
