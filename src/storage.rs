//! Persisted key/value session flags.
//!
//! The session remembers a few strings between runs: whether a wallet was
//! connected, which address was selected and the user's display preferences.
//! [`Storage`] is the seam; [`MemoryStorage`] keeps values for the life of the
//! process and [`FileStorage`] persists them as a JSON object on disk.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use anyhow::Context;

/// `"true"` while a wallet connection should be restored on startup.
pub const WALLET_CONNECTED: &str = "walletConnected";
/// Address of the selected account.
pub const SELECTED_ADDRESS: &str = "selectedWalletAddress";
/// Display currency code.
pub const SELECTED_CURRENCY: &str = "selectedCurrency";
/// Display language.
pub const SELECTED_LANGUAGE: &str = "selectedLanguage";
/// Legacy key, removed on disconnect.
pub const USER_EMAIL: &str = "userEmail";

/// A string key/value store.
///
/// Writes are best effort: a store that cannot persist a value logs the failure.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    fn values(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values().insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.values().remove(key);
    }
}

/// Storage backed by a JSON file.
///
/// The whole file is rewritten on every change, through a temporary file that is
/// renamed into place.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Opens the store at `path`, creating parent directories as needed.
    ///
    /// A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("unable to create {}", parent.display()))?;
        }

        let values = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("{} is not a JSON object of strings", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("unable to read {}", path.display()));
            }
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Returns the file backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) {
        let mut values = self
            .values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut values);

        if let Err(err) = self.flush(&values) {
            log::warn!("unable to persist {}: {err:#}", self.path.display());
        }
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.update(|values| {
            values.insert(key.to_owned(), value.to_owned());
        });
    }

    fn remove(&self, key: &str) {
        self.update(|values| {
            values.remove(key);
        });
    }
}

/// Currency and language the user picked for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPreferences {
    /// Currency code, `BRL` by default.
    pub currency: String,
    /// Language name, `English` by default.
    pub language: String,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            currency: "BRL".to_owned(),
            language: "English".to_owned(),
        }
    }
}

impl DisplayPreferences {
    /// Languages the interface is offered in.
    pub const LANGUAGES: [&'static str; 3] = ["English", "Português", "Español"];

    /// Loads saved preferences, falling back to the defaults per field.
    pub fn load(storage: &dyn Storage) -> Self {
        let defaults = Self::default();
        Self {
            currency: storage.get(SELECTED_CURRENCY).unwrap_or(defaults.currency),
            language: storage.get(SELECTED_LANGUAGE).unwrap_or(defaults.language),
        }
    }

    pub fn save(&self, storage: &dyn Storage) {
        storage.set(SELECTED_CURRENCY, &self.currency);
        storage.set(SELECTED_LANGUAGE, &self.language);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("polkapay-storage-{}-{name}", std::process::id()))
            .join("session.json")
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::default();
        assert!(storage.get(WALLET_CONNECTED).is_none());

        storage.set(WALLET_CONNECTED, "true");
        assert_eq!(storage.get(WALLET_CONNECTED).as_deref(), Some("true"));

        storage.remove(WALLET_CONNECTED);
        storage.remove(WALLET_CONNECTED);
        assert!(storage.get(WALLET_CONNECTED).is_none());
    }

    #[test]
    fn test_file_storage_persists() {
        let path = temp_path("persist");
        let _ = fs::remove_file(&path);

        let storage = FileStorage::open(&path).unwrap();
        storage.set(SELECTED_ADDRESS, "5Grwva");
        storage.set(USER_EMAIL, "user@example.com");
        storage.remove(USER_EMAIL);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(SELECTED_ADDRESS).as_deref(), Some("5Grwva"));
        assert!(reopened.get(USER_EMAIL).is_none());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_storage_rejects_garbage() {
        let path = temp_path("garbage");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();

        assert!(FileStorage::open(&path).is_err());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_display_preferences() {
        let storage = MemoryStorage::default();
        assert_eq!(DisplayPreferences::load(&storage), DisplayPreferences::default());

        let prefs = DisplayPreferences {
            currency: "USD".into(),
            language: DisplayPreferences::LANGUAGES[1].into(),
        };
        prefs.save(&storage);

        let loaded = DisplayPreferences::load(&storage);
        assert_eq!(loaded.currency, "USD");
        assert_eq!(loaded.language, "Português");
    }
}
