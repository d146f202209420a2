//! Storage backends for credentials and plain preferences
//!
//! Two contracts back everything the SDK persists:
//! - `SecureStore` for token-tier secrets (OS credential store)
//! - `KeyValueStore` for plain fields and identity documents
//!
//! Both are best-effort: a failed write never fails a login, it only
//! loses durability for the current value.

use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::auth::types::AuthError;

const SERVICE_NAME: &str = "AuthBridge";
const PREFERENCES_FILE: &str = "preferences.json";

/// Secure storage for token-tier secrets.
///
/// Implementations report success/failure but never panic; callers
/// treat a failed write as lost durability, not as a fatal error.
pub trait SecureStore: Send + Sync {
    fn save(&self, name: &str, value: &str) -> bool;
    fn load(&self, name: &str) -> Option<String>;
    /// Deleting an absent entry counts as success.
    fn delete(&self, name: &str) -> bool;
}

/// Plain key/value storage for non-secret fields.
pub trait KeyValueStore: Send + Sync {
    fn save(&self, name: &str, value: &str);
    fn load(&self, name: &str) -> Option<String>;
    fn remove(&self, name: &str);
}

/// OS credential store backend (Windows Credential Manager, macOS
/// Keychain, libsecret) via the `keyring` crate.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, name: &str) -> Option<keyring::Entry> {
        match keyring::Entry::new(&self.service, name) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Keyring entry for '{}' unavailable: {}", name, e);
                None
            }
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStore for KeyringStore {
    fn save(&self, name: &str, value: &str) -> bool {
        let Some(entry) = self.entry(name) else {
            return false;
        };
        match entry.set_password(value) {
            Ok(()) => {
                debug!("Stored '{}' in OS credential store", name);
                true
            }
            Err(e) => {
                warn!("Failed to store '{}' in OS credential store: {}", name, e);
                false
            }
        }
    }

    fn load(&self, name: &str) -> Option<String> {
        let entry = self.entry(name)?;
        match entry.get_password() {
            Ok(value) => Some(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!("Keyring read error for '{}': {}", name, e);
                None
            }
        }
    }

    fn delete(&self, name: &str) -> bool {
        let Some(entry) = self.entry(name) else {
            return false;
        };
        match entry.delete_credential() {
            Ok(()) => true,
            Err(keyring::Error::NoEntry) => true,
            Err(e) => {
                warn!("Failed to delete '{}' from OS credential store: {}", name, e);
                false
            }
        }
    }
}

/// File-backed preference store: one JSON object in the platform
/// config directory, write-through with an in-memory cache.
///
/// An unreadable or corrupt file is treated as empty rather than
/// surfaced; the next write replaces it.
pub struct FileKeyValueStore {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open the store in the platform config directory.
    pub fn open() -> Result<Self, AuthError> {
        let dir = dirs::config_dir()
            .map(|p| p.join(SERVICE_NAME))
            .ok_or_else(|| {
                AuthError::Storage("Could not determine config directory".to_string())
            })?;
        fs::create_dir_all(&dir)
            .map_err(|e| AuthError::Storage(format!("Failed to create config directory: {}", e)))?;
        Ok(Self::open_at(dir.join(PREFERENCES_FILE)))
    }

    /// Open the store at an explicit file path.
    pub fn open_at(path: PathBuf) -> Self {
        let cache = Self::read_file(&path);
        Self {
            path,
            cache: Mutex::new(cache),
        }
    }

    fn read_file(path: &PathBuf) -> HashMap<String, String> {
        if !path.exists() {
            debug!("Preference file does not exist yet: {:?}", path);
            return HashMap::new();
        }
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Failed to parse preference file, starting empty: {}", e);
                    HashMap::new()
                }
            },
            Err(e) => {
                warn!("Failed to read preference file, starting empty: {}", e);
                HashMap::new()
            }
        }
    }

    fn flush(&self, cache: &HashMap<String, String>) {
        let json = match serde_json::to_string_pretty(cache) {
            Ok(j) => j,
            Err(e) => {
                warn!("Failed to serialize preferences: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, json) {
            warn!("Failed to write preference file {:?}: {}", self.path, e);
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn save(&self, name: &str, value: &str) {
        let mut cache = self.cache.lock().unwrap();
        cache.insert(name.to_string(), value.to_string());
        self.flush(&cache);
    }

    fn load(&self, name: &str) -> Option<String> {
        self.cache.lock().unwrap().get(name).cloned()
    }

    fn remove(&self, name: &str) {
        let mut cache = self.cache.lock().unwrap();
        if cache.remove(name).is_some() {
            self.flush(&cache);
        }
    }
}

/// Volatile secure store; useful in tests and for embedders that opt
/// out of OS-level persistence entirely.
#[derive(Default)]
pub struct InMemorySecureStore {
    map: Mutex<HashMap<String, String>>,
}

impl SecureStore for InMemorySecureStore {
    fn save(&self, name: &str, value: &str) -> bool {
        self.map
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        true
    }

    fn load(&self, name: &str) -> Option<String> {
        self.map.lock().unwrap().get(name).cloned()
    }

    fn delete(&self, name: &str) -> bool {
        self.map.lock().unwrap().remove(name);
        true
    }
}

/// Volatile key/value store counterpart.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    map: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn save(&self, name: &str, value: &str) {
        self.map
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    fn load(&self, name: &str) -> Option<String> {
        self.map.lock().unwrap().get(name).cloned()
    }

    fn remove(&self, name: &str) {
        self.map.lock().unwrap().remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = FileKeyValueStore::open_at(path.clone());
        assert!(store.load("client-id").is_none());

        store.save("client-id", "client-123");
        store.save("tenant-id", "tenant-456");
        assert_eq!(store.load("client-id").as_deref(), Some("client-123"));

        // A fresh handle over the same file sees the persisted values
        let reopened = FileKeyValueStore::open_at(path);
        assert_eq!(reopened.load("client-id").as_deref(), Some("client-123"));
        assert_eq!(reopened.load("tenant-id").as_deref(), Some("tenant-456"));
    }

    #[test]
    fn test_file_store_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = FileKeyValueStore::open_at(path.clone());
        store.save("client-id", "client-123");
        store.remove("client-id");
        assert!(store.load("client-id").is_none());

        let reopened = FileKeyValueStore::open_at(path);
        assert!(reopened.load("client-id").is_none());
    }

    #[test]
    fn test_file_store_corrupt_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "not json at all {{{").unwrap();

        let store = FileKeyValueStore::open_at(path);
        assert!(store.load("anything").is_none());
    }

    #[test]
    fn test_in_memory_secure_store() {
        let store = InMemorySecureStore::default();
        assert!(store.load("access-token").is_none());
        assert!(store.save("access-token", "tok"));
        assert_eq!(store.load("access-token").as_deref(), Some("tok"));
        assert!(store.delete("access-token"));
        assert!(store.load("access-token").is_none());
        // Deleting an absent entry still reports success
        assert!(store.delete("access-token"));
    }
}
