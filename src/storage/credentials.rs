//! Credential store: the single owner of everything the SDK persists
//!
//! Aggregates the persistence policy, the token-tier secret entries,
//! the plain registration fields, and the identity documents. All
//! reads and writes of login state go through here; the orchestrator
//! never touches the underlying stores directly.

use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{json, Value};

use super::backends::{KeyValueStore, SecureStore};
use super::secret::{PersistencePolicy, PolicyMode, SecretEntry};
use crate::utils::random_alphanumeric;

pub const CLIENT_ID_KEY: &str = "client-id";
pub const TENANT_ID_KEY: &str = "tenant-id";
pub const PERSISTENCE_POLICY_KEY: &str = "persistence-policy";
pub const ACCESS_TOKEN_KEY: &str = "access-token";
pub const ID_TOKEN_KEY: &str = "id-token";
pub const USER_IDENTITY_KEY: &str = "user-identity";
pub const DEVICE_IDENTITY_KEY: &str = "device-identity";
pub const APP_IDENTITY_KEY: &str = "app-identity";

/// Structured identity document, persisted as JSON text.
pub type IdentityDocument = serde_json::Map<String, Value>;

struct Inner {
    policy: PersistencePolicy,
    secrets: HashMap<&'static str, SecretEntry>,
    client_id: Option<String>,
    tenant_id: Option<String>,
}

/// Single source of truth for cached credentials.
pub struct CredentialStore {
    secure: Arc<dyn SecureStore>,
    plain: Arc<dyn KeyValueStore>,
    inner: Mutex<Inner>,
}

impl CredentialStore {
    /// Build the store over the injected backends, reloading any
    /// previously persisted plain values and the policy mode.
    ///
    /// The secret entries are created first and the policy wired to
    /// them by name afterwards; neither side owns the other.
    pub fn new(secure: Arc<dyn SecureStore>, plain: Arc<dyn KeyValueStore>) -> Self {
        let mode = plain
            .load(PERSISTENCE_POLICY_KEY)
            .map(|raw| PolicyMode::parse(&raw))
            .unwrap_or(PolicyMode::Always);

        let mut secrets = HashMap::new();
        secrets.insert(ACCESS_TOKEN_KEY, SecretEntry::new(ACCESS_TOKEN_KEY));
        secrets.insert(ID_TOKEN_KEY, SecretEntry::new(ID_TOKEN_KEY));

        let mut policy = PersistencePolicy::new(mode);
        policy.govern(ACCESS_TOKEN_KEY);
        policy.govern(ID_TOKEN_KEY);

        let client_id = plain.load(CLIENT_ID_KEY);
        let tenant_id = plain.load(TENANT_ID_KEY);
        debug!(
            "Credential store loaded (client registered: {}, policy: {})",
            client_id.is_some(),
            mode.as_str()
        );

        Self {
            secure,
            plain,
            inner: Mutex::new(Inner {
                policy,
                secrets,
                client_id,
                tenant_id,
            }),
        }
    }

    pub fn client_id(&self) -> Option<String> {
        self.inner.lock().unwrap().client_id.clone()
    }

    pub fn set_client_id(&self, client_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.client_id = Some(client_id.to_string());
        self.plain.save(CLIENT_ID_KEY, client_id);
    }

    pub fn tenant_id(&self) -> Option<String> {
        self.inner.lock().unwrap().tenant_id.clone()
    }

    pub fn set_tenant_id(&self, tenant_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.tenant_id = Some(tenant_id.to_string());
        self.plain.save(TENANT_ID_KEY, tenant_id);
    }

    pub fn access_token(&self) -> Option<String> {
        self.secret(ACCESS_TOKEN_KEY)
    }

    pub fn id_token(&self) -> Option<String> {
        self.secret(ID_TOKEN_KEY)
    }

    fn secret(&self, name: &'static str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        let mode = inner.policy.mode();
        inner
            .secrets
            .get(name)
            .and_then(|entry| entry.get(mode, self.secure.as_ref()))
    }

    /// Write both token entries under one lock so a reader can never
    /// observe the access token of one login with the id token of
    /// another (or of none).
    pub fn set_tokens(&self, access_token: &str, id_token: &str) {
        let mut inner = self.inner.lock().unwrap();
        let mode = inner.policy.mode();
        if let Some(entry) = inner.secrets.get_mut(ACCESS_TOKEN_KEY) {
            entry.set(access_token, mode, self.secure.as_ref());
        }
        if let Some(entry) = inner.secrets.get_mut(ID_TOKEN_KEY) {
            entry.set(id_token, mode, self.secure.as_ref());
        }
    }

    /// Clear both token entries, in memory and in the secure store.
    pub fn clear_tokens(&self) {
        let mut inner = self.inner.lock().unwrap();
        for name in [ACCESS_TOKEN_KEY, ID_TOKEN_KEY] {
            if let Some(entry) = inner.secrets.get_mut(name) {
                entry.clear(self.secure.as_ref());
            }
        }
    }

    pub fn persistence_policy(&self) -> PolicyMode {
        self.inner.lock().unwrap().policy.mode()
    }

    /// Change the persistence policy. With `migrate` set, every
    /// governed entry's physical storage is brought in line with the
    /// new mode before the change is considered complete; a governed
    /// name with no live entry is skipped.
    pub fn set_persistence_policy(&self, mode: PolicyMode, migrate: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.policy.set_mode(mode);
        if migrate {
            let governed: Vec<&'static str> = inner.policy.governed().to_vec();
            for name in governed {
                if let Some(entry) = inner.secrets.get(name) {
                    entry.apply_policy(mode, self.secure.as_ref());
                }
            }
        }
        self.plain.save(PERSISTENCE_POLICY_KEY, mode.as_str());
        info!("Persistence policy set to {} (migrate: {})", mode.as_str(), migrate);
    }

    pub fn user_identity(&self) -> Option<IdentityDocument> {
        self.document(USER_IDENTITY_KEY)
    }

    pub fn set_user_identity(&self, identity: &IdentityDocument) {
        self.save_document(USER_IDENTITY_KEY, identity);
    }

    pub fn clear_user_identity(&self) {
        self.plain.remove(USER_IDENTITY_KEY);
    }

    pub fn device_identity(&self) -> Option<IdentityDocument> {
        self.document(DEVICE_IDENTITY_KEY)
    }

    pub fn app_identity(&self) -> Option<IdentityDocument> {
        self.document(APP_IDENTITY_KEY)
    }

    fn document(&self, key: &str) -> Option<IdentityDocument> {
        let text = self.plain.load(key)?;
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) | Err(_) => {
                debug!("Stored document under '{}' is not a JSON object", key);
                None
            }
        }
    }

    fn save_document(&self, key: &str, document: &IdentityDocument) {
        match serde_json::to_string(document) {
            Ok(text) => self.plain.save(key, &text),
            Err(e) => log::warn!("Failed to serialize document '{}': {}", key, e),
        }
    }

    /// Generate the device and app identity documents if absent. They
    /// are created once per installation and never regenerated.
    pub fn ensure_identities_initialized(&self) {
        if self.device_identity().is_none() {
            let doc = new_device_identity();
            self.save_document(DEVICE_IDENTITY_KEY, &doc);
            info!("Generated device identity");
        }
        if self.app_identity().is_none() {
            let doc = new_app_identity();
            self.save_document(APP_IDENTITY_KEY, &doc);
            info!("Generated app identity");
        }
    }
}

fn new_device_identity() -> IdentityDocument {
    let mut doc = IdentityDocument::new();
    doc.insert("id".to_string(), json!(random_alphanumeric(32)));
    doc.insert("platform".to_string(), json!(std::env::consts::OS));
    doc.insert("arch".to_string(), json!(std::env::consts::ARCH));
    doc.insert("createdAt".to_string(), json!(Utc::now().to_rfc3339()));
    doc
}

fn new_app_identity() -> IdentityDocument {
    let mut doc = IdentityDocument::new();
    doc.insert("id".to_string(), json!(random_alphanumeric(32)));
    doc.insert(
        "sdkVersion".to_string(),
        json!(env!("CARGO_PKG_VERSION")),
    );
    doc.insert("createdAt".to_string(), json!(Utc::now().to_rfc3339()));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backends::{InMemoryKeyValueStore, InMemorySecureStore};

    fn new_store() -> (Arc<InMemorySecureStore>, Arc<InMemoryKeyValueStore>, CredentialStore) {
        let secure = Arc::new(InMemorySecureStore::default());
        let plain = Arc::new(InMemoryKeyValueStore::default());
        let store = CredentialStore::new(secure.clone(), plain.clone());
        (secure, plain, store)
    }

    #[test]
    fn test_plain_fields_reload_on_construction() {
        let secure = Arc::new(InMemorySecureStore::default());
        let plain = Arc::new(InMemoryKeyValueStore::default());
        plain.save(CLIENT_ID_KEY, "client-1");
        plain.save(TENANT_ID_KEY, "tenant-1");

        let store = CredentialStore::new(secure, plain);
        assert_eq!(store.client_id().as_deref(), Some("client-1"));
        assert_eq!(store.tenant_id().as_deref(), Some("tenant-1"));
    }

    #[test]
    fn test_tokens_written_atomically_and_mirrored() {
        let (secure, _plain, store) = new_store();
        assert!(store.access_token().is_none());

        store.set_tokens("a1", "i1");
        assert_eq!(store.access_token().as_deref(), Some("a1"));
        assert_eq!(store.id_token().as_deref(), Some("i1"));
        // Default policy is durable
        assert_eq!(secure.load(ACCESS_TOKEN_KEY).as_deref(), Some("a1"));
        assert_eq!(secure.load(ID_TOKEN_KEY).as_deref(), Some("i1"));
    }

    #[test]
    fn test_policy_change_to_never_purges_secure_store() {
        let (secure, _plain, store) = new_store();
        store.set_tokens("a1", "i1");

        store.set_persistence_policy(PolicyMode::Never, true);
        assert!(secure.load(ACCESS_TOKEN_KEY).is_none());
        assert!(secure.load(ID_TOKEN_KEY).is_none());
        // In-memory values remain authoritative
        assert_eq!(store.access_token().as_deref(), Some("a1"));
        assert_eq!(store.id_token().as_deref(), Some("i1"));
    }

    #[test]
    fn test_policy_change_to_always_mirrors_current_values() {
        let (secure, _plain, store) = new_store();
        store.set_persistence_policy(PolicyMode::Never, true);
        store.set_tokens("a1", "i1");
        assert!(secure.load(ACCESS_TOKEN_KEY).is_none());

        store.set_persistence_policy(PolicyMode::Always, true);
        assert_eq!(secure.load(ACCESS_TOKEN_KEY).as_deref(), Some("a1"));
        assert_eq!(secure.load(ID_TOKEN_KEY).as_deref(), Some("i1"));
    }

    #[test]
    fn test_policy_change_without_migration_leaves_storage_alone() {
        let (secure, _plain, store) = new_store();
        store.set_tokens("a1", "i1");

        store.set_persistence_policy(PolicyMode::Never, false);
        // Stale durable copies remain until the next write touches them
        assert_eq!(secure.load(ACCESS_TOKEN_KEY).as_deref(), Some("a1"));
    }

    #[test]
    fn test_migration_skips_governed_name_without_entry() {
        let (secure, _plain, store) = new_store();
        store.set_tokens("a1", "i1");
        // A governed name with no registered entry is skipped, not fatal
        store.inner.lock().unwrap().policy.govern("refresh-token");

        store.set_persistence_policy(PolicyMode::Never, true);
        assert!(secure.load(ACCESS_TOKEN_KEY).is_none());
        assert_eq!(store.access_token().as_deref(), Some("a1"));
    }

    #[test]
    fn test_policy_mode_survives_reconstruction() {
        let secure = Arc::new(InMemorySecureStore::default());
        let plain = Arc::new(InMemoryKeyValueStore::default());
        {
            let store = CredentialStore::new(secure.clone(), plain.clone());
            store.set_persistence_policy(PolicyMode::Never, true);
        }
        let store = CredentialStore::new(secure, plain);
        assert_eq!(store.persistence_policy(), PolicyMode::Never);
    }

    #[test]
    fn test_durable_token_readable_after_restart() {
        let secure = Arc::new(InMemorySecureStore::default());
        let plain = Arc::new(InMemoryKeyValueStore::default());
        {
            let store = CredentialStore::new(secure.clone(), plain.clone());
            store.set_tokens("a1", "i1");
        }
        // A fresh store has no volatile values and falls back lazily
        let store = CredentialStore::new(secure, plain);
        assert_eq!(store.access_token().as_deref(), Some("a1"));
        assert_eq!(store.id_token().as_deref(), Some("i1"));
    }

    #[test]
    fn test_clear_tokens() {
        let (secure, _plain, store) = new_store();
        store.set_tokens("a1", "i1");
        store.clear_tokens();
        assert!(store.access_token().is_none());
        assert!(store.id_token().is_none());
        assert!(secure.load(ACCESS_TOKEN_KEY).is_none());
    }

    #[test]
    fn test_identities_generated_exactly_once() {
        let (_secure, _plain, store) = new_store();
        assert!(store.device_identity().is_none());

        store.ensure_identities_initialized();
        let device = store.device_identity().expect("device identity generated");
        let app = store.app_identity().expect("app identity generated");
        assert!(device.contains_key("id"));
        assert!(app.contains_key("id"));

        store.ensure_identities_initialized();
        assert_eq!(store.device_identity().unwrap(), device);
        assert_eq!(store.app_identity().unwrap(), app);
    }

    #[test]
    fn test_user_identity_roundtrip() {
        let (_secure, _plain, store) = new_store();
        let mut identity = IdentityDocument::new();
        identity.insert("sub".to_string(), json!("user-1"));
        identity.insert("name".to_string(), json!("Test User"));

        store.set_user_identity(&identity);
        assert_eq!(store.user_identity().unwrap(), identity);

        store.clear_user_identity();
        assert!(store.user_identity().is_none());
    }
}
