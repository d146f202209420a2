//! Credential persistence: storage backends, token-tier secrets, and
//! the credential store that owns them.

mod backends;
mod credentials;
mod secret;

pub use backends::{
    FileKeyValueStore, InMemoryKeyValueStore, InMemorySecureStore, KeyValueStore, KeyringStore,
    SecureStore,
};
pub use credentials::{
    CredentialStore, IdentityDocument, ACCESS_TOKEN_KEY, APP_IDENTITY_KEY, CLIENT_ID_KEY,
    DEVICE_IDENTITY_KEY, ID_TOKEN_KEY, PERSISTENCE_POLICY_KEY, TENANT_ID_KEY, USER_IDENTITY_KEY,
};
pub use secret::{PersistencePolicy, PolicyMode, SecretEntry};
