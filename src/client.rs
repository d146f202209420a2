//! AuthBridge client facade
//!
//! The embedder-facing entry point: owns the credential store, the
//! transports and the interactive presenter, derives the identity
//! service URL from the configured region, and runs login attempts
//! one at a time.

use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::auth::{
    AuthClient, AuthError, AuthorizationPresenter, LoginManager, RegistrationTransport,
    TokenTransport,
};
use crate::storage::{
    CredentialStore, FileKeyValueStore, IdentityDocument, KeyringStore, PolicyMode,
};

const DEFAULT_PROTOCOL: &str = "https";
const AUTH_SERVER_NAME: &str = "authbridge-oauth";

/// Resets the in-flight flag on every exit path, including drops of a
/// cancelled login future.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Client for the AuthBridge identity service
pub struct AuthBridge {
    region: String,
    override_server_host: Option<String>,
    credentials: Arc<CredentialStore>,
    registration: Arc<dyn RegistrationTransport>,
    tokens: Arc<dyn TokenTransport>,
    presenter: Arc<dyn AuthorizationPresenter>,
    login_in_flight: AtomicBool,
}

impl AuthBridge {
    /// Wire the client over explicit collaborators. The tenant id is
    /// persisted into the store and the installation identities are
    /// generated if this is the first run.
    pub fn new(
        tenant_id: &str,
        region: &str,
        credentials: Arc<CredentialStore>,
        registration: Arc<dyn RegistrationTransport>,
        tokens: Arc<dyn TokenTransport>,
        presenter: Arc<dyn AuthorizationPresenter>,
    ) -> Self {
        credentials.set_tenant_id(tenant_id);
        credentials.ensure_identities_initialized();

        Self {
            region: region.to_string(),
            override_server_host: None,
            credentials,
            registration,
            tokens,
            presenter,
            login_in_flight: AtomicBool::new(false),
        }
    }

    /// Wire the client over the default backends: the OS credential
    /// store, a preference file in the platform config directory, and
    /// the HTTP transports against the derived server URL.
    pub fn with_defaults(
        tenant_id: &str,
        region: &str,
        presenter: Arc<dyn AuthorizationPresenter>,
    ) -> Result<Self, AuthError> {
        let secure = Arc::new(KeyringStore::new());
        let plain = Arc::new(FileKeyValueStore::open()?);
        let credentials = Arc::new(CredentialStore::new(secure, plain));

        let server_url = derive_server_url(None, region);
        let client = Arc::new(AuthClient::new(&server_url, tenant_id));

        Ok(Self::new(
            tenant_id,
            region,
            credentials,
            client.clone(),
            client,
            presenter,
        ))
    }

    /// Route all identity-service traffic to an explicit host instead
    /// of the region-derived one. Intended for development setups.
    pub fn set_override_server_host(&mut self, host: Option<String>) {
        self.override_server_host = host;
    }

    /// Identity service base URL: the override host if set, otherwise
    /// derived from the configured region by string concatenation.
    pub fn server_url(&self) -> String {
        derive_server_url(self.override_server_host.as_deref(), &self.region)
    }

    /// Run one interactive login. Resolves exactly once with the
    /// access token or the stage error; a call made while another
    /// login is pending is rejected outright.
    pub async fn login(&self) -> Result<String, AuthError> {
        if self.login_in_flight.swap(true, Ordering::SeqCst) {
            warn!("Rejecting login: another attempt is already in progress");
            return Err(AuthError::LoginInProgress);
        }
        let _guard = InFlightGuard(&self.login_in_flight);

        LoginManager::new(
            self.credentials.clone(),
            self.registration.clone(),
            self.tokens.clone(),
            self.presenter.clone(),
            self.server_url(),
        )
        .run()
        .await
    }

    pub fn access_token(&self) -> Option<String> {
        self.credentials.access_token()
    }

    pub fn user_identity(&self) -> Option<IdentityDocument> {
        self.credentials.user_identity()
    }

    /// Change how token-tier secrets are persisted, migrating their
    /// physical storage when asked to.
    pub fn set_persistence_policy(&self, mode: PolicyMode, migrate: bool) {
        self.credentials.set_persistence_policy(mode, migrate);
    }

    /// Forget the session: tokens and the user identity document.
    /// Client registration and the installation identities stay.
    pub fn logout(&self) {
        info!("Logging out");
        self.credentials.clear_tokens();
        self.credentials.clear_user_identity();
    }

    /// The underlying credential store, for embedders that need direct
    /// access to cached fields.
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }
}

fn derive_server_url(override_host: Option<&str>, region: &str) -> String {
    match override_host {
        Some(host) => host.to_string(),
        None => format!("{}://{}{}", DEFAULT_PROTOCOL, AUTH_SERVER_NAME, region),
    }
}
