//! Login flow state machine
//!
//! One `LoginManager` drives one login attempt:
//! start → registering (if no client id is cached) → awaiting
//! authorization → exchanging token → success or failed. Every stage
//! failure short-circuits the rest of the flow and produces exactly
//! one terminal result; token fields in the credential store keep
//! their pre-attempt values unless the whole attempt succeeds.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;

use super::http_client::{RegistrationTransport, TokenTransport};
use super::redirect::{extract_grant_code, RedirectOutcome, REDIRECT_URI};
use super::types::{decode_jwt_claims, AuthError, LoginStage, PendingLogin};
use crate::storage::CredentialStore;
use crate::utils::{percent_encode, random_alphanumeric};

const AUTHORIZATION_PATH: &str = "oauth/v2/authorization";
const OPENID_SCOPE: &str = "openid";
const STATE_NONCE_LEN: usize = 32;

/// Session cookie a third-party social login leaves behind; cleared
/// before every attempt so it cannot bypass the credential prompt.
pub const SOCIAL_LOGIN_COOKIE: &str = "c_user";

/// Interactive surface that renders the authorization page.
///
/// Implementations own dispatching onto whatever context renders
/// interactive surfaces; the login flow itself runs off it. `present`
/// must resolve at most once per invocation: with the terminal
/// redirect URL, or with `None` when the surface is dismissed without
/// one. There is no timeout on the interactive step.
#[async_trait]
pub trait AuthorizationPresenter: Send + Sync {
    /// Drop a session cookie from the presenting surface's cookie jar.
    fn clear_session_cookie(&self, name: &str);

    /// Show the authorization page and resolve with the terminal
    /// redirect URL, if any.
    async fn present(&self, url: &str) -> Option<String>;
}

/// State machine for a single login attempt
pub struct LoginManager {
    credentials: Arc<CredentialStore>,
    registration: Arc<dyn RegistrationTransport>,
    tokens: Arc<dyn TokenTransport>,
    presenter: Arc<dyn AuthorizationPresenter>,
    server_url: String,
    stage: LoginStage,
    pending: Option<PendingLogin>,
}

impl LoginManager {
    pub fn new(
        credentials: Arc<CredentialStore>,
        registration: Arc<dyn RegistrationTransport>,
        tokens: Arc<dyn TokenTransport>,
        presenter: Arc<dyn AuthorizationPresenter>,
        server_url: String,
    ) -> Self {
        Self {
            credentials,
            registration,
            tokens,
            presenter,
            server_url,
            stage: LoginStage::Start,
            pending: None,
        }
    }

    pub fn stage(&self) -> LoginStage {
        self.stage
    }

    /// Correlation record of the attempt, once the authorization URL
    /// has been built.
    pub fn pending(&self) -> Option<&PendingLogin> {
        self.pending.as_ref()
    }

    fn advance(&mut self, next: LoginStage) {
        debug!("Login stage: {} -> {}", self.stage.as_str(), next.as_str());
        self.stage = next;
    }

    fn fail(&mut self, err: AuthError) -> AuthError {
        warn!("Login failed at stage {}: {}", self.stage.as_str(), err);
        self.advance(LoginStage::Failed);
        err
    }

    /// Drive the attempt to a terminal state. Resolves exactly once,
    /// with the access token on success.
    pub async fn run(mut self) -> Result<String, AuthError> {
        let tenant_id = match self.credentials.tenant_id() {
            Some(tenant) => tenant,
            None => {
                return Err(self.fail(AuthError::Authentication(
                    "Tenant Id is not defined".to_string(),
                )))
            }
        };

        if self.credentials.client_id().is_none() {
            self.advance(LoginStage::Registering);
            match self.registration.register().await {
                Ok(client) => {
                    self.credentials.set_client_id(&client.client_id);
                    info!("Client registered during login");
                }
                Err(e) => {
                    // Any registration-stage failure, transport included,
                    // surfaces as a registration error.
                    let msg = match e {
                        AuthError::Registration(msg) => msg,
                        other => other.to_string(),
                    };
                    return Err(self.fail(AuthError::Registration(msg)));
                }
            }
        }

        let client_id = match self.credentials.client_id() {
            Some(client_id) => client_id,
            None => {
                return Err(self.fail(AuthError::Authentication(
                    "Client is not registered".to_string(),
                )))
            }
        };

        self.advance(LoginStage::AwaitingAuthorization);
        let pending = PendingLogin::new(random_alphanumeric(STATE_NONCE_LEN));
        let url = build_authorization_url(&self.server_url, &client_id, &pending.state);
        debug!(
            "Presenting authorization page (state: {}...)",
            &pending.state[..8]
        );
        self.pending = Some(pending);

        // A session cookie left by an earlier third-party login must
        // not carry into this attempt.
        self.presenter.clear_session_cookie(SOCIAL_LOGIN_COOKIE);

        let redirect = self.presenter.present(&url).await;
        let code = match redirect.as_deref().map(extract_grant_code) {
            Some(RedirectOutcome::Code(code)) => code,
            _ => {
                return Err(self.fail(AuthError::Authentication(
                    "Failed to get grant code".to_string(),
                )))
            }
        };

        self.advance(LoginStage::ExchangingToken);
        let bundle = match self
            .tokens
            .exchange_code(&code, &tenant_id, &client_id)
            .await
        {
            Ok(bundle) => bundle,
            // Exchange failures surface unchanged.
            Err(e) => return Err(self.fail(e)),
        };

        self.credentials
            .set_tokens(&bundle.access_token, &bundle.id_token);
        if let Some(claims) = decode_jwt_claims(&bundle.id_token) {
            self.credentials.set_user_identity(&claims);
        }

        self.advance(LoginStage::Success);
        if let Some(pending) = &self.pending {
            let elapsed = chrono::Utc::now() - pending.started_at;
            info!("Login successful ({}s)", elapsed.num_seconds());
        }
        Ok(bundle.access_token)
    }
}

/// Build the authorization request URL, percent-encoding every value.
fn build_authorization_url(server_url: &str, client_id: &str, state: &str) -> String {
    let params = [
        ("response_type", "code"),
        ("client_id", client_id),
        ("redirect_uri", REDIRECT_URI),
        ("scope", OPENID_SCOPE),
        ("use_login_widget", "true"),
        ("state", state),
    ];
    let query = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}/{}?{}", server_url, AUTHORIZATION_PATH, query)
}
