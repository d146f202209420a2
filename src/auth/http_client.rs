//! HTTP client for the AuthBridge identity service
//!
//! The two transports the login flow depends on are traits so tests
//! and embedders can substitute them; `AuthClient` is the production
//! implementation over reqwest.

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use serde_json::json;

use super::redirect::REDIRECT_URI;
use super::types::{AuthError, RegisteredClient, TokenBundle};

const CLIENTS_PATH: &str = "oauth/v2/clients";
const TOKEN_PATH: &str = "oauth/v2/token";
const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";

/// One-time client registration with the identity service.
#[async_trait]
pub trait RegistrationTransport: Send + Sync {
    /// Register this installation; success carries the issued client id.
    async fn register(&self) -> Result<RegisteredClient, AuthError>;
}

/// Exchange of a grant code for tokens.
#[async_trait]
pub trait TokenTransport: Send + Sync {
    async fn exchange_code(
        &self,
        code: &str,
        tenant_id: &str,
        client_id: &str,
    ) -> Result<TokenBundle, AuthError>;
}

/// HTTP client for the identity service endpoints
pub struct AuthClient {
    client: Client,
    server_url: String,
    tenant_id: String,
}

impl AuthClient {
    pub fn new(server_url: &str, tenant_id: &str) -> Self {
        let client = Client::builder()
            .user_agent(concat!("AuthBridge-Client/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            tenant_id: tenant_id.to_string(),
        }
    }
}

#[async_trait]
impl RegistrationTransport for AuthClient {
    async fn register(&self) -> Result<RegisteredClient, AuthError> {
        let url = format!("{}/{}", self.server_url, CLIENTS_PATH);

        debug!("Registering client for tenant {}", self.tenant_id);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "tenant_id": self.tenant_id,
            }))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Client registration failed: {} - {}", status, body);

            if body.contains("Tenant not found") {
                return Err(AuthError::Registration(
                    "Unknown tenant. Check the tenant id passed at initialization.".to_string(),
                ));
            }
            return Err(AuthError::Registration(format!(
                "Registration failed: {} - {}",
                status, body
            )));
        }

        let data: RegisteredClient = response
            .json()
            .await
            .map_err(|e| AuthError::Registration(format!("Failed to parse response: {}", e)))?;

        info!("Client registered (client_id: {}...)", truncate(&data.client_id, 8));
        Ok(data)
    }
}

#[async_trait]
impl TokenTransport for AuthClient {
    async fn exchange_code(
        &self,
        code: &str,
        tenant_id: &str,
        client_id: &str,
    ) -> Result<TokenBundle, AuthError> {
        let url = format!("{}/{}", self.server_url, TOKEN_PATH);

        debug!("Exchanging grant code (code: {}...)", truncate(code, 8));

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "grant_type": AUTHORIZATION_CODE_GRANT,
                "code": code,
                "tenant_id": tenant_id,
                "client_id": client_id,
                "redirect_uri": REDIRECT_URI,
            }))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed: {} - {}", status, body);

            if is_invalid_grant(&body) {
                return Err(AuthError::TokenExchange(
                    "Grant code is invalid or expired. Please sign in again.".to_string(),
                ));
            }
            return Err(AuthError::TokenExchange(format!(
                "Exchange failed: {} - {}",
                status, body
            )));
        }

        let data: TokenBundle = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("Failed to parse response: {}", e)))?;

        info!("Token exchange successful");
        Ok(data)
    }
}

fn truncate(s: &str, len: usize) -> &str {
    &s[..s.len().min(len)]
}

/// Classify a token-endpoint error body. A used, expired, or unknown
/// grant code cannot succeed on retry.
pub(crate) fn is_invalid_grant(body: &str) -> bool {
    body.contains("invalid_grant")
        || body.contains("Grant code not found")
        || body.contains("code already used")
}
