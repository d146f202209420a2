//! Login flow types

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::storage::IdentityDocument;

/// Stage of a login attempt. One instance of the flow walks these in
/// order; `Registering` is skipped when a client id is already cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Start,
    Registering,
    AwaitingAuthorization,
    ExchangingToken,
    Success,
    Failed,
}

impl LoginStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStage::Start => "start",
            LoginStage::Registering => "registering",
            LoginStage::AwaitingAuthorization => "awaiting_authorization",
            LoginStage::ExchangingToken => "exchanging_token",
            LoginStage::Success => "success",
            LoginStage::Failed => "failed",
        }
    }
}

/// Per-attempt correlation record: the state nonce carried in the
/// authorization URL and when the attempt started.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLogin {
    pub state: String,
    pub started_at: DateTime<Utc>,
}

impl PendingLogin {
    pub fn new(state: String) -> Self {
        Self {
            state,
            started_at: Utc::now(),
        }
    }
}

/// Client registration result from the identity service.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredClient {
    pub client_id: String,
}

/// Token response from the code-for-token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub id_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Decode the claims section of a JWT without verifying the
/// signature. Verification happens server-side; the claims are only
/// used to populate the cached user identity document.
pub fn decode_jwt_claims(token: &str) -> Option<IdentityDocument> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Error types for the login flow
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Login already in progress")]
    LoginInProgress,
}
