//! AuthBridge Client Core
//!
//! Client-side core for AuthBridge sign-in: drives the
//! authorization-code login flow against the identity service and
//! caches the resulting credentials with a per-secret persistence
//! policy. Embedders supply the interactive surface; everything else
//! is wired by `AuthBridge::with_defaults`.

pub mod auth;
pub mod client;
pub mod storage;
pub mod utils;

// Re-export the embedder-facing surface
pub use auth::{AuthError, AuthorizationPresenter, RedirectOutcome, REDIRECT_URI};
pub use client::AuthBridge;
pub use storage::{CredentialStore, IdentityDocument, PolicyMode};
