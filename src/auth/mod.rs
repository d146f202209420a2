//! Login flow for the AuthBridge identity service
//!
//! - client registration and grant-code exchange over HTTP
//! - the interactive authorization step behind a presenter seam
//! - redirect parsing to recover the grant code

mod http_client;
mod manager;
mod redirect;
pub mod types;

pub use http_client::{AuthClient, RegistrationTransport, TokenTransport};
pub use manager::{AuthorizationPresenter, LoginManager, SOCIAL_LOGIN_COOKIE};
pub use redirect::{extract_grant_code, RedirectOutcome, REDIRECT_URI};
pub use types::*;
