//! Session store: the identity-provider capability set consumed by the portal.
//!
//! The provider is injected as `Arc<dyn IdentityProvider>`. Every operation
//! receives the request's cookie jar through [`CookieBridge`], so that
//! session writes made while answering a request (refreshes, removals) land
//! on that request's response, redirects included.

use async_trait::async_trait;

use crate::{
    error::Result,
    models::{session::Session, user::User},
};

pub mod cookies;
pub mod http;

pub use cookies::{CookieBridge, CookieOptions};
pub use http::HttpIdentityProvider;

/// Issues, renews and tears down sessions.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the current session, refreshing it when it is about to expire.
    ///
    /// A refresh writes the new session cookie through `cookies`. An
    /// undecodable or rejected session cookie is removed and reported as
    /// `Ok(None)`.
    async fn get_session(&self, cookies: &dyn CookieBridge) -> Result<Option<Session>>;

    /// Returns the user of the current session, verified with the provider.
    async fn get_user(&self, cookies: &dyn CookieBridge) -> Result<Option<User>>;

    /// Starts a sign-in handshake with `provider` and returns the URL the
    /// browser must visit.
    async fn begin_sign_in(&self, provider: &str, cookies: &dyn CookieBridge) -> Result<String>;

    /// Exchanges the authorization code delivered to the callback for a session.
    ///
    /// The pending handshake is consumed whatever the outcome, so a second
    /// call with the same code fails with `AppError::AuthExchange`.
    async fn exchange_for_session(&self, code: &str, cookies: &dyn CookieBridge) -> Result<Session>;

    /// Ends the current session and clears the session cookie.
    async fn sign_out(&self, cookies: &dyn CookieBridge) -> Result<()>;
}
