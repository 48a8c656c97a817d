use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::identity::{CookieBridge, IdentityProvider};
use crate::models::session::Session;
use crate::navigation::{Navigation, Route};

/// Provider used when the sign-in link does not name one.
pub const DEFAULT_SIGN_IN_PROVIDER: &str = "github";

/// Query parameters delivered to the authentication callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Exchanges the callback artifact for a session.
///
/// # Arguments
///
/// * `identity` - The identity provider.
/// * `cookies` - The request cookies.
/// * `params` - The callback query parameters.
///
/// # Returns
///
/// A `Result` containing the established `Session`.
pub async fn exchange_callback(
    identity: &dyn IdentityProvider,
    cookies: &dyn CookieBridge,
    params: &CallbackParams,
) -> Result<Session> {
    if let Some(error) = &params.error {
        let detail = params.error_description.as_deref().unwrap_or(error);
        return Err(AppError::AuthExchange(format!(
            "identity provider reported: {}",
            detail
        )));
    }

    let code = params.code.as_deref().unwrap_or_default();
    identity.exchange_for_session(code, cookies).await
}

/// Completes a pending sign-in and decides where the visitor goes next.
///
/// Success leads to the authenticated home. Any failure leads back to the
/// entry page with no session established. Failures are not retried.
pub async fn complete_sign_in(
    identity: &dyn IdentityProvider,
    cookies: &dyn CookieBridge,
    params: &CallbackParams,
) -> Navigation {
    match exchange_callback(identity, cookies, params).await {
        Ok(session) => {
            tracing::info!("✅ User signed in: {}", session.user_id());
            Navigation::Navigate(Route::Home)
        }
        Err(e) => {
            tracing::warn!("❌ Sign-in callback failed: {}", e);
            Navigation::Navigate(Route::Entry)
        }
    }
}

/// Starts the sign-in handshake and returns the provider URL to visit.
pub async fn begin_sign_in(
    identity: &dyn IdentityProvider,
    cookies: &dyn CookieBridge,
    provider: Option<&str>,
) -> Result<String> {
    let provider = provider
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_SIGN_IN_PROVIDER);

    if !provider
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::Validation("Unknown sign-in provider".to_string()));
    }

    identity.begin_sign_in(provider, cookies).await
}

/// Signs the visitor out and sends them to the entry page.
pub async fn sign_out(identity: &dyn IdentityProvider, cookies: &dyn CookieBridge) -> Navigation {
    if let Err(e) = identity.sign_out(cookies).await {
        tracing::warn!("⚠️ Sign-out did not complete cleanly: {}", e);
    }
    Navigation::Navigate(Route::Entry)
}
