use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    error::Result,
    middleware_layer::csrf::clear_csrf_cookie,
    navigation::Navigation,
    services::auth::{self as auth_service, CallbackParams},
    state::AppState,
};

/// The query parameters of the sign-in start surface.
#[derive(Deserialize, Debug, Default)]
pub struct SignInQuery {
    pub provider: Option<String>,
}

/// Starts a sign-in with the requested provider.
#[axum::debug_handler]
pub async fn sign_in(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<SignInQuery>,
) -> Result<Redirect> {
    let url =
        auth_service::begin_sign_in(state.identity.as_ref(), &cookies, query.provider.as_deref())
            .await?;

    tracing::debug!("🔑 Sign-in started, redirecting to identity provider");
    Ok(Redirect::to(&url))
}

/// Handles the identity provider's redirect back to the portal.
///
/// Never renders an error page: success goes to the directory, anything
/// else back to the entry page.
#[axum::debug_handler]
pub async fn callback(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<CallbackParams>,
) -> Navigation {
    auth_service::complete_sign_in(state.identity.as_ref(), &cookies, &params).await
}

/// Handles user sign-out.
#[axum::debug_handler]
pub async fn sign_out(State(state): State<AppState>, cookies: Cookies) -> Navigation {
    let navigation = auth_service::sign_out(state.identity.as_ref(), &cookies).await;
    clear_csrf_cookie(&state, &cookies);

    tracing::info!("👋 User signed out");
    navigation
}
