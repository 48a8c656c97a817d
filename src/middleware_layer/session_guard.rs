//! Session-gated access control.
//!
//! Every request is classified by path, and the current session is looked up
//! through the identity provider. The pair decides whether the request
//! reaches its handler or is redirected. The guard runs inside
//! `CookieManagerLayer`, so cookie writes made during the lookup (a refresh,
//! the removal of a dead cookie) are emitted on redirects too.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;

use crate::{
    models::session::Session,
    navigation::{ENTRY_PATH, HOME_PATH, REGISTER_PATH, Route},
    state::AppState,
};

/// Access category of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Requires a session.
    Protected,
    /// Only meaningful without a session (sign-in, registration).
    AuthOnly,
    /// Always reachable.
    Other,
}

/// Outcome of the guard for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Route),
}

/// Classifies `path` into exactly one [`PathClass`].
///
/// The authenticated home and everything below it is protected. Prefix
/// matching is per segment: `/dashboardx` is not under `/dashboard`.
pub fn classify(path: &str) -> PathClass {
    let under_home = path
        .strip_prefix(HOME_PATH)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));

    if under_home {
        PathClass::Protected
    } else if path == ENTRY_PATH || path == REGISTER_PATH {
        PathClass::AuthOnly
    } else {
        PathClass::Other
    }
}

/// Applies the access table to a classified path.
pub fn decide(class: PathClass, has_session: bool) -> GuardDecision {
    match (class, has_session) {
        (PathClass::Protected, false) => GuardDecision::Redirect(Route::Entry),
        (PathClass::AuthOnly, true) => GuardDecision::Redirect(Route::Home),
        _ => GuardDecision::Allow,
    }
}

/// A middleware that gates every request on session presence.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's `Response`, or a 303 redirect. A 303 is followed with GET,
/// so a form post that lost its session still lands on entry.
pub async fn session_guard(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let class = classify(request.uri().path());

    let session: Option<Session> = match state.identity.get_session(&cookies).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("❌ Session lookup failed, treating as signed out: {}", e);
            None
        }
    };

    match decide(class, session.is_some()) {
        GuardDecision::Allow => {
            if let Some(session) = session {
                tracing::debug!("✅ Session present for user: {}", session.user_id());
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        GuardDecision::Redirect(route) => {
            tracing::debug!(
                "↪️ Redirecting {} ({:?}) to {}",
                request.uri().path(),
                class,
                route.path()
            );
            Redirect::to(&route.path()).into_response()
        }
    }
}
