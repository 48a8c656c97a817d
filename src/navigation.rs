//! Navigation intents.
//!
//! Guards, services and flows decide *where* the user should go next and
//! return that decision as a value. Only the HTTP layer turns it into an
//! actual redirect.

use axum::response::{IntoResponse, Redirect, Response};
use http::StatusCode;

/// Path of the entry (sign-in) page.
pub const ENTRY_PATH: &str = "/";
/// Path of the registration page.
pub const REGISTER_PATH: &str = "/register";
/// Path of the authenticated home (tunnel directory).
pub const HOME_PATH: &str = "/dashboard";
/// Path the identity provider redirects back to.
pub const CALLBACK_PATH: &str = "/auth/callback";

/// A routable surface of the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Entry,
    Register,
    Home,
    CreateTunnel,
    TunnelDetail(String),
    AuthCallback,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Entry => ENTRY_PATH.to_string(),
            Route::Register => REGISTER_PATH.to_string(),
            Route::Home => HOME_PATH.to_string(),
            Route::CreateTunnel => format!("{}/tunnels/create", HOME_PATH),
            Route::TunnelDetail(id) => format!("{}/tunnels/{}", HOME_PATH, id),
            Route::AuthCallback => CALLBACK_PATH.to_string(),
        }
    }
}

/// What the caller should do after an operation completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Stay on the current surface.
    Stay,
    /// Move to another surface.
    Navigate(Route),
}

impl IntoResponse for Navigation {
    fn into_response(self) -> Response {
        match self {
            Navigation::Stay => StatusCode::NO_CONTENT.into_response(),
            Navigation::Navigate(route) => Redirect::to(&route.path()).into_response(),
        }
    }
}
