use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    http::Method,
};
use tower_cookies::Cookies;
use tower_cookies::cookie::time::Duration;

use crate::{
    crypto::csrf::{generate_csrf_token, tokens_match},
    error::AppError,
    identity::{CookieBridge, CookieOptions},
    state::AppState,
};

/// Name of the CSRF cookie. Scripts read it and echo it in [`CSRF_HEADER`].
pub const CSRF_COOKIE: &str = "csrf_token";
/// Header carrying the echoed CSRF token.
pub const CSRF_HEADER: &str = "x-csrf-token";

fn csrf_options(state: &AppState) -> CookieOptions {
    CookieOptions::script_readable(Duration::days(1), state.config.is_production)
}

/// Returns the current CSRF token, issuing a new cookie when none is present.
pub fn ensure_csrf_cookie(state: &AppState, cookies: &Cookies) -> String {
    if let Some(token) = CookieBridge::get(cookies, CSRF_COOKIE) {
        return token;
    }

    let token = generate_csrf_token();
    CookieBridge::set(cookies, CSRF_COOKIE, token.clone(), &csrf_options(state));
    tracing::debug!("🔐 Issued CSRF cookie");
    token
}

/// Removes the CSRF cookie (on sign-out).
pub fn clear_csrf_cookie(state: &AppState, cookies: &Cookies) {
    CookieBridge::remove(cookies, CSRF_COOKIE, &csrf_options(state));
}

/// A middleware that verifies the CSRF token.
///
/// Safe methods pass through. Everything else must present the token from
/// the `csrf_token` cookie in the `x-csrf-token` header.
///
/// # Arguments
///
/// * `cookies` - The request cookies.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an error `AppError`.
pub async fn verify_csrf(
    cookies: Cookies,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == Method::GET
        || req.method() == Method::HEAD
        || req.method() == Method::OPTIONS
    {
        return next.run(req).await;
    }

    let csrf_token_cookie = match cookies.get(CSRF_COOKIE) {
        Some(c) => c.value().to_string(),
        None => {
            tracing::warn!("❌ CSRF: csrf_token cookie missing");
            return AppError::Authentication("Missing CSRF token cookie".to_string())
                .into_response();
        }
    };

    let csrf_token_header = match req.headers().get(CSRF_HEADER) {
        Some(token) => match token.to_str() {
            Ok(t) => t.to_string(),
            Err(_) => {
                tracing::warn!("❌ CSRF: header is not valid ASCII");
                return AppError::Authentication("Invalid CSRF token format".to_string())
                    .into_response();
            }
        },
        None => {
            tracing::warn!("❌ CSRF: x-csrf-token header missing");
            return AppError::Authentication("Missing CSRF token header".to_string())
                .into_response();
        }
    };

    if !tokens_match(&csrf_token_cookie, &csrf_token_header) {
        tracing::warn!("❌ CSRF: tokens do not match");
        return AppError::Authentication("CSRF token mismatch".to_string()).into_response();
    }

    tracing::debug!("✅ CSRF token valid");
    next.run(req).await
}
