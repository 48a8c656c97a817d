use base64::{Engine as _, engine::general_purpose};
use tower_cookies::cookie::{SameSite, time::Duration};
use tower_cookies::{Cookie, Cookies};

use crate::{
    config::Config,
    error::{AppError, Result},
    models::session::Session,
};

/// Attributes applied when a cookie is written or removed.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub path: String,
    pub max_age: Option<Duration>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookieOptions {
    /// HttpOnly, `SameSite=Lax`, path `/`.
    pub fn http_only(max_age: Duration, secure: bool) -> Self {
        Self {
            path: "/".to_string(),
            max_age: Some(max_age),
            http_only: true,
            secure,
            same_site: SameSite::Lax,
        }
    }

    /// Readable by scripts (the CSRF token must be echoed in a header).
    pub fn script_readable(max_age: Duration, secure: bool) -> Self {
        Self {
            http_only: false,
            ..Self::http_only(max_age, secure)
        }
    }
}

/// Narrow cookie access handed to the identity provider.
pub trait CookieBridge: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: String, options: &CookieOptions);
    fn remove(&self, name: &str, options: &CookieOptions);
}

impl CookieBridge for Cookies {
    fn get(&self, name: &str) -> Option<String> {
        Cookies::get(self, name).map(|cookie| cookie.value().to_string())
    }

    fn set(&self, name: &str, value: String, options: &CookieOptions) {
        self.add(build_cookie(name.to_string(), value, options));
    }

    fn remove(&self, name: &str, options: &CookieOptions) {
        let mut cookie = Cookie::new(name.to_string(), "");
        cookie.set_path(options.path.clone());
        Cookies::remove(self, cookie);
    }
}

/// Creates a cookie with the given name, value, and attributes.
fn build_cookie(name: String, value: String, options: &CookieOptions) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(options.http_only);
    if options.secure {
        cookie.set_secure(true);
    }
    cookie.set_same_site(options.same_site);
    cookie.set_max_age(options.max_age);
    cookie.set_path(options.path.clone());
    cookie
}

/// Names and attributes of the cookies owned by the identity provider.
#[derive(Debug, Clone)]
pub struct SessionCookieSettings {
    pub session_name: String,
    pub verifier_name: String,
    pub session_max_age: Duration,
    pub secure: bool,
}

/// How long a started sign-in handshake stays valid.
const VERIFIER_MAX_AGE_MINUTES: i64 = 10;

impl SessionCookieSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            session_name: config.session_cookie_name.clone(),
            verifier_name: config.verifier_cookie_name(),
            session_max_age: Duration::days(config.session_duration_days),
            secure: config.is_production,
        }
    }

    pub fn session_options(&self) -> CookieOptions {
        CookieOptions::http_only(self.session_max_age, self.secure)
    }

    pub fn verifier_options(&self) -> CookieOptions {
        CookieOptions::http_only(Duration::minutes(VERIFIER_MAX_AGE_MINUTES), self.secure)
    }
}

/// Serializes a session into a cookie-safe value.
pub fn encode_session(session: &Session) -> Result<String> {
    let json = sonic_rs::to_string(session)
        .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(json))
}

/// Parses a session cookie value. Returns `None` for anything malformed.
pub fn decode_session(value: &str) -> Option<Session> {
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(value).ok()?;
    sonic_rs::from_slice(&bytes).ok()
}
