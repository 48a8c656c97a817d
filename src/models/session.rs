use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::user::User;

/// Sessions this close to expiry are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 10;

/// Represents an authenticated session.
///
/// ⚠️ Carries bearer tokens. Only the identity provider writes it, and it only
/// ever lives in the HttpOnly session cookie. `Debug` redacts both tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token presented to the backend and the identity provider.
    pub access_token: String,
    /// Token used to obtain a new access token once this one expires.
    pub refresh_token: String,
    /// The timestamp when the access token expires.
    pub expires_at: DateTime<Utc>,
    /// The user this session belongs to.
    pub user: User,
}

impl Session {
    /// The subject id of the session owner.
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Whether the access token is already expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the access token is expired (or about to be) at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}
