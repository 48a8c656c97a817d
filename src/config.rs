use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the tunnel-provisioning backend API (e.g. `http://localhost:9090/api/v1`).
    pub backend_url: String,
    /// Credential sent to the backend in the `X-API-Key` header.
    pub backend_api_key: Zeroizing<String>,
    /// Base URL of the identity provider.
    pub identity_url: String,
    /// Public (anon) key of the identity provider.
    pub identity_anon_key: Zeroizing<String>,
    /// Externally visible URL of this portal, used to build the callback URL.
    pub public_url: String,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Name of the session cookie.
    pub session_cookie_name: String,
    /// The duration of a session cookie in days.
    pub session_duration_days: i64,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout: Duration,
    /// Whether the portal runs in production (cookies get the `Secure` flag).
    pub is_production: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let backend_url = env::var("BACKEND_URL").context("BACKEND_URL must be set")?;
        let identity_url = env::var("IDENTITY_URL").context("IDENTITY_URL must be set")?;

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .context("Invalid BIND_ADDR")?;

        let timeout_secs: u64 = env::var("HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("Invalid HTTP_TIMEOUT_SECS")?;

        if timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Self {
            backend_url: trim_base_url(&backend_url),
            backend_api_key: Zeroizing::new(
                env::var("BACKEND_API_KEY").context("BACKEND_API_KEY must be set")?,
            ),
            identity_url: trim_base_url(&identity_url),
            identity_anon_key: Zeroizing::new(
                env::var("IDENTITY_ANON_KEY").context("IDENTITY_ANON_KEY must be set")?,
            ),
            public_url: trim_base_url(
                &env::var("PUBLIC_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            ),
            bind_addr,
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "tb-auth-token".to_string()),
            session_duration_days: env::var("SESSION_DURATION_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .context("Invalid SESSION_DURATION_DAYS")?,
            http_timeout: Duration::from_secs(timeout_secs),
            is_production: env::var("APP_ENV")
                .unwrap_or_else(|_| "development".to_string())
                == "production",
        })
    }

    /// Name of the cookie holding the pending PKCE verifier.
    pub fn verifier_cookie_name(&self) -> String {
        format!("{}-code-verifier", self.session_cookie_name)
    }

    /// The URL the identity provider redirects back to after sign-in.
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.public_url)
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
