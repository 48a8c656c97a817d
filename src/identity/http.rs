use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info_span};
use zeroize::Zeroizing;

use super::{
    IdentityProvider,
    cookies::{CookieBridge, SessionCookieSettings, decode_session, encode_session},
};
use crate::{
    config::Config,
    crypto::pkce,
    error::{AppError, Result},
    models::{session::Session, user::User},
};

/// Lifetime assumed when the provider omits both `expires_at` and `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Token endpoint response of the identity provider.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)))
            .unwrap_or_else(|| now + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// Error body of the identity provider. Field names vary by endpoint.
#[derive(Deserialize, Default)]
struct ProviderError {
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl ProviderError {
    fn describe(self, status: StatusCode) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or_else(|| format!("identity provider returned {}", status))
    }
}

/// Identity provider reached over its REST API (`/auth/v1/...`).
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
    anon_key: Zeroizing<String>,
    callback_url: String,
    cookies: SessionCookieSettings,
}

impl HttpIdentityProvider {
    /// Creates a new `HttpIdentityProvider`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the provider.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("tunnel-portal/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.identity_url.clone(),
            anon_key: config.identity_anon_key.clone(),
            callback_url: config.callback_url(),
            cookies: SessionCookieSettings::from_config(config),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    /// Calls the token endpoint with the given grant.
    ///
    /// A rejection by the provider is `AuthExchange`. A transport failure is `Http`.
    async fn request_token<B: Serialize + Sync>(&self, grant_type: &str, body: &B) -> Result<Session> {
        let url = self.endpoint("/token");
        let span = info_span!("identity.token", http.method = "POST", grant_type = grant_type);

        let response = self
            .client
            .post(&url)
            .query(&[("grant_type", grant_type)])
            .header("apikey", self.anon_key.as_str())
            .json(body)
            .send()
            .instrument(span)
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error: ProviderError = response.json().await.unwrap_or_default();
            return Err(AppError::AuthExchange(error.describe(status)));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AppError::AuthExchange(format!("malformed token response: {}", e))
        })?;

        Ok(token.into_session(Utc::now()))
    }

    fn store_session(&self, cookies: &dyn CookieBridge, session: &Session) -> Result<()> {
        let value = encode_session(session)?;
        cookies.set(&self.cookies.session_name, value, &self.cookies.session_options());
        Ok(())
    }

    fn clear_session(&self, cookies: &dyn CookieBridge) {
        cookies.remove(&self.cookies.session_name, &self.cookies.session_options());
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn get_session(&self, cookies: &dyn CookieBridge) -> Result<Option<Session>> {
        let Some(raw) = cookies.get(&self.cookies.session_name) else {
            return Ok(None);
        };

        let Some(session) = decode_session(&raw) else {
            tracing::warn!("❌ Undecodable session cookie, removing it");
            self.clear_session(cookies);
            return Ok(None);
        };

        if !session.needs_refresh(Utc::now()) {
            return Ok(Some(session));
        }

        tracing::debug!("🔄 Refreshing session for user: {}", session.user_id());

        match self
            .request_token(
                "refresh_token",
                &RefreshGrant {
                    refresh_token: &session.refresh_token,
                },
            )
            .await
        {
            Ok(refreshed) => {
                self.store_session(cookies, &refreshed)?;
                tracing::info!("✅ Session refreshed for user: {}", refreshed.user_id());
                Ok(Some(refreshed))
            }
            Err(AppError::AuthExchange(reason)) => {
                tracing::warn!("❌ Session refresh rejected: {}", reason);
                self.clear_session(cookies);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_user(&self, cookies: &dyn CookieBridge) -> Result<Option<User>> {
        let Some(session) = self.get_session(cookies).await? else {
            return Ok(None);
        };

        let span = info_span!("identity.user", http.method = "GET");
        let response = self
            .client
            .get(self.endpoint("/user"))
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(&session.access_token)
            .send()
            .instrument(span)
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json::<User>().await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::warn!("❌ Identity provider rejected the session token");
                Ok(None)
            }
            status => Err(AppError::ResourceFetch(format!(
                "identity provider returned {} for the current user",
                status
            ))),
        }
    }

    async fn begin_sign_in(&self, provider: &str, cookies: &dyn CookieBridge) -> Result<String> {
        let verifier = pkce::generate_verifier();
        let challenge = pkce::challenge_for(&verifier);

        let url = url::Url::parse_with_params(
            &self.endpoint("/authorize"),
            &[
                ("provider", provider),
                ("redirect_to", self.callback_url.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "s256"),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Invalid identity provider URL: {}", e)))?;

        cookies.set(&self.cookies.verifier_name, verifier, &self.cookies.verifier_options());
        tracing::debug!("🔐 Sign-in started with provider: {}", provider);

        Ok(url.into())
    }

    async fn exchange_for_session(&self, code: &str, cookies: &dyn CookieBridge) -> Result<Session> {
        let verifier = cookies.get(&self.cookies.verifier_name);
        if verifier.is_some() {
            cookies.remove(&self.cookies.verifier_name, &self.cookies.verifier_options());
        }

        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::AuthExchange("missing authorization code".to_string()));
        }

        let verifier = verifier.ok_or_else(|| {
            AppError::AuthExchange("no pending sign-in for this browser".to_string())
        })?;

        let session = self
            .request_token(
                "pkce",
                &PkceGrant {
                    auth_code: code,
                    code_verifier: &verifier,
                },
            )
            .await
            .map_err(|e| match e {
                AppError::Http(e) => {
                    AppError::AuthExchange(format!("identity provider unreachable: {}", e))
                }
                other => other,
            })?;

        self.store_session(cookies, &session)?;
        Ok(session)
    }

    async fn sign_out(&self, cookies: &dyn CookieBridge) -> Result<()> {
        let session = cookies
            .get(&self.cookies.session_name)
            .and_then(|raw| decode_session(&raw));

        if let Some(session) = session {
            let span = info_span!("identity.logout", http.method = "POST");
            let result = self
                .client
                .post(self.endpoint("/logout"))
                .header("apikey", self.anon_key.as_str())
                .bearer_auth(&session.access_token)
                .send()
                .instrument(span)
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    tracing::info!("✅ Provider session revoked for user: {}", session.user_id());
                }
                Ok(response) => {
                    tracing::warn!("⚠️ Provider logout returned {}", response.status());
                }
                Err(e) => {
                    tracing::warn!("⚠️ Provider logout failed: {}", e);
                }
            }
        }

        self.clear_session(cookies);
        Ok(())
    }
}
