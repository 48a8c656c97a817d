#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request, response::Response};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use tower_cookies::cookie::time::Duration as CookieDuration;
use zeroize::Zeroizing;

use tunnel_portal::{
    build_router,
    config::Config,
    error::{AppError, Result},
    identity::{CookieBridge, CookieOptions, IdentityProvider},
    models::{
        session::Session,
        tunnel::{CreateTunnelRequest, SystemStatus, Tunnel, TunnelStatus, TunnelType},
        user::User,
    },
    repositories::tunnel::TunnelRepository,
    state::AppState,
};

pub const SESSION_COOKIE: &str = "tb-auth-token";
pub const VERIFIER_COOKIE: &str = "tb-auth-token-code-verifier";
pub const GOOD_CODE: &str = "good-code";
pub const ANCHOR: &str = "192.0.2.1";

pub fn test_config() -> Config {
    Config {
        backend_url: "http://backend.invalid".to_string(),
        backend_api_key: Zeroizing::new("frontend-key".to_string()),
        identity_url: "http://identity.invalid".to_string(),
        identity_anon_key: Zeroizing::new("anon".to_string()),
        public_url: "http://portal.local".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        session_cookie_name: SESSION_COOKIE.to_string(),
        session_duration_days: 7,
        http_timeout: Duration::from_secs(5),
        is_production: false,
    }
}

pub fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: Some(format!("{}@example.com", id)),
        phone: None,
        last_sign_in_at: None,
    }
}

pub fn session_for(user_id: &str) -> Session {
    Session {
        access_token: format!("access-{}", user_id),
        refresh_token: format!("refresh-{}", user_id),
        expires_at: Utc::now() + chrono::Duration::hours(1),
        user: user(user_id),
    }
}

pub fn tunnel(id: &str, owner: &str, tunnel_type: TunnelType, status: TunnelStatus) -> Tunnel {
    Tunnel {
        id: id.to_string(),
        tunnel_type,
        client_ipv4: "198.51.100.7".to_string(),
        server_ipv4: ANCHOR.to_string(),
        status,
        created_at: Utc::now(),
        user_id: Some(owner.to_string()),
        endpoint_local: Some("2001:db8:ffff::1/64".to_string()),
        endpoint_remote: Some("2001:db8:ffff::2/64".to_string()),
        delegated_prefix_1: Some("2001:db8:1::/64".to_string()),
        delegated_prefix_2: None,
        delegated_prefix_3: None,
    }
}

fn session_options() -> CookieOptions {
    CookieOptions::http_only(CookieDuration::days(7), false)
}

/// Identity provider keyed by session cookie value.
///
/// Cookie values starting with `stale-` are refreshed into `fresh-` values on
/// lookup, and `unreachable` makes the lookup fail.
#[derive(Default)]
pub struct FakeIdentity {
    sessions: Mutex<HashMap<String, Session>>,
    pub exchange_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub user_lookup_fails: AtomicBool,
}

impl FakeIdentity {
    pub fn with_session(cookie_value: &str, session: Session) -> Self {
        let identity = Self::default();
        identity.insert(cookie_value, session);
        identity
    }

    pub fn insert(&self, cookie_value: &str, session: Session) {
        self.sessions
            .lock()
            .unwrap()
            .insert(cookie_value.to_string(), session);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn get_session(&self, cookies: &dyn CookieBridge) -> Result<Option<Session>> {
        let Some(value) = cookies.get(SESSION_COOKIE) else {
            return Ok(None);
        };

        if value == "unreachable" {
            return Err(AppError::Internal("identity provider unreachable".to_string()));
        }

        let session = self.sessions.lock().unwrap().get(&value).cloned();
        match session {
            Some(session) => {
                if let Some(rest) = value.strip_prefix("stale-") {
                    let fresh = format!("fresh-{}", rest);
                    self.insert(&fresh, session.clone());
                    cookies.set(SESSION_COOKIE, fresh, &session_options());
                }
                Ok(Some(session))
            }
            None => {
                cookies.remove(SESSION_COOKIE, &session_options());
                Ok(None)
            }
        }
    }

    async fn get_user(&self, cookies: &dyn CookieBridge) -> Result<Option<User>> {
        if self.user_lookup_fails.load(Ordering::SeqCst) {
            return Err(AppError::ResourceFetch("user lookup failed".to_string()));
        }
        Ok(self.get_session(cookies).await?.map(|s| s.user))
    }

    async fn begin_sign_in(&self, provider: &str, cookies: &dyn CookieBridge) -> Result<String> {
        cookies.set(
            VERIFIER_COOKIE,
            "verifier-1".to_string(),
            &CookieOptions::http_only(CookieDuration::minutes(10), false),
        );
        Ok(format!(
            "http://identity.invalid/auth/v1/authorize?provider={}",
            provider
        ))
    }

    async fn exchange_for_session(&self, code: &str, cookies: &dyn CookieBridge) -> Result<Session> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);

        let verifier = cookies.get(VERIFIER_COOKIE);
        if verifier.is_some() {
            cookies.remove(
                VERIFIER_COOKIE,
                &CookieOptions::http_only(CookieDuration::minutes(10), false),
            );
        }

        if verifier.is_none() {
            return Err(AppError::AuthExchange("no pending sign-in".to_string()));
        }
        if code != GOOD_CODE {
            return Err(AppError::AuthExchange("invalid code".to_string()));
        }

        let session = session_for("user-1");
        self.insert("session-user-1", session.clone());
        cookies.set(SESSION_COOKIE, "session-user-1".to_string(), &session_options());
        Ok(session)
    }

    async fn sign_out(&self, cookies: &dyn CookieBridge) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        cookies.remove(SESSION_COOKIE, &session_options());
        Ok(())
    }
}

/// In-memory backend that scopes listings by access token.
pub struct FakeTunnels {
    tunnels: Mutex<Vec<Tunnel>>,
    scripted_listings: Mutex<Vec<Vec<Tunnel>>>,
    anchor: Mutex<Option<String>>,
    reject_with: Mutex<Option<String>>,
    pub listing_fails: AtomicBool,
    pub list_delay: Mutex<Option<Duration>>,
    pub list_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
}

impl Default for FakeTunnels {
    fn default() -> Self {
        Self {
            tunnels: Mutex::new(Vec::new()),
            scripted_listings: Mutex::new(Vec::new()),
            anchor: Mutex::new(Some(ANCHOR.to_string())),
            reject_with: Mutex::new(None),
            listing_fails: AtomicBool::new(false),
            list_delay: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeTunnels {
    pub fn with_tunnels(tunnels: Vec<Tunnel>) -> Self {
        let fake = Self::default();
        *fake.tunnels.lock().unwrap() = tunnels;
        fake
    }

    /// Listings returned (in order) before falling back to the stored tunnels.
    pub fn script_listings(&self, listings: Vec<Vec<Tunnel>>) {
        *self.scripted_listings.lock().unwrap() = listings;
    }

    pub fn set_anchor(&self, anchor: Option<&str>) {
        *self.anchor.lock().unwrap() = anchor.map(str::to_string);
    }

    pub fn reject_creation(&self, message: &str) {
        *self.reject_with.lock().unwrap() = Some(message.to_string());
    }

    pub fn creations(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    fn owner_of(access_token: &str) -> &str {
        access_token.strip_prefix("access-").unwrap_or(access_token)
    }
}

#[async_trait]
impl TunnelRepository for FakeTunnels {
    async fn list_tunnels(&self, access_token: &str) -> Result<Vec<Tunnel>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(AppError::ResourceFetch("backend unavailable".to_string()));
        }

        {
            let mut scripted = self.scripted_listings.lock().unwrap();
            if !scripted.is_empty() {
                return Ok(scripted.remove(0));
            }
        }

        let owner = Self::owner_of(access_token);
        Ok(self
            .tunnels
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id.as_deref() == Some(owner))
            .cloned()
            .collect())
    }

    async fn get_tunnel(&self, access_token: &str, id: &str) -> Result<Tunnel> {
        if id == "explode" {
            return Err(AppError::ResourceFetch("backend unavailable".to_string()));
        }
        let owner = Self::owner_of(access_token);
        self.tunnels
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id && t.user_id.as_deref() == Some(owner))
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn system_status(&self) -> Result<SystemStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        match self.anchor.lock().unwrap().clone() {
            Some(server_ipv4) => Ok(SystemStatus {
                server_ipv4,
                status: Some("operational".to_string()),
                version: None,
            }),
            None => Err(AppError::ResourceFetch("status unavailable".to_string())),
        }
    }

    async fn create_tunnel(&self, _access_token: &str, request: &CreateTunnelRequest) -> Result<Tunnel> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(message) = self.reject_with.lock().unwrap().clone() {
            return Err(AppError::CreationRejected(message));
        }

        let mut created = tunnel(
            &format!("tun{}", n),
            &request.user_id,
            request.tunnel_type,
            TunnelStatus::Pending,
        );
        created.client_ipv4 = request.client_ipv4.clone();
        created.server_ipv4 = request.server_ipv4.clone();
        self.tunnels.lock().unwrap().push(created.clone());
        Ok(created)
    }
}

// Shared test context
pub struct TestContext {
    pub identity: Arc<FakeIdentity>,
    pub tunnels: Arc<FakeTunnels>,
    pub app: Router,
}

impl TestContext {
    pub fn new(identity: FakeIdentity, tunnels: FakeTunnels) -> Self {
        let identity = Arc::new(identity);
        let tunnels = Arc::new(tunnels);
        let state = AppState::with_collaborators(test_config(), identity.clone(), tunnels.clone());

        Self {
            identity,
            tunnels,
            app: build_router(state),
        }
    }

    /// A context with one signed-in user (`user-1`, cookie `session-user-1`).
    pub fn signed_in(tunnels: FakeTunnels) -> Self {
        Self::new(
            FakeIdentity::with_session("session-user-1", session_for("user-1")),
            tunnels,
        )
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, cookie: Option<&str>, csrf: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    if let Some(csrf) = csrf {
        builder = builder.header("x-csrf-token", csrf);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn location(response: &Response) -> Option<String> {
    response
        .headers()
        .get("location")
        .map(|v| v.to_str().unwrap().to_string())
}

pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Cookie jar for driving services without an HTTP request.
#[derive(Default)]
pub struct MemoryJar {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryJar {
    pub fn with(name: &str, value: &str) -> Self {
        let jar = Self::default();
        jar.values
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        jar
    }
}

impl CookieBridge for MemoryJar {
    fn get(&self, name: &str) -> Option<String> {
        self.values.lock().unwrap().get(name).cloned()
    }

    fn set(&self, name: &str, value: String, _options: &CookieOptions) {
        self.values.lock().unwrap().insert(name.to_string(), value);
    }

    fn remove(&self, name: &str, _options: &CookieOptions) {
        self.values.lock().unwrap().remove(name);
    }
}
