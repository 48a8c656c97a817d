//! Access to the tunnel-provisioning backend.
//!
//! The backend owns tunnel state; this module only speaks its REST API.
//! Listing results are scoped by the caller's bearer credential, never
//! filtered here.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{Instrument, info_span};
use zeroize::Zeroizing;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::tunnel::{CreateTunnelRequest, SystemStatus, Tunnel},
};

/// Message surfaced when the backend rejects a creation without explaining why.
pub const GENERIC_CREATION_FAILURE: &str = "Failed to create tunnel";

/// The tunnel resource API.
#[async_trait]
pub trait TunnelRepository: Send + Sync {
    /// `GET /tunnels`, scoped to the owner of `access_token`.
    async fn list_tunnels(&self, access_token: &str) -> Result<Vec<Tunnel>>;

    /// `GET /tunnels/{id}`.
    async fn get_tunnel(&self, access_token: &str, id: &str) -> Result<Tunnel>;

    /// `GET /system/status`.
    async fn system_status(&self) -> Result<SystemStatus>;

    /// `POST /tunnels`.
    async fn create_tunnel(&self, access_token: &str, request: &CreateTunnelRequest) -> Result<Tunnel>;
}

/// Failure body of the backend.
#[derive(Deserialize, Default)]
struct BackendError {
    message: Option<String>,
    error: Option<String>,
}

impl BackendError {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.error)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }
}

/// `TunnelRepository` backed by the REST API at `BACKEND_URL`.
pub struct HttpTunnelRepository {
    client: Client,
    base_url: String,
    api_key: Zeroizing<String>,
}

impl HttpTunnelRepository {
    /// Creates a new `HttpTunnelRepository`.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("tunnel-portal/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.backend_url.clone(),
            api_key: config.backend_api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the service credential and, when acting for a user, their bearer token.
    fn authorized(&self, builder: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        let builder = builder.header("X-API-Key", self.api_key.as_str());
        match access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::ResourceFetch(format!("{} request failed: {}", what, e)))?;

        let response = ensure_success(response, what).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::ResourceFetch(format!("{} response malformed: {}", what, e)))
    }
}

async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(AppError::NotFound),
        status => {
            let detail = response
                .json::<BackendError>()
                .await
                .unwrap_or_default()
                .into_message()
                .unwrap_or_else(|| format!("backend returned {}", status));
            Err(AppError::ResourceFetch(format!("{}: {}", what, detail)))
        }
    }
}

#[async_trait]
impl TunnelRepository for HttpTunnelRepository {
    async fn list_tunnels(&self, access_token: &str) -> Result<Vec<Tunnel>> {
        let span = info_span!("backend.list_tunnels", http.method = "GET");
        let builder = self.authorized(self.client.get(self.url("/tunnels")), Some(access_token));

        let tunnels: Vec<Tunnel> = self
            .fetch_json(builder, "Tunnel listing")
            .instrument(span)
            .await?;

        tracing::debug!("📋 Backend returned {} tunnel(s)", tunnels.len());
        Ok(tunnels)
    }

    async fn get_tunnel(&self, access_token: &str, id: &str) -> Result<Tunnel> {
        let span = info_span!("backend.get_tunnel", http.method = "GET", tunnel_id = id);
        let builder = self.authorized(
            self.client.get(self.url(&format!("/tunnels/{}", id))),
            Some(access_token),
        );

        self.fetch_json(builder, "Tunnel lookup")
            .instrument(span)
            .await
    }

    async fn system_status(&self) -> Result<SystemStatus> {
        let span = info_span!("backend.system_status", http.method = "GET");
        let builder = self.authorized(self.client.get(self.url("/system/status")), None);

        self.fetch_json(builder, "System status")
            .instrument(span)
            .await
    }

    async fn create_tunnel(&self, access_token: &str, request: &CreateTunnelRequest) -> Result<Tunnel> {
        let span = info_span!(
            "backend.create_tunnel",
            http.method = "POST",
            tunnel_type = %request.tunnel_type
        );

        let response = self
            .authorized(self.client.post(self.url("/tunnels")), Some(access_token))
            .json(request)
            .send()
            .instrument(span)
            .await
            .map_err(|e| {
                tracing::warn!("❌ Tunnel creation request failed: {}", e);
                AppError::CreationRejected(GENERIC_CREATION_FAILURE.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<BackendError>()
                .await
                .unwrap_or_default()
                .into_message()
                .unwrap_or_else(|| GENERIC_CREATION_FAILURE.to_string());
            tracing::warn!("❌ Backend rejected tunnel creation ({}): {}", status, message);
            return Err(AppError::CreationRejected(message));
        }

        response.json::<Tunnel>().await.map_err(|e| {
            tracing::error!("❌ Created tunnel response malformed: {}", e);
            AppError::CreationRejected(GENERIC_CREATION_FAILURE.to_string())
        })
    }
}
