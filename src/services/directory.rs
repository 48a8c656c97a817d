//! The authenticated user's tunnel directory.

use std::collections::HashMap;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{AppError, Result},
    identity::{CookieBridge, IdentityProvider},
    models::{
        session::Session,
        tunnel::{TUNNEL_QUOTA, Tunnel},
        user::User,
    },
    navigation::Route,
    repositories::tunnel::TunnelRepository,
};

/// Shown when the listing cannot be fetched.
pub const LISTING_FAILED: &str = "Unable to load your tunnels";
/// Shown when the signed-in identity cannot be confirmed.
pub const IDENTITY_FAILED: &str = "Unable to verify your identity";

/// Render state of the directory.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryState {
    /// Nothing fetched yet.
    Loading,
    /// Fetched, and the user owns no tunnels.
    Empty,
    /// Fetched, with at least one tunnel.
    Populated(Vec<Tunnel>),
    /// The fetch failed; the page still renders with this message.
    Failed { message: String },
}

/// Serializable view model of the directory page.
#[derive(Debug, Serialize)]
pub struct DirectoryView {
    pub state: &'static str,
    pub user: Option<User>,
    pub tunnels: Vec<Tunnel>,
    pub can_create: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
}

/// One directory view instance.
///
/// Results that arrive after the instance's token is cancelled are dropped
/// without touching its state.
pub struct TunnelDirectory {
    state: DirectoryState,
    user: Option<User>,
    cancel: CancellationToken,
}

impl TunnelDirectory {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            state: DirectoryState::Loading,
            user: None,
            cancel,
        }
    }

    pub fn state(&self) -> &DirectoryState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Whether the creation affordance is offered.
    ///
    /// Only a fetched count below the quota enables it.
    pub fn can_create(&self) -> bool {
        match &self.state {
            DirectoryState::Empty => true,
            DirectoryState::Populated(tunnels) => tunnels.len() < TUNNEL_QUOTA,
            DirectoryState::Loading | DirectoryState::Failed { .. } => false,
        }
    }

    /// Fetches the user's identity and tunnels concurrently and applies both.
    ///
    /// Fetch failures are absorbed into [`DirectoryState::Failed`]. The only
    /// error returned is `AppError::Cancelled`, when the view was abandoned
    /// before the results arrived.
    pub async fn load(
        &mut self,
        identity: &dyn IdentityProvider,
        tunnels: &dyn TunnelRepository,
        cookies: &dyn CookieBridge,
        session: &Session,
    ) -> Result<()> {
        let fetch = async {
            tokio::join!(
                identity.get_user(cookies),
                tunnels.list_tunnels(&session.access_token)
            )
        };

        let (user, listing) = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!("🚫 Directory load abandoned");
                return Err(AppError::Cancelled);
            }
            results = fetch => results,
        };

        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        self.apply(user, listing);
        Ok(())
    }

    fn apply(&mut self, user: Result<Option<User>>, listing: Result<Vec<Tunnel>>) {
        let user = match user {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!("❌ Session owner could not be confirmed by the identity provider");
                self.fail(IDENTITY_FAILED);
                return;
            }
            Err(e) => {
                tracing::warn!("❌ Identity fetch failed: {}", e);
                self.fail(IDENTITY_FAILED);
                return;
            }
        };

        match listing {
            Ok(fetched) => {
                let merged = self.merge(fetched);
                tracing::debug!("📋 Directory loaded: {} tunnel(s) for {}", merged.len(), user.id);
                self.user = Some(user);
                self.state = if merged.is_empty() {
                    DirectoryState::Empty
                } else {
                    DirectoryState::Populated(merged)
                };
            }
            Err(e) => {
                tracing::warn!("❌ Tunnel listing failed: {}", e);
                self.user = Some(user);
                self.fail(LISTING_FAILED);
            }
        }
    }

    fn fail(&mut self, message: &str) {
        self.state = DirectoryState::Failed {
            message: message.to_string(),
        };
    }

    /// Keeps observed facts stable across refreshes: a tunnel's type never
    /// changes and its status never moves back in the lifecycle.
    ///
    /// Only a directory loaded more than once is affected. The dashboard
    /// handler builds a fresh directory per request, so over HTTP each render
    /// shows the backend's listing as fetched.
    fn merge(&self, fetched: Vec<Tunnel>) -> Vec<Tunnel> {
        let known: HashMap<&str, &Tunnel> = match &self.state {
            DirectoryState::Populated(previous) => {
                previous.iter().map(|t| (t.id.as_str(), t)).collect()
            }
            _ => HashMap::new(),
        };

        fetched
            .into_iter()
            .map(|mut tunnel| {
                if let Some(previous) = known.get(tunnel.id.as_str()) {
                    if previous.tunnel_type != tunnel.tunnel_type {
                        tracing::warn!(
                            "⚠️ Backend reported type {} for tunnel {} (was {}), keeping {}",
                            tunnel.tunnel_type,
                            tunnel.id,
                            previous.tunnel_type,
                            previous.tunnel_type
                        );
                        tunnel.tunnel_type = previous.tunnel_type;
                    }
                    if tunnel.status.rank() < previous.status.rank() {
                        tracing::debug!(
                            "Ignoring status regression of tunnel {}: {:?} -> {:?}",
                            tunnel.id,
                            previous.status,
                            tunnel.status
                        );
                        tunnel.status = previous.status;
                    }
                }
                tunnel
            })
            .collect()
    }

    /// Builds the serializable view of the current state.
    pub fn snapshot(&self) -> DirectoryView {
        let can_create = self.can_create();
        let (state, tunnels, message) = match &self.state {
            DirectoryState::Loading => ("loading", Vec::new(), None),
            DirectoryState::Empty => ("empty", Vec::new(), None),
            DirectoryState::Populated(tunnels) => ("populated", tunnels.clone(), None),
            DirectoryState::Failed { message } => ("failed", Vec::new(), Some(message.clone())),
        };

        DirectoryView {
            state,
            user: self.user.clone(),
            tunnels,
            can_create,
            create_url: can_create.then(|| Route::CreateTunnel.path()),
            message,
            csrf_token: None,
        }
    }
}
