//! The tunnel creation flow.
//!
//! ```text
//! ResolvingAnchor ──anchor fetched──▶ Ready ──submit──▶ Submitting ──ok──▶ Succeeded
//!                                       ▲                    │
//!                                       └──edit── Failed ◀───┘ rejected
//! ```
//!
//! Every precondition is checked locally, so an incomplete submission never
//! reaches the backend. A complete one is still refused once the user holds
//! [`TUNNEL_QUOTA`] tunnels.

use std::net::Ipv4Addr;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{AppError, Precondition, Result},
    models::{
        session::Session,
        tunnel::{CreateTunnelRequest, TUNNEL_QUOTA, Tunnel, TunnelType},
    },
    navigation::{Navigation, Route},
    repositories::tunnel::{GENERIC_CREATION_FAILURE, TunnelRepository},
    validation::tunnel::validate_client_ipv4,
};

/// Shown while the anchor address cannot be fetched.
pub const ANCHOR_UNAVAILABLE: &str = "Unable to fetch the tunnel server address";

#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    ResolvingAnchor,
    Ready,
    Submitting,
    Succeeded(Tunnel),
    Failed,
}

impl FlowState {
    fn name(&self) -> &'static str {
        match self {
            FlowState::ResolvingAnchor => "resolving_anchor",
            FlowState::Ready => "ready",
            FlowState::Submitting => "submitting",
            FlowState::Succeeded(_) => "succeeded",
            FlowState::Failed => "failed",
        }
    }

    fn is_editable(&self) -> bool {
        matches!(
            self,
            FlowState::ResolvingAnchor | FlowState::Ready | FlowState::Failed
        )
    }
}

/// Serializable view of the creation form.
#[derive(Debug, Serialize)]
pub struct FlowView {
    pub state: &'static str,
    pub server_ipv4: Option<String>,
    #[serde(rename = "type")]
    pub tunnel_type: TunnelType,
    pub client_ipv4: String,
    pub can_submit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<Tunnel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
}

/// A validated submission ready to send.
struct Submission {
    access_token: String,
    request: CreateTunnelRequest,
}

/// One creation flow instance.
pub struct ProvisioningFlow {
    state: FlowState,
    anchor: Option<String>,
    tunnel_type: TunnelType,
    client_ipv4: String,
    message: Option<String>,
    cancel: CancellationToken,
}

impl ProvisioningFlow {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            state: FlowState::ResolvingAnchor,
            anchor: None,
            tunnel_type: TunnelType::default(),
            client_ipv4: String::new(),
            message: None,
            cancel,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether the submit affordance is enabled.
    pub fn can_submit(&self) -> bool {
        matches!(self.state, FlowState::Ready | FlowState::Failed) && self.anchor.is_some()
    }

    /// Fetches the anchor address from the backend.
    ///
    /// Only acts while the flow is resolving. On failure the flow stays in
    /// `ResolvingAnchor` with a message, and submission remains blocked.
    pub async fn resolve_anchor(&mut self, tunnels: &dyn TunnelRepository) {
        if self.state != FlowState::ResolvingAnchor {
            return;
        }

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            result = tunnels.system_status() => result,
        };

        if self.cancel.is_cancelled() {
            return;
        }

        match result {
            Ok(status) if !status.server_ipv4.trim().is_empty() => {
                let anchor = status.server_ipv4.trim().to_string();
                tracing::debug!("📍 Anchor address resolved: {}", anchor);
                self.anchor = Some(anchor);
                self.message = None;
                self.state = FlowState::Ready;
            }
            Ok(_) => {
                tracing::warn!("⚠️ Backend status reported no anchor address");
                self.message = Some(ANCHOR_UNAVAILABLE.to_string());
            }
            Err(e) => {
                tracing::warn!("❌ Anchor lookup failed: {}", e);
                self.message = Some(ANCHOR_UNAVAILABLE.to_string());
            }
        }
    }

    /// Adopts an anchor address that was already resolved for this form.
    ///
    /// A submission carries the address its creation page showed, so the
    /// tunnel is bound to that value even if the backend now reports another.
    /// Only acts while the flow is resolving.
    pub fn adopt_anchor(&mut self, anchor: &str) -> Result<()> {
        if self.state != FlowState::ResolvingAnchor {
            return Ok(());
        }

        let address: Ipv4Addr = anchor.trim().parse().map_err(|_| {
            AppError::Validation("Server IPv4 address must be a dotted-quad IPv4 address".to_string())
        })?;

        self.anchor = Some(address.to_string());
        self.message = None;
        self.state = FlowState::Ready;
        Ok(())
    }

    pub fn set_tunnel_type(&mut self, tunnel_type: TunnelType) {
        if self.state.is_editable() {
            self.tunnel_type = tunnel_type;
            self.reopen();
        }
    }

    pub fn set_client_ipv4(&mut self, value: impl Into<String>) {
        if self.state.is_editable() {
            self.client_ipv4 = value.into();
            self.reopen();
        }
    }

    /// Editing after a rejection makes the form submittable again.
    fn reopen(&mut self) {
        if self.state == FlowState::Failed {
            self.state = FlowState::Ready;
            self.message = None;
        }
    }

    fn prepare(&self, session: Option<&Session>) -> Result<Submission> {
        let anchor = self.anchor.as_ref().ok_or(Precondition::AnchorUnresolved)?;

        let session = session
            .filter(|s| !s.is_expired(Utc::now()))
            .ok_or(Precondition::SessionAbsent)?;

        if self.client_ipv4.trim().is_empty() {
            return Err(Precondition::ClientAddressMissing.into());
        }

        if !matches!(self.state, FlowState::Ready | FlowState::Failed) {
            return Err(Precondition::NotReady.into());
        }

        let client_ipv4 = validate_client_ipv4(&self.client_ipv4)?;

        Ok(Submission {
            access_token: session.access_token.clone(),
            request: CreateTunnelRequest {
                tunnel_type: self.tunnel_type,
                client_ipv4,
                server_ipv4: anchor.clone(),
                user_id: session.user_id().to_string(),
            },
        })
    }

    /// Refuses creation once the caller owns a full quota of tunnels.
    async fn check_eligibility(&self, access_token: &str, tunnels: &dyn TunnelRepository) -> Result<()> {
        let owned = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
            owned = tunnels.list_tunnels(access_token) => owned?,
        };

        if owned.len() >= TUNNEL_QUOTA {
            tracing::warn!("🚫 Tunnel quota reached ({} owned)", owned.len());
            return Err(Precondition::QuotaReached.into());
        }

        Ok(())
    }

    /// Submits the creation request.
    ///
    /// A failed local precondition returns its error without contacting the
    /// backend. A full quota is refused before the creation call. Both leave
    /// the state untouched. A backend rejection moves the flow to `Failed` and
    /// returns `AppError::CreationRejected` carrying the backend's message. A
    /// backend that cannot be reached, during the quota check or the creation
    /// call, fails the flow with the generic creation message. Success
    /// navigates to the directory.
    pub async fn submit(
        &mut self,
        session: Option<&Session>,
        tunnels: &dyn TunnelRepository,
    ) -> Result<Navigation> {
        let submission = match self.prepare(session) {
            Ok(submission) => submission,
            Err(e) => {
                self.message = Some(e.user_message());
                return Err(e);
            }
        };

        match self.check_eligibility(&submission.access_token, tunnels).await {
            Ok(()) => {}
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e @ AppError::Precondition(_)) => {
                self.message = Some(e.user_message());
                return Err(e);
            }
            Err(e) => {
                tracing::warn!("❌ Tunnel count could not be checked: {}", e);
                return Err(self.fail(GENERIC_CREATION_FAILURE.to_string()));
            }
        }

        self.state = FlowState::Submitting;
        self.message = None;
        tracing::info!(
            "🚇 Creating {} tunnel for user {} ({} -> {})",
            submission.request.tunnel_type,
            submission.request.user_id,
            submission.request.client_ipv4,
            submission.request.server_ipv4
        );

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
            result = tunnels.create_tunnel(&submission.access_token, &submission.request) => result,
        };

        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        match result {
            Ok(tunnel) => {
                tracing::info!("✅ Tunnel created: {}", tunnel.id);
                self.state = FlowState::Succeeded(tunnel);
                Ok(Navigation::Navigate(Route::Home))
            }
            Err(AppError::CreationRejected(message)) => Err(self.fail(message)),
            Err(e) => {
                tracing::warn!("❌ Tunnel creation failed: {}", e);
                Err(self.fail(GENERIC_CREATION_FAILURE.to_string()))
            }
        }
    }

    fn fail(&mut self, message: String) -> AppError {
        self.state = FlowState::Failed;
        self.message = Some(message.clone());
        AppError::CreationRejected(message)
    }

    pub fn snapshot(&self) -> FlowView {
        FlowView {
            state: self.state.name(),
            server_ipv4: self.anchor.clone(),
            tunnel_type: self.tunnel_type,
            client_ipv4: self.client_ipv4.clone(),
            can_submit: self.can_submit(),
            message: self.message.clone(),
            tunnel: match &self.state {
                FlowState::Succeeded(tunnel) => Some(tunnel.clone()),
                _ => None,
            },
            csrf_token: None,
        }
    }
}
