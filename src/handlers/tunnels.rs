use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_cookies::Cookies;

use crate::{
    error::{AppError, Result},
    handlers::render,
    middleware_layer::csrf::ensure_csrf_cookie,
    models::{
        session::Session,
        tunnel::{Tunnel, TunnelType},
    },
    services::{directory::TunnelDirectory, provisioning::ProvisioningFlow},
    state::AppState,
};

/// Shown when a single tunnel cannot be fetched.
pub const DETAIL_FAILED: &str = "Unable to load this tunnel";

/// The request payload for creating a tunnel.
#[derive(Deserialize, Debug)]
pub struct CreateTunnelForm {
    #[serde(rename = "type", default)]
    pub tunnel_type: TunnelType,
    #[serde(default)]
    pub client_ipv4: String,
    /// The anchor address shown by the creation page.
    #[serde(default)]
    pub server_ipv4: Option<String>,
}

/// The response payload of the tunnel detail surface.
#[derive(Serialize)]
pub struct TunnelDetailView {
    pub tunnel: Option<Tunnel>,
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Renders the user's tunnel directory.
#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    cookies: Cookies,
    Extension(session): Extension<Session>,
) -> Result<Response> {
    let cancel = CancellationToken::new();
    let _abandon_on_drop = cancel.clone().drop_guard();

    let mut directory = TunnelDirectory::new(cancel);
    directory
        .load(
            state.identity.as_ref(),
            state.tunnels.as_ref(),
            &cookies,
            &session,
        )
        .await?;

    let mut view = directory.snapshot();
    view.csrf_token = Some(ensure_csrf_cookie(&state, &cookies));

    render::json(StatusCode::OK, &view)
}

/// Renders the creation form with the resolved anchor address.
#[axum::debug_handler]
pub async fn create_page(State(state): State<AppState>, cookies: Cookies) -> Result<Response> {
    let cancel = CancellationToken::new();
    let _abandon_on_drop = cancel.clone().drop_guard();

    let mut flow = ProvisioningFlow::new(cancel);
    flow.resolve_anchor(state.tunnels.as_ref()).await;

    let mut view = flow.snapshot();
    view.csrf_token = Some(ensure_csrf_cookie(&state, &cookies));

    render::json(StatusCode::OK, &view)
}

/// Submits a new tunnel.
///
/// Success redirects to the directory. A failed precondition or a backend
/// rejection re-renders the form with the message and the entered values.
/// The anchor echoed back by the form is used as is. It is only fetched when
/// the form carries none.
#[axum::debug_handler]
pub async fn create_tunnel(
    State(state): State<AppState>,
    cookies: Cookies,
    Extension(session): Extension<Session>,
    payload: std::result::Result<Json<CreateTunnelForm>, JsonRejection>,
) -> Result<Response> {
    let Json(form) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let cancel = CancellationToken::new();
    let _abandon_on_drop = cancel.clone().drop_guard();

    let mut flow = ProvisioningFlow::new(cancel);
    match form.server_ipv4.as_deref().map(str::trim) {
        Some(anchor) if !anchor.is_empty() => flow.adopt_anchor(anchor)?,
        _ => flow.resolve_anchor(state.tunnels.as_ref()).await,
    }
    flow.set_tunnel_type(form.tunnel_type);
    flow.set_client_ipv4(form.client_ipv4);

    match flow.submit(Some(&session), state.tunnels.as_ref()).await {
        Ok(navigation) => Ok(navigation.into_response()),
        Err(AppError::Cancelled) => Err(AppError::Cancelled),
        Err(e) => {
            tracing::debug!("Tunnel form re-rendered: {}", e);
            let mut view = flow.snapshot();
            view.csrf_token = Some(ensure_csrf_cookie(&state, &cookies));
            render::json(e.status_code(), &view)
        }
    }
}

/// Renders one tunnel together with the commands to configure the client side.
#[axum::debug_handler]
pub async fn tunnel_detail(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(tunnel_id): Path<String>,
) -> Result<Response> {
    if tunnel_id.is_empty()
        || !tunnel_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::NotFound);
    }

    let view = match state
        .tunnels
        .get_tunnel(&session.access_token, &tunnel_id)
        .await
    {
        Ok(tunnel) => TunnelDetailView {
            commands: tunnel.client_commands(),
            tunnel: Some(tunnel),
            message: None,
        },
        Err(AppError::NotFound) => return Err(AppError::NotFound),
        Err(e) => {
            tracing::warn!("❌ Tunnel {} could not be loaded: {}", tunnel_id, e);
            TunnelDetailView {
                tunnel: None,
                commands: Vec::new(),
                message: Some(DETAIL_FAILED.to_string()),
            }
        }
    };

    render::json(StatusCode::OK, &view)
}
