use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::identity::{HttpIdentityProvider, IdentityProvider};
use crate::repositories::tunnel::{HttpTunnelRepository, TunnelRepository};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// The session store (identity provider).
    pub identity: Arc<dyn IdentityProvider>,
    /// The tunnel-provisioning backend.
    pub tunnels: Arc<dyn TunnelRepository>,
}

impl AppState {
    /// Creates a new `AppState` talking to the configured identity provider and backend.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub fn new(config: &Config) -> Result<Self> {
        let identity = HttpIdentityProvider::new(config)?;
        tracing::info!("✅ Identity provider client initialized ({})", config.identity_url);

        let tunnels = HttpTunnelRepository::new(config)?;
        tracing::info!("✅ Backend client initialized ({})", config.backend_url);

        Ok(Self::with_collaborators(
            config.clone(),
            Arc::new(identity),
            Arc::new(tunnels),
        ))
    }

    /// Creates an `AppState` around already-built collaborators.
    pub fn with_collaborators(
        config: Config,
        identity: Arc<dyn IdentityProvider>,
        tunnels: Arc<dyn TunnelRepository>,
    ) -> Self {
        Self {
            config,
            identity,
            tunnels,
        }
    }
}
