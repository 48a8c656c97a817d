use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of tunnels a single user may hold.
pub const TUNNEL_QUOTA: usize = 2;

/// Encapsulation type of a tunnel. Immutable once the tunnel exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelType {
    #[default]
    Sit,
    Gre,
}

impl TunnelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelType::Sit => "sit",
            TunnelType::Gre => "gre",
        }
    }
}

impl fmt::Display for TunnelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-owned lifecycle status of a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelStatus {
    Pending,
    Active,
    Error,
    #[serde(other)]
    Unknown,
}

impl TunnelStatus {
    /// Position in the lifecycle. Observed statuses never move to a lower rank.
    pub fn rank(&self) -> u8 {
        match self {
            TunnelStatus::Unknown => 0,
            TunnelStatus::Pending => 1,
            TunnelStatus::Active | TunnelStatus::Error => 2,
        }
    }
}

/// Represents a tunnel as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tunnel {
    /// The backend identifier of the tunnel (also the interface name).
    pub id: String,
    /// The encapsulation type.
    #[serde(rename = "type")]
    pub tunnel_type: TunnelType,
    /// The user's public IPv4 endpoint.
    pub client_ipv4: String,
    /// The service-side anchor IPv4 endpoint.
    pub server_ipv4: String,
    /// The current lifecycle status.
    pub status: TunnelStatus,
    /// The timestamp when the tunnel was created.
    pub created_at: DateTime<Utc>,
    /// The owner of the tunnel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Server-side IPv6 address of the point-to-point link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_local: Option<String>,
    /// Client-side IPv6 address of the point-to-point link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_prefix_1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_prefix_2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_prefix_3: Option<String>,
}

impl Tunnel {
    /// The `ip` commands a client runs to bring its side of the tunnel up.
    ///
    /// Lines whose inputs the backend did not report are left out.
    pub fn client_commands(&self) -> Vec<String> {
        let id = &self.id;
        let mut commands = vec![
            format!(
                "ip tunnel add {} mode {} local {} remote {} ttl 255",
                id, self.tunnel_type, self.client_ipv4, self.server_ipv4
            ),
            format!("ip link set {} up", id),
        ];

        if let Some(remote) = non_empty(&self.endpoint_remote) {
            commands.push(format!("ip -6 addr add {} dev {}", remote, id));
        }

        for prefix in [&self.delegated_prefix_1, &self.delegated_prefix_2]
            .into_iter()
            .filter_map(non_empty)
        {
            let network = prefix.strip_suffix("/64").unwrap_or(prefix);
            commands.push(format!("ip -6 addr add {}1/64 dev {}", network, id));
        }

        if let Some(local) = non_empty(&self.endpoint_local) {
            let gateway = local.strip_suffix("/64").unwrap_or(local);
            commands.push(format!("ip -6 route add ::/0 via {} dev {}", gateway, id));
        }

        commands
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Body of `POST /tunnels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTunnelRequest {
    #[serde(rename = "type")]
    pub tunnel_type: TunnelType,
    pub client_ipv4: String,
    pub server_ipv4: String,
    pub user_id: String,
}

/// Response of `GET /system/status`. Only the anchor address is consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub server_ipv4: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
