use std::net::Ipv4Addr;

use crate::error::{AppError, Precondition, Result};

/// Validates the client endpoint address of a new tunnel.
///
/// # Arguments
///
/// * `value` - The address as typed by the user.
///
/// # Returns
///
/// A `Result` containing the trimmed dotted-quad address.
pub fn validate_client_ipv4(value: &str) -> Result<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(Precondition::ClientAddressMissing.into());
    }

    let address: Ipv4Addr = value.parse().map_err(|_| {
        AppError::Validation("Client IPv4 address must be a dotted-quad IPv4 address".to_string())
    })?;

    if address.is_unspecified() || address.is_broadcast() || address.is_multicast() {
        return Err(AppError::Validation(
            "Client IPv4 address cannot be used as a tunnel endpoint".to_string(),
        ));
    }

    Ok(address.to_string())
}
