use serde::{Deserialize, Serialize};

/// Read-only projection of the signed-in user, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The subject id of the user.
    pub id: String,
    /// The user's email address, when the provider shares it.
    #[serde(default)]
    pub email: Option<String>,
    /// The user's phone number, when the provider shares it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// When the user last signed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sign_in_at: Option<String>,
}
