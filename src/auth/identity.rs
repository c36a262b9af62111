//! Identity value types resolved during the connection handshake.

use serde::{Deserialize, Serialize};

/// Role attached to an authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    /// Any non-admin role the identity service may return
    #[serde(other)]
    Customer,
}

/// How much the gateway trusts a connection's identity.
///
/// `Full` means the identity service confirmed the token. `Degraded` means
/// the identity service was unreachable and only the token signature was
/// verified locally; degraded connections may receive broadcasts but are
/// denied every privileged emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustLevel {
    Full,
    Degraded,
}

/// Resolved user identity attached to a connection for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Display name for dashboard notices.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self.email.clone(),
        }
    }
}
