//! Bearer-token verification for the connection handshake.
//!
//! The primary path asks the identity service who the token belongs to. When
//! that service is unreachable (not when it explicitly rejects), the admin
//! handshake falls back to verifying the token signature locally with the
//! shared secret. A connection admitted through the fallback is tagged
//! [`TrustLevel::Degraded`] and denied privileged emits instead of being
//! granted implicit admin rights.

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

use super::identity::{Identity, Role, TrustLevel};
use crate::config::IdentitySettings;

/// Handshake authentication failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    /// The identity service (or local verification) explicitly denied the token.
    #[error("authentication rejected: {0}")]
    Rejected(String),

    /// The token is structurally invalid or its signature does not verify.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The identity service could not be reached within the timeout.
    #[error("identity service unavailable: {0}")]
    Upstream(String),
}

/// Verifies bearer tokens against the identity service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Resolve the identity behind a bearer token.
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;

    /// Whether the identity service currently answers at all (readiness probe).
    async fn is_reachable(&self) -> bool;
}

/// Expected response shape of the identity service's "who am I" endpoint.
#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
    user: Option<Identity>,
}

/// HTTP-backed verifier calling `GET {base_url}{verify_path}`.
pub struct HttpIdentityVerifier {
    client: reqwest::Client,
    settings: IdentitySettings,
}

impl HttpIdentityVerifier {
    pub fn new(settings: IdentitySettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let response = self
            .client
            .get(self.settings.verify_url())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(format!(
                "identity service returned {}",
                status
            )));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Upstream(format!("malformed verify response: {}", e)))?;

        match body {
            VerifyResponse {
                success: true,
                user: Some(identity),
            } => Ok(identity),
            _ => Err(AuthError::Rejected("identity service denied token".into())),
        }
    }

    async fn is_reachable(&self) -> bool {
        self.client
            .get(self.settings.base_url.trim_end_matches('/').to_string())
            .send()
            .await
            .is_ok()
    }
}

/// JWT claims accepted by the local fallback verification.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    #[serde(default = "default_role")]
    role: Role,
    #[allow(dead_code)]
    exp: usize,
}

fn default_role() -> Role {
    Role::Customer
}

/// Verify a token's signature locally and synthesize a minimal identity.
///
/// The role comes from the token claims; it is never forced to admin.
pub fn decode_local(token: &str, secret: &str) -> Result<Identity, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    let claims = token_data.claims;
    Ok(Identity {
        id: claims.sub,
        email: claims.email,
        first_name: None,
        last_name: None,
        role: claims.role,
    })
}

/// Authenticate a connection to the admin endpoint.
///
/// Requires an admin identity. On identity-service outage only, falls back to
/// local signature verification and returns a degraded trust level.
pub async fn authenticate_admin(
    verifier: &dyn IdentityVerifier,
    jwt_secret: &str,
    token: &str,
) -> Result<(Identity, TrustLevel), AuthError> {
    match verifier.verify(token).await {
        Ok(identity) if identity.is_admin() => Ok((identity, TrustLevel::Full)),
        Ok(identity) => Err(AuthError::Rejected(format!(
            "admin role required, got {:?}",
            identity.role
        ))),
        Err(AuthError::Upstream(reason)) => {
            tracing::warn!(
                reason = %reason,
                "Identity service unreachable, attempting local token verification"
            );
            let identity = decode_local(token, jwt_secret)?;
            if !identity.is_admin() {
                return Err(AuthError::Rejected("admin role required".into()));
            }
            Ok((identity, TrustLevel::Degraded))
        }
        Err(e) => Err(e),
    }
}

/// Authenticate a connection to the customer endpoint.
///
/// Any verified identity is accepted. There is no fallback path here; an
/// identity-service outage fails closed.
pub async fn authenticate_customer(
    verifier: &dyn IdentityVerifier,
    token: &str,
) -> Result<(Identity, TrustLevel), AuthError> {
    let identity = verifier.verify(token).await?;
    Ok((identity, TrustLevel::Full))
}
