//! Connection Authentication
//!
//! Bearer-token verification against the identity service, with a
//! degraded-trust local fallback for the admin endpoint.

pub mod identity;
pub mod verifier;

pub use identity::{Identity, Role, TrustLevel};
pub use verifier::{
    authenticate_admin, authenticate_customer, AuthError, HttpIdentityVerifier, IdentityVerifier,
};
