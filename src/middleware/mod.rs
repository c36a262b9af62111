//! Middleware
//!
//! Tower middleware for request processing.

pub mod cors;
pub mod logging;
pub mod service_auth;

pub use service_auth::service_auth_middleware;
