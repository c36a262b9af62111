//! HTTP Surface
//!
//! Routes, health probes, and the internal push API.

pub mod handlers;
pub mod routes;
