//! HTTP Handlers

pub mod health;
pub mod internal;
