//! # Commerce Gateway
//!
//! Real-time WebSocket gateway for a multi-service e-commerce platform:
//! - Bearer-token connection authentication against the identity service
//! - Room-scoped event fan-out (dashboard, analytics, chat, per-user rooms)
//! - Typed event relays with per-event authorization
//! - Internal HTTP API for server-originated pushes
//!
//! ## Module Structure
//!
//! ```text
//! commerce_gateway/
//! +-- config/     Configuration management
//! +-- auth/       Handshake authentication and identity types
//! +-- gateway/    Connections, rooms, relays, report tasks
//! +-- http/       Routes, health probes, internal push API
//! +-- middleware/ CORS, request logging, service auth
//! +-- shared/     Common utilities (errors)
//! ```

// Configuration module
pub mod config;

// Handshake authentication
pub mod auth;

// Real-time gateway core
pub mod gateway;

// HTTP routes and handlers
pub mod http;

// Tower middleware
pub mod middleware;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;

// Prometheus metrics
pub mod metrics;
