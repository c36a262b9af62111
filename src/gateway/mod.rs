//! Real-time Gateway
//!
//! Room-scoped event fan-out over WebSocket connections.

pub mod connection;
pub mod events;
pub mod handler;
pub mod hub;
pub mod registry;
pub mod relay;
pub mod reports;

pub use connection::{ConnId, ConnectionHandle};
pub use events::{ClientEvent, ServerEvent};
pub use handler::{admin_ws_handler, customer_ws_handler};
pub use hub::{Gateway, ADMIN_ANALYTICS, ADMIN_DASHBOARD, ANALYTICS_LIVE};
pub use registry::{ActiveConnectionRegistry, OnlineEntry};
