//! Internal Service-to-Service Handlers
//!
//! Entry points for the commerce API to push server-originated events to
//! connected users: cart/order/wishlist/inventory updates and forced
//! disconnects. Delivery is fire-and-forget; an offline target is reported
//! as `delivered: false`, never as an error.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::events::{InventoryBroadcast, ServerEvent};
use crate::gateway::OnlineEntry;
use crate::shared::AppError;
use crate::startup::AppState;

/// Server-originated event push request.
#[derive(Debug, Deserialize)]
pub struct PushEventRequest {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub delivered: bool,
}

#[derive(Debug, Deserialize)]
pub struct ForceDisconnectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /internal/events/user/{user_id}`
///
/// Push one update event to a user's current connection.
pub async fn push_user_event(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<PushEventRequest>,
) -> Result<Json<PushResponse>, AppError> {
    let event = match request.event.as_str() {
        "cart:updated" => ServerEvent::CartUpdated(request.data),
        "order:updated" => ServerEvent::OrderUpdated(request.data),
        "wishlist:updated" => ServerEvent::WishlistUpdated(request.data),
        "inventory:updated" => {
            let payload: InventoryBroadcast = serde_json::from_value(request.data)
                .map_err(|e| AppError::BadRequest(format!("invalid inventory payload: {}", e)))?;
            ServerEvent::InventoryUpdated(payload)
        }
        other => {
            return Err(AppError::BadRequest(format!(
                "unsupported push event: {}",
                other
            )))
        }
    };

    let delivered = state.gateway.emit_to_user(&user_id, event);
    tracing::debug!(user_id = %user_id, event = %request.event, delivered, "Internal event push");
    Ok(Json(PushResponse { delivered }))
}

/// `POST /internal/disconnect/{user_id}`
///
/// Tell a user's connection to end its session; the client is expected to
/// close and redirect to login.
pub async fn force_disconnect(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<ForceDisconnectRequest>,
) -> Result<Json<PushResponse>, AppError> {
    let reason = request
        .reason
        .unwrap_or_else(|| "Session terminated by server".into());

    let delivered = state
        .gateway
        .emit_to_user(&user_id, ServerEvent::ForceDisconnect { reason });
    tracing::info!(user_id = %user_id, delivered, "Force disconnect requested");
    Ok(Json(PushResponse { delivered }))
}

/// `GET /internal/online`
///
/// Snapshot of the active-connection registry.
pub async fn online(State(state): State<AppState>) -> Json<Vec<OnlineEntry>> {
    Json(state.gateway.registry.snapshot())
}
