//! Route Configuration
//!
//! Configures all HTTP routes: the WebSocket endpoints, the internal
//! service-to-service API, health probes, and metrics.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::gateway::{admin_ws_handler, customer_ws_handler};
use crate::metrics;
use crate::middleware::service_auth_middleware;
use crate::startup::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // WebSocket gateway endpoints
        .route("/ws", get(customer_ws_handler))
        .route("/ws/admin", get(admin_ws_handler))
        // Internal service-to-service API
        .nest("/internal", internal_routes(state.clone()))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// Internal routes (guarded by the shared service token)
fn internal_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/events/user/{user_id}",
            post(handlers::internal::push_user_event),
        )
        .route(
            "/disconnect/{user_id}",
            post(handlers::internal::force_disconnect),
        )
        .route("/online", get(handlers::internal::online))
        .route_layer(middleware::from_fn_with_state(
            state,
            service_auth_middleware,
        ))
}
