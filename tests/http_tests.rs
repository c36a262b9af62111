//! HTTP Surface Tests
//!
//! Exercises the router with a stub identity verifier: health probes, the
//! service-token gate on internal routes, and handshake refusals.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use commerce_gateway::auth::{AuthError, Identity, IdentityVerifier, Role, TrustLevel};
use commerce_gateway::config::{
    CorsSettings, IdentitySettings, InternalSettings, ReportSettings, ServerSettings, Settings,
    WebSocketSettings,
};
use commerce_gateway::gateway::{ConnectionHandle, Gateway};
use commerce_gateway::http::routes::create_router;
use commerce_gateway::startup::AppState;
use tower::ServiceExt;

const SERVICE_TOKEN: &str = "test-service-token";

/// Verifier that always rejects; handshake paths under test never succeed.
struct RejectingVerifier;

#[async_trait::async_trait]
impl IdentityVerifier for RejectingVerifier {
    async fn verify(&self, _token: &str) -> Result<Identity, AuthError> {
        Err(AuthError::Rejected("identity service denied token".into()))
    }

    async fn is_reachable(&self) -> bool {
        true
    }
}

fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        identity: IdentitySettings {
            base_url: "http://localhost:5000".into(),
            verify_path: "/api/auth/me".into(),
            timeout_secs: 5,
            jwt_secret: "0123456789abcdef0123456789abcdef".into(),
        },
        internal: InternalSettings {
            service_token: SERVICE_TOKEN.into(),
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        websocket: WebSocketSettings {
            max_message_size: 65536,
            max_frame_size: 16384,
        },
        report: ReportSettings {
            tick_ms: 1,
            progress_step: 25,
        },
        environment: "test".into(),
    }
}

fn test_app() -> (Router, AppState) {
    let state = AppState {
        gateway: Arc::new(Gateway::new()),
        verifier: Arc::new(RejectingVerifier),
        settings: Arc::new(test_settings()),
    };
    (create_router(state.clone()), state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn ws_upgrade(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn readiness_reports_gateway_and_identity_checks() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["gateway"]["active_connections"], 0);
    assert_eq!(json["checks"]["identity_service"]["status"], "healthy");
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn internal_routes_require_service_token() {
    let (app, _) = test_app();
    let response = app.clone().oneshot(get("/internal/online")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/internal/online")
                .header("Authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn push_to_offline_user_reports_not_delivered() {
    let (app, _) = test_app();
    let response = app
        .oneshot(post_json(
            "/internal/events/user/u1",
            Some(SERVICE_TOKEN),
            r#"{"event":"cart:updated","data":{"items":2}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["delivered"], false);
}

#[tokio::test]
async fn push_delivers_to_connected_user() {
    let (app, state) = test_app();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = Arc::new(ConnectionHandle::new(
        Identity {
            id: "u1".into(),
            email: "u1@shop.test".into(),
            first_name: None,
            last_name: None,
            role: Role::Customer,
        },
        TrustLevel::Full,
        tx,
    ));
    state.gateway.register(handle);

    let response = app
        .oneshot(post_json(
            "/internal/events/user/u1",
            Some(SERVICE_TOKEN),
            r#"{"event":"cart:updated","data":{"items":2}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["delivered"], true);
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn push_with_unsupported_event_is_bad_request() {
    let (app, _) = test_app();
    let response = app
        .oneshot(post_json(
            "/internal/events/user/u1",
            Some(SERVICE_TOKEN),
            r#"{"event":"product:create","data":{}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn online_lists_the_active_registry() {
    let (app, state) = test_app();

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = Arc::new(ConnectionHandle::new(
        Identity {
            id: "a1".into(),
            email: "a1@shop.test".into(),
            first_name: None,
            last_name: None,
            role: Role::Admin,
        },
        TrustLevel::Full,
        tx,
    ));
    state.gateway.register(handle);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/internal/online")
                .header("Authorization", format!("Bearer {}", SERVICE_TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["user"]["id"], "a1");
}

#[tokio::test]
async fn ws_handshake_without_token_is_refused() {
    let (app, state) = test_app();
    let response = app.oneshot(ws_upgrade("/ws")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(state.gateway.connection_count(), 0);
}

#[tokio::test]
async fn ws_handshake_with_rejected_token_never_registers() {
    let (app, state) = test_app();
    let response = app
        .oneshot(ws_upgrade("/ws/admin?token=bad-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    // A refused connection never reaches the registry or any room
    assert_eq!(state.gateway.connection_count(), 0);
    assert!(state.gateway.registry.is_empty());
    assert_eq!(state.gateway.room_size("admin:dashboard"), 0);
}
