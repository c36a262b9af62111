//! WebSocket Connection Handler
//!
//! Authenticates the handshake before the upgrade completes, then runs one
//! reader loop and one writer task per connection. A connection that fails
//! authentication is refused with an HTTP error and never reaches room
//! logic or the active-connection registry.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::auth::{authenticate_admin, authenticate_customer, AuthError, Identity, TrustLevel};
use crate::gateway::connection::ConnectionHandle;
use crate::gateway::events::{ClientEvent, ReadyPayload, ServerEvent};
use crate::gateway::relay;
use crate::metrics;
use crate::shared::AppError;
use crate::startup::AppState;

/// Token may arrive in the Authorization header or as a query parameter
/// (browser WebSocket clients cannot set headers).
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

fn bearer_token(headers: &HeaderMap, query: &WsQuery) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| query.token.clone())
}

fn record_auth_failure(err: &AuthError) {
    let reason = match err {
        AuthError::MissingToken => "missing_token",
        AuthError::Rejected(_) => "rejected",
        AuthError::InvalidToken(_) => "invalid_token",
        AuthError::Upstream(_) => "upstream",
    };
    metrics::AUTH_FAILURES_TOTAL
        .with_label_values(&[reason])
        .inc();
}

/// Admin gateway endpoint. Requires an admin identity; degrades to local
/// token verification only when the identity service is unreachable.
pub async fn admin_ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers, &query).ok_or(AuthError::MissingToken).map_err(|e| {
        record_auth_failure(&e);
        e
    })?;

    let (identity, trust) = authenticate_admin(
        state.verifier.as_ref(),
        &state.settings.identity.jwt_secret,
        &token,
    )
    .await
    .map_err(|e| {
        record_auth_failure(&e);
        tracing::info!(error = %e, "Admin handshake refused");
        e
    })?;

    Ok(configure(ws, &state)
        .on_upgrade(move |socket| run_connection(socket, state, identity, trust)))
}

/// Customer gateway endpoint. Any verified identity; no fallback path.
pub async fn customer_ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers, &query).ok_or(AuthError::MissingToken).map_err(|e| {
        record_auth_failure(&e);
        e
    })?;

    let (identity, trust) = authenticate_customer(state.verifier.as_ref(), &token)
        .await
        .map_err(|e| {
            record_auth_failure(&e);
            tracing::info!(error = %e, "Customer handshake refused");
            e
        })?;

    Ok(configure(ws, &state)
        .on_upgrade(move |socket| run_connection(socket, state, identity, trust)))
}

fn configure(ws: WebSocketUpgrade, state: &AppState) -> WebSocketUpgrade {
    ws.max_message_size(state.settings.websocket.max_message_size)
        .max_frame_size(state.settings.websocket.max_frame_size)
}

/// Run one authenticated connection until the transport closes.
async fn run_connection(
    socket: WebSocket,
    state: AppState,
    identity: Identity,
    trust: TrustLevel,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let handle = Arc::new(ConnectionHandle::new(identity, trust, tx));
    let conn_id = handle.id;

    // Writer task: serialize queued events onto the socket
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize outbound event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    state.gateway.register(handle.clone());
    handle.send(ServerEvent::ConnectionReady(ReadyPayload {
        conn_id,
        user: handle.identity.clone(),
        rooms: handle.rooms(),
    }));

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match ClientEvent::parse(&text) {
                Ok(event) => {
                    relay::dispatch(&state.gateway, &handle, event, &state.settings.report)
                }
                Err(e) => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "Rejected inbound frame");
                    metrics::EVENTS_REJECTED_TOTAL
                        .with_label_values(&["_invalid"])
                        .inc();
                    handle.send(ServerEvent::GatewayError {
                        message: e.to_string(),
                    });
                }
            },
            Ok(Message::Close(_)) => {
                tracing::debug!(conn_id = %conn_id, "Connection closed by client");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Pong is handled automatically by axum
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(conn_id = %conn_id, "Ignoring binary frame");
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    state.gateway.unregister(conn_id);
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_from_authorization_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        let query = WsQuery {
            token: Some("query-token".into()),
        };
        assert_eq!(bearer_token(&headers, &query).as_deref(), Some("header-token"));
    }

    #[test]
    fn token_falls_back_to_query_param() {
        let headers = HeaderMap::new();
        let query = WsQuery {
            token: Some("query-token".into()),
        };
        assert_eq!(bearer_token(&headers, &query).as_deref(), Some("query-token"));
    }

    #[test]
    fn missing_token_yields_none() {
        let headers = HeaderMap::new();
        let query = WsQuery { token: None };
        assert_eq!(bearer_token(&headers, &query), None);
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        let query = WsQuery { token: None };
        assert_eq!(bearer_token(&headers, &query), None);
    }
}
