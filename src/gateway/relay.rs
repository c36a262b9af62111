//! Event Relay Handlers
//!
//! One small mapping per inbound event: validate who may emit it, re-shape
//! the payload, and fan it out to its target rooms. No state beyond room
//! membership is touched; relays never persist anything.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::TrustLevel;
use crate::config::ReportSettings;
use crate::gateway::connection::ConnectionHandle;
use crate::gateway::events::{
    ChatMessage, ClientEvent, OrderStatusBroadcast, ProductBroadcast, ProductDeleteBroadcast,
    InventoryBroadcast, ServerEvent, SystemBroadcast,
};
use crate::gateway::hub::{chat_room, order_room, user_room, Gateway, ADMIN_DASHBOARD, ANALYTICS_LIVE};
use crate::gateway::reports;
use crate::metrics;

/// Relay one validated inbound event to its targets.
pub fn dispatch(
    gateway: &Arc<Gateway>,
    conn: &Arc<ConnectionHandle>,
    event: ClientEvent,
    report_settings: &ReportSettings,
) {
    metrics::EVENTS_RECEIVED_TOTAL
        .with_label_values(&[event.name()])
        .inc();

    if let Some(reason) = emit_denied(conn, &event) {
        tracing::warn!(
            conn_id = %conn.id,
            user_id = %conn.identity.id,
            event = event.name(),
            reason = %reason,
            "Event emit denied"
        );
        metrics::EVENTS_REJECTED_TOTAL
            .with_label_values(&[event.name()])
            .inc();
        conn.send(ServerEvent::GatewayError { message: reason });
        return;
    }

    let actor = conn.identity.email.clone();
    let now = Utc::now();

    match event {
        ClientEvent::ProductCreate(p) => {
            gateway.broadcast_all(ServerEvent::ProductCreated(ProductBroadcast {
                product: p.product,
                updated_by: actor,
                timestamp: now,
            }));
        }

        ClientEvent::ProductUpdate(p) => {
            gateway.broadcast_all(ServerEvent::ProductUpdated(ProductBroadcast {
                product: p.product,
                updated_by: actor,
                timestamp: now,
            }));
        }

        ClientEvent::ProductDelete(p) => {
            gateway.broadcast_all(ServerEvent::ProductDeleted(ProductDeleteBroadcast {
                product_id: p.product_id,
                updated_by: actor,
                timestamp: now,
            }));
        }

        ClientEvent::OrderUpdateStatus(update) => {
            let payload = OrderStatusBroadcast {
                order_id: update.order_id.clone(),
                status: update.status,
                note: update.note,
                updated_by: actor,
                timestamp: now,
            };
            gateway.broadcast(
                &order_room(&update.order_id),
                ServerEvent::OrderStatusUpdated(payload.clone()),
            );
            gateway.broadcast(ADMIN_DASHBOARD, ServerEvent::OrderStatusChanged(payload));
        }

        ClientEvent::InventoryUpdate(delta) => {
            gateway.broadcast(
                ADMIN_DASHBOARD,
                ServerEvent::InventoryUpdated(InventoryBroadcast {
                    product_id: delta.product_id,
                    stock: delta.stock,
                    action: delta.action,
                    updated_by: Some(actor),
                    timestamp: Some(now),
                }),
            );
        }

        ClientEvent::SupportJoinChat(join) => {
            let room = chat_room(&join.chat_id);
            gateway.join(conn, &room);
            if conn.is_admin() {
                gateway.broadcast_except(
                    &room,
                    conn.id,
                    ServerEvent::ChatAdminJoined {
                        chat_id: join.chat_id,
                        admin_name: conn.identity.display_name(),
                        timestamp: now,
                    },
                );
            }
        }

        ClientEvent::SupportSendMessage(send) => {
            let message = ChatMessage {
                id: Uuid::new_v4(),
                chat_id: send.chat_id.clone(),
                sender_id: conn.identity.id.clone(),
                sender_name: conn.identity.display_name(),
                message: send.message,
                timestamp: now,
            };
            gateway.broadcast(
                &chat_room(&send.chat_id),
                ServerEvent::ChatNewMessage(message),
            );
            gateway.broadcast_except(
                ADMIN_DASHBOARD,
                conn.id,
                ServerEvent::SupportMessageSent {
                    chat_id: send.chat_id,
                    sender_id: conn.identity.id.clone(),
                    timestamp: now,
                },
            );
        }

        ClientEvent::SystemBroadcastNotification(notification) => {
            gateway.broadcast_all(ServerEvent::NotificationSystem(SystemBroadcast {
                message: notification.message.clone(),
                level: notification.level,
                sent_by: actor.clone(),
                timestamp: now,
            }));
            gateway.broadcast_except(
                ADMIN_DASHBOARD,
                conn.id,
                ServerEvent::SystemNotificationSent {
                    message: notification.message,
                    sent_by: actor,
                    timestamp: now,
                },
            );
        }

        ClientEvent::AnalyticsSubscribe => {
            gateway.join(conn, ANALYTICS_LIVE);
            gateway.emit_to_conn(
                conn.id,
                ServerEvent::AnalyticsInitial {
                    active_connections: gateway.connection_count(),
                    timestamp: now,
                },
            );
        }

        ClientEvent::AnalyticsUnsubscribe => {
            gateway.leave(conn, ANALYTICS_LIVE);
        }

        ClientEvent::UserStatusChange(change) => {
            gateway.broadcast(
                &user_room(&change.user_id),
                ServerEvent::AccountStatusChanged {
                    user_id: change.user_id.clone(),
                    status: change.status.clone(),
                    reason: change.reason,
                },
            );
            gateway.broadcast_except(
                ADMIN_DASHBOARD,
                conn.id,
                ServerEvent::UserActionTaken {
                    user_id: change.user_id,
                    action: change.status,
                    taken_by: actor,
                    timestamp: now,
                },
            );
        }

        ClientEvent::ReportGenerate(request) => {
            reports::spawn_report(
                Arc::clone(gateway),
                conn.id,
                request,
                report_settings.clone(),
            );
        }

        ClientEvent::ReportCancel(cancel) => {
            if gateway.reports.cancel(conn.id, &cancel.report_id) {
                conn.send(ServerEvent::ReportGenerationCancelled {
                    report_id: cancel.report_id,
                });
            }
        }
    }
}

/// Per-event authorization: room membership scopes delivery only, emitting
/// a privileged event additionally requires a full-trust admin identity.
fn emit_denied(conn: &ConnectionHandle, event: &ClientEvent) -> Option<String> {
    if !event.requires_admin() {
        return None;
    }
    if !conn.is_admin() {
        return Some(format!("{} requires the admin role", event.name()));
    }
    if conn.trust == TrustLevel::Degraded {
        return Some(format!(
            "{} is not available while identity verification is degraded",
            event.name()
        ));
    }
    None
}
