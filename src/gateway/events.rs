//! Gateway Event Types
//!
//! Wire format is one JSON object per text frame: `{"event": "<name>",
//! "data": {...}}`. Inbound frames are parsed into [`ClientEvent`] at the
//! boundary; a frame that does not match the schema for its event name is
//! rejected with an error event instead of being relayed verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::Identity;
use crate::gateway::connection::ConnId;

/// Raw inbound frame before event-specific validation.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Inbound frame rejection reasons.
#[derive(Debug, thiserror::Error)]
pub enum EventParseError {
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] serde_json::Error),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("malformed payload for {event}: {reason}")]
    MalformedPayload { event: String, reason: String },
}

// Inbound payload schemas

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    pub product: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDeletePayload {
    pub product_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdate {
    pub order_id: String,
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDelta {
    pub product_id: String,
    pub stock: i64,
    pub action: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatJoin {
    pub chat_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSend {
    pub chat_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemNotification {
    pub message: String,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusChange {
    pub user_id: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub report_id: String,
    #[serde(default)]
    pub report_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCancel {
    pub report_id: String,
}

/// Validated inbound event.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    ProductCreate(ProductPayload),
    ProductUpdate(ProductPayload),
    ProductDelete(ProductDeletePayload),
    OrderUpdateStatus(OrderStatusUpdate),
    InventoryUpdate(InventoryDelta),
    SupportJoinChat(ChatJoin),
    SupportSendMessage(ChatSend),
    SystemBroadcastNotification(SystemNotification),
    AnalyticsSubscribe,
    AnalyticsUnsubscribe,
    UserStatusChange(UserStatusChange),
    ReportGenerate(ReportRequest),
    ReportCancel(ReportCancel),
}

impl ClientEvent {
    /// Parse and validate one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, EventParseError> {
        let frame: InboundFrame = serde_json::from_str(text)?;
        Self::from_frame(frame)
    }

    /// Validate a pre-parsed frame against its event schema.
    pub fn from_frame(frame: InboundFrame) -> Result<Self, EventParseError> {
        fn payload<T: serde::de::DeserializeOwned>(
            event: &str,
            data: Value,
        ) -> Result<T, EventParseError> {
            serde_json::from_value(data).map_err(|e| EventParseError::MalformedPayload {
                event: event.to_string(),
                reason: e.to_string(),
            })
        }

        let event = frame.event;
        let data = frame.data;
        match event.as_str() {
            "product:create" => Ok(Self::ProductCreate(payload(&event, data)?)),
            "product:update" => Ok(Self::ProductUpdate(payload(&event, data)?)),
            "product:delete" => Ok(Self::ProductDelete(payload(&event, data)?)),
            "order:update_status" => Ok(Self::OrderUpdateStatus(payload(&event, data)?)),
            "inventory:update" => Ok(Self::InventoryUpdate(payload(&event, data)?)),
            "support:join_chat" => Ok(Self::SupportJoinChat(payload(&event, data)?)),
            "support:send_message" => Ok(Self::SupportSendMessage(payload(&event, data)?)),
            "system:broadcast_notification" => {
                Ok(Self::SystemBroadcastNotification(payload(&event, data)?))
            }
            "analytics:subscribe" => Ok(Self::AnalyticsSubscribe),
            "analytics:unsubscribe" => Ok(Self::AnalyticsUnsubscribe),
            "user:status_change" => Ok(Self::UserStatusChange(payload(&event, data)?)),
            "report:generate" => Ok(Self::ReportGenerate(payload(&event, data)?)),
            "report:cancel" => Ok(Self::ReportCancel(payload(&event, data)?)),
            _ => Err(EventParseError::UnknownEvent(event)),
        }
    }

    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProductCreate(_) => "product:create",
            Self::ProductUpdate(_) => "product:update",
            Self::ProductDelete(_) => "product:delete",
            Self::OrderUpdateStatus(_) => "order:update_status",
            Self::InventoryUpdate(_) => "inventory:update",
            Self::SupportJoinChat(_) => "support:join_chat",
            Self::SupportSendMessage(_) => "support:send_message",
            Self::SystemBroadcastNotification(_) => "system:broadcast_notification",
            Self::AnalyticsSubscribe => "analytics:subscribe",
            Self::AnalyticsUnsubscribe => "analytics:unsubscribe",
            Self::UserStatusChange(_) => "user:status_change",
            Self::ReportGenerate(_) => "report:generate",
            Self::ReportCancel(_) => "report:cancel",
        }
    }

    /// Whether emitting this event requires a full-trust admin connection.
    ///
    /// Support chat events are the only ones open to customers; everything
    /// else mutates platform-wide state and is admin-only.
    pub fn requires_admin(&self) -> bool {
        !matches!(self, Self::SupportJoinChat(_) | Self::SupportSendMessage(_))
    }
}

// Outbound payload types

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyPayload {
    pub conn_id: ConnId,
    pub user: Identity,
    pub rooms: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductBroadcast {
    pub product: Value,
    pub updated_by: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDeleteBroadcast {
    pub product_id: String,
    pub updated_by: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusBroadcast {
    pub order_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub updated_by: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryBroadcast {
    pub product_id: String,
    pub stock: i64,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemBroadcast {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub sent_by: String,
    pub timestamp: DateTime<Utc>,
}

/// Validated outbound event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connection:ready")]
    ConnectionReady(ReadyPayload),

    #[serde(rename = "gateway:error")]
    GatewayError { message: String },

    #[serde(rename = "product:created")]
    ProductCreated(ProductBroadcast),
    #[serde(rename = "product:updated")]
    ProductUpdated(ProductBroadcast),
    #[serde(rename = "product:deleted")]
    ProductDeleted(ProductDeleteBroadcast),

    #[serde(rename = "order:status_updated")]
    OrderStatusUpdated(OrderStatusBroadcast),
    #[serde(rename = "order:status_changed")]
    OrderStatusChanged(OrderStatusBroadcast),

    #[serde(rename = "inventory:updated")]
    InventoryUpdated(InventoryBroadcast),

    #[serde(rename = "chat:admin_joined")]
    #[serde(rename_all = "camelCase")]
    ChatAdminJoined {
        chat_id: String,
        admin_name: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "chat:new_message")]
    ChatNewMessage(ChatMessage),
    #[serde(rename = "support:message_sent")]
    #[serde(rename_all = "camelCase")]
    SupportMessageSent {
        chat_id: String,
        sender_id: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "notification:system")]
    NotificationSystem(SystemBroadcast),
    #[serde(rename = "system:notification_sent")]
    #[serde(rename_all = "camelCase")]
    SystemNotificationSent {
        message: String,
        sent_by: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "analytics:initial")]
    #[serde(rename_all = "camelCase")]
    AnalyticsInitial {
        active_connections: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "account:status_changed")]
    #[serde(rename_all = "camelCase")]
    AccountStatusChanged {
        user_id: String,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    #[serde(rename = "user:action_taken")]
    #[serde(rename_all = "camelCase")]
    UserActionTaken {
        user_id: String,
        action: String,
        taken_by: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "report:generation_started")]
    #[serde(rename_all = "camelCase")]
    ReportGenerationStarted { report_id: String },
    #[serde(rename = "report:generation_progress")]
    #[serde(rename_all = "camelCase")]
    ReportGenerationProgress { report_id: String, progress: u8 },
    #[serde(rename = "report:generation_complete")]
    #[serde(rename_all = "camelCase")]
    ReportGenerationComplete {
        report_id: String,
        completed_at: DateTime<Utc>,
    },
    #[serde(rename = "report:generation_cancelled")]
    #[serde(rename_all = "camelCase")]
    ReportGenerationCancelled { report_id: String },

    // Server-originated pushes, delivered to one user via the internal API
    #[serde(rename = "cart:updated")]
    CartUpdated(Value),
    #[serde(rename = "order:updated")]
    OrderUpdated(Value),
    #[serde(rename = "wishlist:updated")]
    WishlistUpdated(Value),

    #[serde(rename = "admin:connected")]
    #[serde(rename_all = "camelCase")]
    AdminConnected {
        email: String,
        name: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "admin:disconnected")]
    #[serde(rename_all = "camelCase")]
    AdminDisconnected {
        email: String,
        name: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "force_disconnect")]
    ForceDisconnect { reason: String },
}

impl ServerEvent {
    /// Event name as it appears on the wire, used for metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionReady(_) => "connection:ready",
            Self::GatewayError { .. } => "gateway:error",
            Self::ProductCreated(_) => "product:created",
            Self::ProductUpdated(_) => "product:updated",
            Self::ProductDeleted(_) => "product:deleted",
            Self::OrderStatusUpdated(_) => "order:status_updated",
            Self::OrderStatusChanged(_) => "order:status_changed",
            Self::InventoryUpdated(_) => "inventory:updated",
            Self::ChatAdminJoined { .. } => "chat:admin_joined",
            Self::ChatNewMessage(_) => "chat:new_message",
            Self::SupportMessageSent { .. } => "support:message_sent",
            Self::NotificationSystem(_) => "notification:system",
            Self::SystemNotificationSent { .. } => "system:notification_sent",
            Self::AnalyticsInitial { .. } => "analytics:initial",
            Self::AccountStatusChanged { .. } => "account:status_changed",
            Self::UserActionTaken { .. } => "user:action_taken",
            Self::ReportGenerationStarted { .. } => "report:generation_started",
            Self::ReportGenerationProgress { .. } => "report:generation_progress",
            Self::ReportGenerationComplete { .. } => "report:generation_complete",
            Self::ReportGenerationCancelled { .. } => "report:generation_cancelled",
            Self::CartUpdated(_) => "cart:updated",
            Self::OrderUpdated(_) => "order:updated",
            Self::WishlistUpdated(_) => "wishlist:updated",
            Self::AdminConnected { .. } => "admin:connected",
            Self::AdminDisconnected { .. } => "admin:disconnected",
            Self::ForceDisconnect { .. } => "force_disconnect",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn parses_order_update_status() {
        let event = ClientEvent::parse(
            r#"{"event":"order:update_status","data":{"orderId":"42","status":"shipped"}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::OrderUpdateStatus(update) => {
                assert_eq!(update.order_id, "42");
                assert_eq!(update.status, "shipped");
                assert_eq!(update.note, None);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn parses_analytics_subscribe_without_data() {
        let event = ClientEvent::parse(r#"{"event":"analytics:subscribe"}"#).unwrap();
        assert!(matches!(event, ClientEvent::AnalyticsSubscribe));
    }

    #[test]
    fn rejects_unknown_event() {
        let err = ClientEvent::parse(r#"{"event":"order:delete_all","data":{}}"#).unwrap_err();
        assert!(matches!(err, EventParseError::UnknownEvent(name) if name == "order:delete_all"));
    }

    #[test]
    fn rejects_malformed_payload() {
        // status missing
        let err =
            ClientEvent::parse(r#"{"event":"order:update_status","data":{"orderId":"42"}}"#)
                .unwrap_err();
        assert!(matches!(err, EventParseError::MalformedPayload { .. }));
    }

    #[test]
    fn rejects_non_json_frame() {
        let err = ClientEvent::parse("not json").unwrap_err();
        assert!(matches!(err, EventParseError::InvalidFrame(_)));
    }

    #[test_case(r#"{"event":"product:create","data":{"product":{"id":"p1"}}}"# => true; "product create")]
    #[test_case(r#"{"event":"system:broadcast_notification","data":{"message":"hi"}}"# => true; "system broadcast")]
    #[test_case(r#"{"event":"report:generate","data":{"reportId":"r1"}}"# => true; "report generate")]
    #[test_case(r#"{"event":"analytics:subscribe"}"# => true; "analytics subscribe")]
    #[test_case(r#"{"event":"support:send_message","data":{"chatId":"c1","message":"hi"}}"# => false; "support message")]
    #[test_case(r#"{"event":"support:join_chat","data":{"chatId":"c1"}}"# => false; "support join")]
    fn admin_requirement_by_event(frame: &str) -> bool {
        ClientEvent::parse(frame).unwrap().requires_admin()
    }

    #[test]
    fn server_event_serializes_with_event_and_data_keys() {
        let event = ServerEvent::OrderStatusUpdated(OrderStatusBroadcast {
            order_id: "42".into(),
            status: "shipped".into(),
            note: None,
            updated_by: "admin@shop.test".into(),
            timestamp: Utc::now(),
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "order:status_updated");
        assert_eq!(value["data"]["orderId"], "42");
        assert_eq!(value["data"]["status"], "shipped");
        assert!(value["data"].get("note").is_none());
    }

    #[test]
    fn wire_name_matches_serialized_tag() {
        let event = ServerEvent::ForceDisconnect {
            reason: "account disabled".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.name());
    }
}
