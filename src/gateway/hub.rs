//! Gateway Hub
//!
//! Owns the connection map and the room membership multimap, and provides
//! the relay primitives: join/leave, room broadcast, global broadcast, and
//! targeted delivery. All delivery is fire-and-forget; a member whose
//! transport already dropped is skipped without retry.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;

use crate::auth::Identity;
use crate::gateway::connection::{ConnId, ConnectionHandle};
use crate::gateway::events::ServerEvent;
use crate::gateway::registry::ActiveConnectionRegistry;
use crate::gateway::reports::ReportTracker;
use crate::metrics;

/// Shared room every admin connection joins at connect time.
pub const ADMIN_DASHBOARD: &str = "admin:dashboard";
/// Shared room every admin connection joins at connect time.
pub const ADMIN_ANALYTICS: &str = "admin:analytics";
/// Room for live analytics subscribers.
pub const ANALYTICS_LIVE: &str = "analytics:live";

pub fn user_room(user_id: &str) -> String {
    format!("user:{}", user_id)
}

pub fn order_room(order_id: &str) -> String {
    format!("order:{}", order_id)
}

pub fn chat_room(chat_id: &str) -> String {
    format!("chat:{}", chat_id)
}

/// Gateway state shared by every connection task and the internal API.
pub struct Gateway {
    /// Active connections by connection id
    conns: DashMap<ConnId, Arc<ConnectionHandle>>,
    /// Room name -> member connection ids
    rooms: DashMap<String, HashSet<ConnId>>,
    /// Who is currently online, by user id
    pub registry: ActiveConnectionRegistry,
    /// In-flight report generation tasks
    pub reports: ReportTracker,
}

impl Gateway {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
            rooms: DashMap::new(),
            registry: ActiveConnectionRegistry::new(),
            reports: ReportTracker::new(),
        }
    }

    /// Register an authenticated connection and assign its default rooms:
    /// the personal `user:{id}` room, plus the shared admin rooms for admin
    /// connections. Other dashboard members are notified of an admin join.
    pub fn register(&self, handle: Arc<ConnectionHandle>) {
        let conn_id = handle.id;
        self.registry
            .insert(handle.identity.clone(), conn_id, handle.connected_at);
        self.conns.insert(conn_id, handle.clone());

        self.join(&handle, &user_room(&handle.identity.id));
        if handle.is_admin() {
            self.join(&handle, ADMIN_DASHBOARD);
            self.join(&handle, ADMIN_ANALYTICS);
            self.broadcast_except(
                ADMIN_DASHBOARD,
                conn_id,
                ServerEvent::AdminConnected {
                    email: handle.identity.email.clone(),
                    name: handle.identity.display_name(),
                    timestamp: Utc::now(),
                },
            );
        }

        metrics::CONNECTIONS_ACTIVE
            .with_label_values(&[role_label(&handle.identity)])
            .inc();

        tracing::info!(
            user_id = %handle.identity.id,
            conn_id = %conn_id,
            role = ?handle.identity.role,
            "Connection registered"
        );
    }

    /// Tear down a connection: abort its report tasks, drop it from the
    /// registry, leave all rooms, and notify the dashboard once if the
    /// departing connection was an admin member of it.
    pub fn unregister(&self, conn_id: ConnId) {
        let Some((_, handle)) = self.conns.remove(&conn_id) else {
            return;
        };

        self.reports.cancel_all(conn_id);
        self.registry.remove_conn(&handle.identity.id, conn_id);

        let rooms = handle.take_rooms();
        let notify_dashboard = handle.is_admin() && rooms.contains(ADMIN_DASHBOARD);
        for room in &rooms {
            self.remove_member(room, conn_id);
        }

        metrics::CONNECTIONS_ACTIVE
            .with_label_values(&[role_label(&handle.identity)])
            .dec();

        if notify_dashboard {
            self.broadcast(
                ADMIN_DASHBOARD,
                ServerEvent::AdminDisconnected {
                    email: handle.identity.email.clone(),
                    name: handle.identity.display_name(),
                    timestamp: Utc::now(),
                },
            );
        }

        tracing::info!(
            user_id = %handle.identity.id,
            conn_id = %conn_id,
            "Connection unregistered"
        );
    }

    /// Add a connection to a room. Idempotent; the room is created on first
    /// join. Any authenticated connection may join any room name it asks
    /// for, which scopes delivery only, never emit privileges.
    pub fn join(&self, handle: &ConnectionHandle, room: &str) {
        if room.trim() != room {
            // "order:123 " and "order:123" are distinct keys; almost always
            // a client-side bug, so make it visible
            tracing::warn!(conn_id = %handle.id, room = ?room, "Room name has surrounding whitespace");
        }

        if handle.track_room(room) {
            self.rooms
                .entry(room.to_string())
                .or_default()
                .insert(handle.id);
            tracing::debug!(conn_id = %handle.id, room = %room, "Joined room");
        }
    }

    /// Remove a connection from a room. Empty rooms are garbage-collected.
    pub fn leave(&self, handle: &ConnectionHandle, room: &str) {
        handle.untrack_room(room);
        self.remove_member(room, handle.id);
        tracing::debug!(conn_id = %handle.id, room = %room, "Left room");
    }

    fn remove_member(&self, room: &str, conn_id: ConnId) {
        let now_empty = match self.rooms.get_mut(room) {
            Some(mut members) => {
                members.remove(&conn_id);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
    }

    /// Deliver an event to every current member of a room. Membership is
    /// snapshotted at call time; late joiners do not receive it. An empty
    /// or unknown room is a silent no-op. Returns the delivered count.
    pub fn broadcast(&self, room: &str, event: ServerEvent) -> usize {
        self.broadcast_inner(room, None, event)
    }

    /// Like [`broadcast`](Self::broadcast) but skips the sender.
    pub fn broadcast_except(&self, room: &str, sender: ConnId, event: ServerEvent) -> usize {
        self.broadcast_inner(room, Some(sender), event)
    }

    fn broadcast_inner(&self, room: &str, except: Option<ConnId>, event: ServerEvent) -> usize {
        let targets: Vec<ConnId> = match self.rooms.get(room) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };
        self.deliver(&targets, except, event)
    }

    /// Deliver an event to every connection on the gateway.
    pub fn broadcast_all(&self, event: ServerEvent) -> usize {
        let targets: Vec<ConnId> = self.conns.iter().map(|c| *c.key()).collect();
        self.deliver(&targets, None, event)
    }

    fn deliver(&self, targets: &[ConnId], except: Option<ConnId>, event: ServerEvent) -> usize {
        let mut delivered = 0;
        for conn_id in targets {
            if Some(*conn_id) == except {
                continue;
            }
            if let Some(conn) = self.conns.get(conn_id) {
                if conn.send(event.clone()) {
                    delivered += 1;
                }
            }
        }

        metrics::EVENTS_DELIVERED_TOTAL
            .with_label_values(&[event.name()])
            .inc_by(delivered as u64);
        metrics::BROADCAST_FANOUT.observe(delivered as f64);
        delivered
    }

    /// Direct single-connection delivery.
    pub fn emit_to_conn(&self, conn_id: ConnId, event: ServerEvent) -> bool {
        let delivered = match self.conns.get(&conn_id) {
            Some(conn) => conn.send(event.clone()),
            None => false,
        };
        if delivered {
            metrics::EVENTS_DELIVERED_TOTAL
                .with_label_values(&[event.name()])
                .inc();
        }
        delivered
    }

    /// Deliver to whichever connection a user currently holds, if any.
    pub fn emit_to_user(&self, user_id: &str, event: ServerEvent) -> bool {
        match self.registry.get(user_id) {
            Some(entry) => self.emit_to_conn(entry.conn_id, event),
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    pub fn room_members(&self, room: &str) -> Vec<ConnId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

fn role_label(identity: &Identity) -> &'static str {
    if identity.is_admin() {
        "admin"
    } else {
        "customer"
    }
}
