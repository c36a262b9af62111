//! Connection Handles
//!
//! One handle per authenticated WebSocket session, shared between the
//! reader task, the writer task, and the gateway's room maps.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::{Identity, TrustLevel};
use crate::gateway::events::ServerEvent;

/// Unique connection identifier, assigned at handshake.
pub type ConnId = Uuid;

/// State of one authenticated connection, owned by the gateway for the
/// lifetime of the session and destroyed on disconnect.
pub struct ConnectionHandle {
    pub id: ConnId,
    pub identity: Identity,
    pub trust: TrustLevel,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<ServerEvent>,
    rooms: Mutex<HashSet<String>>,
}

impl ConnectionHandle {
    pub fn new(
        identity: Identity,
        trust: TrustLevel,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            trust,
            connected_at: Utc::now(),
            sender,
            rooms: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.identity.is_admin()
    }

    /// Queue an event for delivery. Returns false if the writer side has
    /// already dropped; delivery is fire-and-forget so the caller may
    /// ignore the result.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Record a room membership on this handle. Returns false if already joined.
    pub(crate) fn track_room(&self, room: &str) -> bool {
        self.rooms.lock().insert(room.to_string())
    }

    pub(crate) fn untrack_room(&self, room: &str) {
        self.rooms.lock().remove(room);
    }

    /// Drain the membership set, used by the disconnect path.
    pub(crate) fn take_rooms(&self) -> HashSet<String> {
        std::mem::take(&mut *self.rooms.lock())
    }

    pub fn rooms(&self) -> Vec<String> {
        self.rooms.lock().iter().cloned().collect()
    }
}
