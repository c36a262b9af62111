//! Active Connection Registry
//!
//! Process-wide map of who is currently online, keyed by user id. Mutated
//! on connect/disconnect and read by the internal presence endpoint and the
//! readiness probe.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::auth::Identity;
use crate::gateway::connection::ConnId;

/// Snapshot of one online user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineEntry {
    pub conn_id: ConnId,
    pub user: Identity,
    pub connected_at: DateTime<Utc>,
}

/// user id -> online entry
#[derive(Default)]
pub struct ActiveConnectionRegistry {
    entries: DashMap<String, OnlineEntry>,
}

impl ActiveConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identity: Identity, conn_id: ConnId, connected_at: DateTime<Utc>) {
        self.entries.insert(
            identity.id.clone(),
            OnlineEntry {
                conn_id,
                user: identity,
                connected_at,
            },
        );
    }

    /// Remove a user's entry, but only if it still belongs to the given
    /// connection. A user who reconnected keeps the newer entry.
    pub fn remove_conn(&self, user_id: &str, conn_id: ConnId) {
        self.entries
            .remove_if(user_id, |_, entry| entry.conn_id == conn_id);
    }

    pub fn get(&self, user_id: &str) -> Option<OnlineEntry> {
        self.entries.get(user_id).map(|e| e.value().clone())
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<OnlineEntry> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }
}
