//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the coordinator and the driver
//! at a point in time. Invariants operate on snapshots rather than live state
//! to ensure consistent, atomic checks.

use std::collections::HashMap;

use chatsync_app::Coordinator;
use chatsync_core::{Generation, Instant, SessionStatus};
use chatsync_proto::{MessageId, RoomId};

/// Snapshot of the whole client: coordinator state plus what the driver
/// knows about open connections and served history.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    /// Session status.
    pub status: SessionStatus,
    /// Room the session is bound to.
    pub session_room: Option<RoomId>,
    /// Room the store considers active.
    pub active_room: Option<RoomId>,
    /// Current session generation.
    pub generation: Generation,
    /// Reconnects scheduled since the last successful open.
    pub reconnect_attempt: u32,
    /// Configured reconnect limit.
    pub max_attempts: u32,
    /// A reconnect timer is pending.
    pub reconnect_pending: bool,
    /// Connections the driver holds open.
    pub live_connections: Vec<Generation>,
    /// Message ids per listed room, in history order.
    pub histories: HashMap<RoomId, Vec<MessageId>>,
    /// History responses served per room.
    pub history_loads: HashMap<RoomId, usize>,
}

impl SystemSnapshot {
    /// Idle client with nothing loaded.
    pub fn empty(max_attempts: u32) -> Self {
        Self {
            status: SessionStatus::Idle,
            session_room: None,
            active_room: None,
            generation: Generation::ZERO,
            reconnect_attempt: 0,
            max_attempts,
            reconnect_pending: false,
            live_connections: Vec::new(),
            histories: HashMap::new(),
            history_loads: HashMap::new(),
        }
    }

    /// Capture coordinator state alongside driver-side facts.
    pub fn capture<I: Instant>(
        coordinator: &Coordinator<I>,
        max_attempts: u32,
        live_connections: Vec<Generation>,
        history_loads: HashMap<RoomId, usize>,
    ) -> Self {
        let session = coordinator.session();
        let store = coordinator.store();

        let mut room_ids: Vec<RoomId> = store.rooms().iter().map(|r| r.id).collect();
        room_ids.extend(store.active());

        let histories = room_ids
            .into_iter()
            .filter(|id| store.has_history(*id))
            .map(|id| (id, store.history(id).iter().map(|m| m.id).collect()))
            .collect();

        Self {
            status: session.status(),
            session_room: session.room_id(),
            active_room: store.active(),
            generation: session.generation(),
            reconnect_attempt: session.state().reconnect_attempt,
            max_attempts,
            reconnect_pending: session.pending_reconnect().is_some(),
            live_connections,
            histories,
            history_loads,
        }
    }

    /// History loads served for `room_id`.
    pub fn loads(&self, room_id: RoomId) -> usize {
        self.history_loads.get(&room_id).copied().unwrap_or(0)
    }
}
