//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` stands in for the WebSocket and REST I/O of the production
//! driver. It implements [`Driver`] so the same [`chatsync_app::Runtime`]
//! orchestration code runs in both production and simulation.
//!
//! Connections never touch a network. The driver records what the runtime
//! asked for (connects, frames, closes, REST calls) and tests inject what the
//! "server" does in response.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use chatsync_app::{Coordinator, CoordinatorEvent, Driver};
use chatsync_core::{Environment, Generation, TransportEvent};
use chatsync_proto::{CreateRoomRequest, HistoryPage, Room, RoomId, close};

use crate::sim_env::{SimEnv, SimInstant};

/// Error type for simulation driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// How a connect request is answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Report `Opened` immediately.
    #[default]
    Accept,
    /// Report `Faulted` immediately.
    Refuse,
    /// Report nothing. The test injects the outcome.
    Hold,
}

/// Connect request recorded by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRecord {
    /// Generation the runtime assigned.
    pub generation: Generation,
    /// Room connected to.
    pub room_id: RoomId,
    /// Credential presented.
    pub token: String,
}

/// Shared state for event injection.
#[derive(Default)]
struct SharedState {
    pending_events: VecDeque<CoordinatorEvent>,
    connect_behavior: ConnectBehavior,
    live: Vec<Generation>,
    connects: Vec<ConnectRecord>,
    transmitted: Vec<(Generation, String)>,
    disconnects: Vec<(Generation, u16)>,
    rooms: Vec<Room>,
    histories: HashMap<RoomId, HistoryPage>,
    history_requests: Vec<RoomId>,
    histories_served: HashMap<RoomId, usize>,
    fail_rest: bool,
    next_room_id: RoomId,
    renders: usize,
    stopped: bool,
}

/// Simulation driver for deterministic testing.
///
/// Clones share state, so a test can keep a clone to inject events while the
/// runtime owns the driver.
#[derive(Clone)]
pub struct SimDriver {
    state: Arc<Mutex<SharedState>>,
    env: SimEnv,
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDriver {
    /// Create a new simulation driver with its own clock.
    pub fn new() -> Self {
        Self::with_env(SimEnv::new())
    }

    /// Create a simulation driver on an existing clock.
    pub fn with_env(env: SimEnv) -> Self {
        let state = SharedState { next_room_id: 1000, ..SharedState::default() };
        Self { state: Arc::new(Mutex::new(state)), env }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Virtual clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Choose how subsequent connect requests are answered.
    pub fn set_connect_behavior(&self, behavior: ConnectBehavior) {
        self.lock().connect_behavior = behavior;
    }

    /// Make every REST call fail.
    pub fn set_rest_failing(&self, failing: bool) {
        self.lock().fail_rest = failing;
    }

    /// Serve `rooms` from the room directory.
    pub fn set_rooms(&self, rooms: Vec<Room>) {
        self.lock().rooms = rooms;
    }

    /// Serve `page` as the history of `room_id`.
    ///
    /// `page.messages` is the whole room history oldest first. Requests are
    /// answered from the newest end, newest first, the way the server pages.
    pub fn set_history(&self, room_id: RoomId, page: HistoryPage) {
        self.lock().histories.insert(room_id, page);
    }

    /// Queue an event for the runtime.
    pub fn inject_event(&self, event: CoordinatorEvent) {
        self.lock().pending_events.push_back(event);
    }

    /// Queue a transport event for connection `generation`.
    ///
    /// `Closed` and `Faulted` end the connection.
    pub fn inject_transport(&self, generation: Generation, event: TransportEvent) {
        let mut state = self.lock();
        if matches!(event, TransportEvent::Closed { .. } | TransportEvent::Faulted(_)) {
            state.live.retain(|g| *g != generation);
        }
        state.pending_events.push_back(CoordinatorEvent::Transport { generation, event });
    }

    /// Queue an inbound text frame on the newest connection.
    pub fn inject_frame(&self, payload: impl Into<String>) {
        if let Some(generation) = self.latest_generation() {
            self.inject_transport(generation, TransportEvent::Message(payload.into()));
        }
    }

    /// Drop the newest connection abnormally.
    pub fn drop_connection(&self) {
        if let Some(generation) = self.latest_generation() {
            self.inject_transport(generation, TransportEvent::Closed {
                code: close::ABNORMAL,
                reason: "connection reset".into(),
            });
        }
    }

    /// Generation of the most recent connect request.
    pub fn latest_generation(&self) -> Option<Generation> {
        self.lock().connects.last().map(|c| c.generation)
    }

    /// Connections started and not yet closed.
    pub fn live_connections(&self) -> Vec<Generation> {
        self.lock().live.clone()
    }

    /// Every connect request so far.
    pub fn connects(&self) -> Vec<ConnectRecord> {
        self.lock().connects.clone()
    }

    /// Every frame written so far.
    pub fn transmitted(&self) -> Vec<(Generation, String)> {
        self.lock().transmitted.clone()
    }

    /// Every close requested so far, with its code.
    pub fn disconnects(&self) -> Vec<(Generation, u16)> {
        self.lock().disconnects.clone()
    }

    /// Rooms whose history was requested, in order.
    pub fn history_requests(&self) -> Vec<RoomId> {
        self.lock().history_requests.clone()
    }

    /// How many history responses were delivered for each room.
    pub fn histories_served(&self) -> HashMap<RoomId, usize> {
        self.lock().histories_served.clone()
    }

    /// Number of renders.
    pub fn renders(&self) -> usize {
        self.lock().renders
    }

    /// Returns true once the runtime has stopped the driver.
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Check if there are pending events to process.
    pub fn has_pending(&self) -> bool {
        !self.lock().pending_events.is_empty()
    }

    fn rest<T>(&self, value: impl FnOnce(&mut SharedState) -> T) -> Result<T, SimDriverError> {
        let mut state = self.lock();
        if state.fail_rest {
            return Err(SimDriverError("service unavailable".into()));
        }
        Ok(value(&mut state))
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = SimInstant;

    /// Pops the next queued event. With nothing queued, jumps the clock to
    /// `deadline` and returns `None`.
    async fn poll_event(
        &mut self,
        deadline: Option<SimInstant>,
    ) -> Result<Option<CoordinatorEvent>, Self::Error> {
        let event = self.lock().pending_events.pop_front();
        if event.is_none()
            && let Some(deadline) = deadline
        {
            self.env.advance_to(deadline);
        }
        Ok(event)
    }

    fn connect(&mut self, generation: Generation, room_id: RoomId, token: &str) {
        let mut state = self.lock();
        state.live.push(generation);
        state.connects.push(ConnectRecord { generation, room_id, token: token.to_string() });

        let outcome = match state.connect_behavior {
            ConnectBehavior::Accept => Some(TransportEvent::Opened),
            ConnectBehavior::Refuse => {
                state.live.retain(|g| *g != generation);
                Some(TransportEvent::Faulted("connection refused".into()))
            },
            ConnectBehavior::Hold => None,
        };

        if let Some(event) = outcome {
            state.pending_events.push_back(CoordinatorEvent::Transport { generation, event });
        }
    }

    async fn transmit(&mut self, generation: Generation, payload: String) -> Result<(), Self::Error> {
        let mut state = self.lock();
        if !state.live.contains(&generation) {
            return Err(SimDriverError(format!("no connection for {generation}")));
        }
        state.transmitted.push((generation, payload));
        Ok(())
    }

    fn disconnect(&mut self, generation: Generation, code: u16, reason: &str) {
        let mut state = self.lock();
        let was_live = state.live.contains(&generation);
        state.live.retain(|g| *g != generation);
        state.disconnects.push((generation, code));

        // A handshake close is acknowledged by the peer; an abort reports nothing.
        if was_live && code != close::ABNORMAL {
            state.pending_events.push_back(CoordinatorEvent::Transport {
                generation,
                event: TransportEvent::Closed { code, reason: reason.to_string() },
            });
        }
    }

    async fn fetch_history(
        &mut self,
        room_id: RoomId,
        limit: u32,
        offset: u32,
    ) -> Result<HistoryPage, Self::Error> {
        self.lock().history_requests.push(room_id);
        self.rest(|state| {
            *state.histories_served.entry(room_id).or_default() += 1;
            let mut page = state.histories.get(&room_id).cloned().unwrap_or_default();
            let end = page.messages.len().saturating_sub(offset as usize);
            let start = end.saturating_sub(limit as usize);
            page.has_more = start > 0;
            page.messages = page.messages[start..end].iter().rev().cloned().collect();
            page
        })
    }

    async fn fetch_rooms(&mut self) -> Result<Vec<Room>, Self::Error> {
        self.rest(|state| state.rooms.clone())
    }

    async fn create_room(&mut self, request: CreateRoomRequest) -> Result<Room, Self::Error> {
        self.rest(|state| {
            let id = state.next_room_id;
            state.next_room_id += 1;

            let mut room = Room::new(id, request.name);
            room.description = request.description;
            room.is_private = request.is_private;
            room.current_members = 1;
            room.max_members = request.max_members.unwrap_or(100);
            state.rooms.insert(0, room.clone());
            room
        })
    }

    async fn join_room(&mut self, room_id: RoomId) -> Result<(), Self::Error> {
        self.rest(|state| {
            if !state.rooms.iter().any(|r| r.id == room_id) {
                state.rooms.push(Room::new(room_id, format!("room {room_id}")));
            }
        })
    }

    async fn leave_room(&mut self, room_id: RoomId) -> Result<(), Self::Error> {
        self.rest(|state| state.rooms.retain(|r| r.id != room_id))
    }

    fn now(&self) -> SimInstant {
        self.env.now()
    }

    fn render(&mut self, _coordinator: &Coordinator<SimInstant>) -> Result<(), Self::Error> {
        self.lock().renders += 1;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.lock();
        state.live.clear();
        state.stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn accepted_connect_queues_opened() {
        let mut driver = SimDriver::new();
        let g = Generation::ZERO.next();
        driver.connect(g, 1, "t");

        assert_eq!(driver.live_connections(), vec![g]);
        let event = block_on(driver.poll_event(None)).unwrap();
        assert_eq!(event, Some(CoordinatorEvent::Transport { generation: g, event: TransportEvent::Opened }));
    }

    #[test]
    fn refused_connect_is_not_live() {
        let mut driver = SimDriver::new();
        driver.set_connect_behavior(ConnectBehavior::Refuse);
        driver.connect(Generation::ZERO.next(), 1, "t");

        assert!(driver.live_connections().is_empty());
        assert!(driver.has_pending());
    }

    #[test]
    fn handshake_close_is_acknowledged() {
        let mut driver = SimDriver::new();
        driver.set_connect_behavior(ConnectBehavior::Hold);
        let g = Generation::ZERO.next();
        driver.connect(g, 1, "t");
        driver.disconnect(g, close::NORMAL, "bye");

        let event = block_on(driver.poll_event(None)).unwrap();
        assert!(matches!(
            event,
            Some(CoordinatorEvent::Transport { event: TransportEvent::Closed { code: close::NORMAL, .. }, .. })
        ));
    }

    #[test]
    fn idle_poll_jumps_to_deadline() {
        let mut driver = SimDriver::new();
        let deadline = SimInstant::ZERO + std::time::Duration::from_secs(4);

        assert_eq!(block_on(driver.poll_event(Some(deadline))).unwrap(), None);
        assert_eq!(driver.now(), deadline);
    }

    #[test]
    fn history_pages_from_newest() {
        let mut driver = SimDriver::new();
        let messages = (1..=5).map(|id| crate::test_message(id, 1)).collect();
        driver.set_history(1, HistoryPage { messages, total: 5, has_more: false });

        let page = block_on(driver.fetch_history(1, 2, 0)).unwrap();
        let ids: Vec<_> = page.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![5, 4]);
        assert!(page.has_more);
    }
}
