//! Room session coordinator.
//!
//! Top-level owner of the client state: the active room, the one transport
//! [`Session`] bound to it, and the [`Store`] that inbound frames are applied
//! to. Consumers read the merged view through the accessors here.
//!
//! Pure state machine: [`Coordinator::handle`] consumes
//! [`CoordinatorEvent`]s and returns [`CoordinatorAction`]s for the runtime.
//!
//! # Room selection
//!
//! ```text
//! NoRoom ──select──> Connecting ──opened──> Live
//!                       ^                    │
//!                       └──────select────────┤
//! NoRoom <──────────────leave────────────────┘
//! ```

use std::collections::HashSet;

use chatsync_core::{
    ConnectionFault, ConnectionState, Dispatcher, DomainEvent, Instant, Session, SessionAction,
    SessionConfig, SessionStatus,
};
use chatsync_proto::{
    CreateRoomRequest, DEFAULT_HISTORY_LIMIT, HistoryPage, Message, MessageId, MessageType,
    OutboundMessage, Room, RoomId,
};

use crate::{Command, ConnectionError, CoordinatorAction, CoordinatorEvent, Store};

/// Coordinator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Transport session reconnect policy.
    pub session: SessionConfig,
    /// Messages requested when a room's history is first loaded.
    pub history_page_size: u32,
    /// Drop inbound messages whose id is already in the room's history.
    pub dedupe_by_id: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            history_page_size: DEFAULT_HISTORY_LIMIT,
            dedupe_by_id: false,
        }
    }
}

/// Room session coordinator.
#[derive(Debug, Clone)]
pub struct Coordinator<I> {
    config: CoordinatorConfig,
    session: Session<I>,
    store: Store,
    dispatcher: Dispatcher,
    /// Bearer credential for transport connections.
    token: Option<String>,
    /// Rooms whose history was requested this session.
    history_requested: HashSet<RoomId>,
    /// Last notice for the user. `None` if nothing to show.
    notice: Option<String>,
}

impl<I: Instant> Coordinator<I> {
    /// Create a coordinator with no active room.
    pub fn new(config: CoordinatorConfig, token: Option<String>) -> Self {
        Self {
            config,
            session: Session::new(config.session),
            store: Store::new(config.dedupe_by_id),
            dispatcher: Dispatcher::new(),
            token,
            history_requested: HashSet::new(),
            notice: None,
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: CoordinatorEvent, now: I) -> Vec<CoordinatorAction> {
        match event {
            CoordinatorEvent::Command(command) => self.command(command),
            CoordinatorEvent::Tick => {
                let actions = self.session.tick(now);
                self.apply_session(actions)
            },
            CoordinatorEvent::Transport { generation, event } => {
                let actions = self.session.handle(generation, event, now);
                self.apply_session(actions)
            },
            CoordinatorEvent::HistoryLoaded { room_id, result } => {
                self.history_loaded(room_id, result)
            },
            CoordinatorEvent::RoomsLoaded(Ok(rooms)) => {
                self.store.replace_room_list(rooms);
                vec![CoordinatorAction::Render]
            },
            CoordinatorEvent::RoomsLoaded(Err(error)) => {
                self.fail("load rooms", &error)
            },
            CoordinatorEvent::RoomCreated(Ok(room)) => {
                self.store.insert_room(room.clone());
                self.notice = Some(format!("Created room {}", room.name));
                self.select_room(room)
            },
            CoordinatorEvent::RoomCreated(Err(error)) => self.fail("create room", &error),
            CoordinatorEvent::RoomJoined { room_id, result: Ok(()) } => {
                self.notice = Some(format!("Joined room {room_id}"));
                vec![CoordinatorAction::FetchRooms, CoordinatorAction::Render]
            },
            CoordinatorEvent::RoomJoined { result: Err(error), .. } => {
                self.fail("join room", &error)
            },
            CoordinatorEvent::RoomLeft { room_id, result: Ok(()) } => self.leave_room(room_id),
            CoordinatorEvent::RoomLeft { result: Err(error), .. } => {
                self.fail("leave room", &error)
            },
        }
    }

    fn command(&mut self, command: Command) -> Vec<CoordinatorAction> {
        match command {
            Command::Select(room_id) => {
                let room = self
                    .store
                    .room(room_id)
                    .cloned()
                    .unwrap_or_else(|| Room::new(room_id, String::new()));
                self.select_room(room)
            },
            Command::Create(request) => self.create_room(request),
            Command::Join(room_id) => {
                vec![CoordinatorAction::JoinRoom { room_id }, CoordinatorAction::Render]
            },
            Command::Leave(room_id) => {
                vec![CoordinatorAction::LeaveRoom { room_id }, CoordinatorAction::Render]
            },
            Command::RefreshRooms => self.refresh_rooms(),
            Command::Send { content, message_type, reply_to_id } => {
                match self.send_to_active_room(content, message_type, reply_to_id) {
                    Ok(actions) => actions,
                    Err(err) => {
                        self.notice = Some(format!("Message not sent: {err}"));
                        vec![CoordinatorAction::Render]
                    },
                }
            },
            Command::Quit => {
                let mut actions = self.shutdown();
                actions.push(CoordinatorAction::Quit);
                actions
            },
        }
    }

    /// Make `room` the active room.
    ///
    /// Supersedes any live transport and opens a new one for the room. Only a
    /// room with no cached history gets a history fetch, at most once per
    /// room. Re-selecting a room whose transport is already up is a no-op.
    /// The room list is left alone: an unlisted room becomes active without
    /// being added to it.
    pub fn select_room(&mut self, room: Room) -> Vec<CoordinatorAction> {
        let room_id = room.id;

        if self.store.active() == Some(room_id)
            && self.session.room_id() == Some(room_id)
            && matches!(self.session.status(), SessionStatus::Connecting | SessionStatus::Open)
        {
            return vec![CoordinatorAction::Render];
        }

        tracing::info!(room_id, name = %room.name, "selecting room");
        self.store.set_active(Some(room_id));

        let session_actions = self.session.open(Some(room_id), self.token.as_deref());
        let mut actions = self.apply_session(session_actions);

        if !self.store.has_history(room_id) && self.history_requested.insert(room_id) {
            actions.push(CoordinatorAction::FetchHistory {
                room_id,
                limit: self.config.history_page_size,
                offset: 0,
            });
        }

        actions.push(CoordinatorAction::Render);
        actions
    }

    /// Forget a room locally.
    ///
    /// Leaving the active room closes its transport with manual-close
    /// semantics, so no reconnect follows.
    pub fn leave_room(&mut self, room_id: RoomId) -> Vec<CoordinatorAction> {
        let mut actions = Vec::new();

        if self.store.active() == Some(room_id) {
            let session_actions = self.session.close("left room");
            actions = self.apply_session(session_actions);
        }

        self.store.remove_room(room_id);
        self.history_requested.remove(&room_id);
        self.notice = Some(format!("Left room {room_id}"));

        actions.push(CoordinatorAction::Render);
        actions
    }

    /// Ask the room directory to create a room.
    pub fn create_room(&mut self, request: CreateRoomRequest) -> Vec<CoordinatorAction> {
        self.notice = Some(format!("Creating room {}...", request.name));
        vec![CoordinatorAction::CreateRoom(request), CoordinatorAction::Render]
    }

    /// Reload the room list.
    pub fn refresh_rooms(&self) -> Vec<CoordinatorAction> {
        vec![CoordinatorAction::FetchRooms]
    }

    /// Send a message to the active room.
    ///
    /// On success exactly one `Transmit` is returned. Content is not
    /// validated here; callers check it with [`OutboundMessage::validate`]
    /// first.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NoActiveRoom` if no room is selected
    /// - `ConnectionError::NotConnected` if the transport is not open
    /// - `ConnectionError::Encode` if the frame cannot be encoded
    pub fn send_to_active_room(
        &mut self,
        content: String,
        message_type: MessageType,
        reply_to_id: Option<MessageId>,
    ) -> Result<Vec<CoordinatorAction>, ConnectionError> {
        let room_id = self.store.active().ok_or(ConnectionError::NoActiveRoom)?;
        if !self.session.is_open() || self.session.room_id() != Some(room_id) {
            return Err(ConnectionError::NotConnected);
        }

        let payload = OutboundMessage::new(content, message_type, reply_to_id).encode()?;
        let action = self.session.send(payload).map_err(|_| ConnectionError::NotConnected)?;

        Ok(self.apply_session(vec![action]))
    }

    /// Close the transport and cancel any pending reconnect.
    pub fn shutdown(&mut self) -> Vec<CoordinatorAction> {
        let actions = self.session.close("shutdown");
        self.apply_session(actions)
    }

    fn history_loaded(
        &mut self,
        room_id: RoomId,
        result: Result<HistoryPage, String>,
    ) -> Vec<CoordinatorAction> {
        if !self.history_requested.contains(&room_id) {
            tracing::debug!(room_id, "ignoring history for a room no longer tracked");
            return Vec::new();
        }

        match result {
            Ok(page) => {
                tracing::debug!(room_id, count = page.messages.len(), total = page.total, "history loaded");
                let mut messages = page.messages;
                messages.reverse();
                self.store.replace_history(room_id, messages);
            },
            Err(error) => {
                tracing::warn!(room_id, %error, "history load failed, treating as empty");
                self.store.ensure_history(room_id);
            },
        }

        vec![CoordinatorAction::Render]
    }

    fn fail(&mut self, what: &str, error: &str) -> Vec<CoordinatorAction> {
        tracing::warn!(%error, "failed to {what}");
        self.notice = Some(format!("Failed to {what}: {error}"));
        vec![CoordinatorAction::Render]
    }

    fn apply_session(&mut self, actions: Vec<SessionAction>) -> Vec<CoordinatorAction> {
        let mut out = Vec::with_capacity(actions.len());

        for action in actions {
            match action {
                SessionAction::Connect { generation, room_id, token } => {
                    out.push(CoordinatorAction::Connect { generation, room_id, token });
                },
                SessionAction::Transmit { generation, payload } => {
                    out.push(CoordinatorAction::Transmit { generation, payload });
                },
                SessionAction::Disconnect { generation, code, reason } => {
                    out.push(CoordinatorAction::Disconnect { generation, code, reason });
                },
                SessionAction::Deliver { payload, .. } => match self.dispatcher.dispatch(&payload) {
                    Some(DomainEvent::MessageReceived(message)) => {
                        if self.store.append_message(message) {
                            out.push(CoordinatorAction::Render);
                        }
                    },
                    Some(DomainEvent::ServerNotice(notice)) => {
                        tracing::info!(message = %notice.message, "server notice");
                        self.notice = Some(notice.message);
                        out.push(CoordinatorAction::Render);
                    },
                    None => {},
                },
                SessionAction::StatusChanged { .. }
                | SessionAction::ReconnectScheduled { .. }
                | SessionAction::ReconnectCancelled { .. } => {
                    if out.last() != Some(&CoordinatorAction::Render) {
                        out.push(CoordinatorAction::Render);
                    }
                },
            }
        }

        out
    }

    /// Returns true if the transport is open.
    pub fn is_connected(&self) -> bool {
        self.session.is_open()
    }

    /// Status, reconnect attempt and last fault of the transport.
    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Transport status.
    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    /// Last transport fault, if any.
    pub fn last_error(&self) -> Option<ConnectionFault> {
        self.session.state().last_error
    }

    /// Active room id. `None` if no room is selected.
    pub fn active_room(&self) -> Option<RoomId> {
        self.store.active()
    }

    /// History of the active room. Empty if no room is selected.
    pub fn active_messages(&self) -> &[Message] {
        self.store.active().map(|id| self.store.history(id)).unwrap_or_default()
    }

    /// Room summary list.
    pub fn rooms(&self) -> &[Room] {
        self.store.rooms()
    }

    /// Last notice for the user.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// When the coordinator next needs a `Tick`. `None` if nothing is pending.
    pub fn next_deadline(&self) -> Option<I> {
        self.session.next_deadline()
    }

    /// Underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Underlying transport session.
    pub fn session(&self) -> &Session<I> {
        &self.session
    }

    /// Frames dropped as malformed so far.
    pub fn dropped_frames(&self) -> u64 {
        self.dispatcher.dropped()
    }
}
