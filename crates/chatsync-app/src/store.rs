//! Message synchronization store.
//!
//! Holds the room summary list, the ordered message history of every room
//! seen this session, and the active-room pointer.
//!
//! # Invariants
//!
//! - A room's history only grows at the tail. The sole exception is
//!   [`Store::replace_history`], which installs a REST-loaded page wholesale.
//! - `last_message` of a listed room is the last message appended for it, or
//!   whatever the room directory reported if nothing arrived since.

use std::collections::HashMap;

use chatsync_proto::{Message, Room, RoomId};

/// In-memory rooms and message histories.
#[derive(Debug, Clone, Default)]
pub struct Store {
    /// Room summaries, in directory order.
    rooms: Vec<Room>,
    /// Per-room history in arrival order.
    histories: HashMap<RoomId, Vec<Message>>,
    /// Currently active room.
    active: Option<RoomId>,
    /// Drop inbound messages whose id is already in the room's history.
    dedupe_by_id: bool,
}

impl Store {
    /// Create an empty store.
    pub fn new(dedupe_by_id: bool) -> Self {
        Self { dedupe_by_id, ..Self::default() }
    }

    /// Append `message` to its room's history and update the room preview.
    ///
    /// Returns false if the message was dropped as a duplicate. Duplicates
    /// are only detected when id deduplication is enabled.
    pub fn append_message(&mut self, message: Message) -> bool {
        let history = self.histories.entry(message.room_id).or_default();

        if self.dedupe_by_id && history.iter().any(|m| m.id == message.id) {
            tracing::debug!(room_id = message.room_id, id = message.id, "duplicate message dropped");
            return false;
        }

        if let Some(room) = self.rooms.iter_mut().find(|r| r.id == message.room_id) {
            room.last_message = Some(message.clone());
        }
        history.push(message);
        true
    }

    /// Replace the room list with a fresh copy from the room directory.
    ///
    /// A locally known `last_message` survives when the incoming record has
    /// none.
    pub fn replace_room_list(&mut self, rooms: Vec<Room>) {
        let mut previous: HashMap<RoomId, Message> = self
            .rooms
            .drain(..)
            .filter_map(|r| r.last_message.map(|m| (r.id, m)))
            .collect();

        self.rooms = rooms
            .into_iter()
            .map(|mut room| {
                if room.last_message.is_none() {
                    room.last_message = previous.remove(&room.id);
                }
                room
            })
            .collect();
    }

    /// Put `room` at the head of the list, replacing any entry with its id.
    pub fn insert_room(&mut self, room: Room) {
        self.rooms.retain(|r| r.id != room.id);
        self.rooms.insert(0, room);
    }

    /// Drop a room and its history. Clears the active pointer if it pointed
    /// at the room.
    ///
    /// Returns true if the room was listed or had history.
    pub fn remove_room(&mut self, room_id: RoomId) -> bool {
        let listed = self.rooms.len();
        self.rooms.retain(|r| r.id != room_id);
        let had_history = self.histories.remove(&room_id).is_some();

        if self.active == Some(room_id) {
            self.active = None;
        }

        listed != self.rooms.len() || had_history
    }

    /// History of a room in arrival order. Empty if unknown.
    pub fn history(&self, room_id: RoomId) -> &[Message] {
        self.histories.get(&room_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns true if a history (possibly empty) is cached for the room.
    pub fn has_history(&self, room_id: RoomId) -> bool {
        self.histories.contains_key(&room_id)
    }

    /// Install a freshly loaded history, replacing what is cached.
    ///
    /// `messages` must be in arrival order, oldest first. The newest one
    /// becomes the room preview unless the room already has one.
    pub fn replace_history(&mut self, room_id: RoomId, messages: Vec<Message>) {
        if let Some(last) = messages.last()
            && let Some(room) = self.rooms.iter_mut().find(|r| r.id == room_id)
            && room.last_message.is_none()
        {
            room.last_message = Some(last.clone());
        }
        self.histories.insert(room_id, messages);
    }

    /// Mark a room's history as cached without changing it.
    pub fn ensure_history(&mut self, room_id: RoomId) {
        self.histories.entry(room_id).or_default();
    }

    /// Set the active room.
    pub fn set_active(&mut self, room_id: Option<RoomId>) {
        self.active = room_id;
    }

    /// Active room id.
    pub fn active(&self) -> Option<RoomId> {
        self.active
    }

    /// Active room summary, if it is listed.
    pub fn active_room(&self) -> Option<&Room> {
        self.active.and_then(|id| self.room(id))
    }

    /// Room summary by id.
    pub fn room(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    /// Room summaries in list order.
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }
}
