//! Line-oriented rendering of the coordinator read model.
//!
//! The terminal is an append-only log, so [`Renderer`] remembers what it has
//! already printed and only writes what changed since the last render: new
//! messages in the active room, a new connection status, a new notice, a
//! changed room list.

use std::io::{self, Write};

use chatsync_app::Coordinator;
use chatsync_core::{ConnectionFault, ConnectionState, Instant, SessionStatus};
use chatsync_proto::{Message, Room, RoomId};

/// Messages replayed when a room becomes active.
const BACKLOG: usize = 20;

/// Incremental renderer.
#[derive(Debug, Default)]
pub struct Renderer {
    room: Option<RoomId>,
    printed: usize,
    status: Option<String>,
    notice: Option<String>,
    rooms: Option<Vec<(RoomId, String)>>,
}

impl Renderer {
    /// Create a renderer that has printed nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write everything that changed since the previous call.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn render<I: Instant>(
        &mut self,
        coordinator: &Coordinator<I>,
        out: &mut impl Write,
    ) -> io::Result<()> {
        let rooms: Vec<_> = coordinator.rooms().iter().map(|r| (r.id, r.name.clone())).collect();
        if self.rooms.as_ref() != Some(&rooms) {
            writeln!(out, "{}", room_list(coordinator.rooms(), coordinator.active_room()))?;
            self.rooms = Some(rooms);
        }

        let active = coordinator.active_room();
        let messages = coordinator.active_messages();
        if active != self.room {
            self.room = active;
            self.printed = messages.len().saturating_sub(BACKLOG);
            if let Some(room_id) = active {
                let name = coordinator.rooms().iter().find(|r| r.id == room_id).map(|r| r.name.as_str());
                writeln!(out, "== {} ==", name.unwrap_or("unlisted room"))?;
            }
        }

        // History replaced by a load can be shorter than what was printed.
        if self.printed > messages.len() {
            self.printed = 0;
        }
        for message in messages.iter().skip(self.printed) {
            writeln!(out, "{}", message_line(message))?;
        }
        self.printed = messages.len();

        let status = status_line(&coordinator.connection_state());
        if self.status.as_ref() != Some(&status) {
            writeln!(out, "{status}")?;
            self.status = Some(status);
        }

        let notice = coordinator.notice().map(str::to_string);
        if notice.is_some() && notice != self.notice {
            writeln!(out, "* {}", notice.as_deref().unwrap_or_default())?;
        }
        self.notice = notice;

        out.flush()
    }
}

/// One message as a log line.
pub fn message_line(message: &Message) -> String {
    let time = message.created_at.format("%H:%M");
    match message.reply_to_id {
        Some(id) => format!("[{time}] {} (re #{id}): {}", message.username, message.content),
        None => format!("[{time}] {}: {}", message.username, message.content),
    }
}

/// Connection indicator. Exhausted reconnects read differently from a retry
/// in progress.
pub fn status_line(state: &ConnectionState) -> String {
    match state.status {
        SessionStatus::Idle => "[offline]".to_string(),
        SessionStatus::Connecting => "[connecting]".to_string(),
        SessionStatus::Open => "[connected]".to_string(),
        SessionStatus::Closing => "[disconnecting]".to_string(),
        SessionStatus::Reconnecting => {
            let reason = state.last_error.as_ref().map(ToString::to_string).unwrap_or_default();
            format!("[reconnecting, attempt {}] {reason}", state.reconnect_attempt)
                .trim_end()
                .to_string()
        },
        SessionStatus::Failed => match &state.last_error {
            Some(ConnectionFault::ReconnectExhausted { attempts }) => format!(
                "[disconnected] gave up after {attempts} attempts; /switch to the room to retry"
            ),
            _ => "[disconnected] /switch to the room to retry".to_string(),
        },
    }
}

/// Room list as one line, with the active room marked.
pub fn room_list(rooms: &[Room], active: Option<RoomId>) -> String {
    if rooms.is_empty() {
        return "rooms: (none)".to_string();
    }

    let entries: Vec<String> = rooms
        .iter()
        .map(|room| {
            let marker = if Some(room.id) == active { "*" } else { "" };
            let lock = if room.is_private { " (private)" } else { "" };
            format!("{marker}{} {}{lock}", room.id, room.name)
        })
        .collect();
    format!("rooms: {}", entries.join(", "))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chatsync_app::{CoordinatorConfig, CoordinatorEvent};
    use chatsync_core::TransportEvent;
    use chrono::{TimeZone, Utc};

    use super::*;

    fn message(id: u64, content: &str) -> Message {
        Message {
            id,
            room_id: 1,
            user_id: 2,
            username: "bob".into(),
            content: content.into(),
            message_type: "text".into(),
            reply_to_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        }
    }

    fn rendered(renderer: &mut Renderer, coordinator: &Coordinator<Duration>) -> String {
        let mut out = Vec::new();
        renderer.render(coordinator, &mut out).unwrap();
        String::from_utf8(out).unwrap().trim_end().to_string()
    }

    #[test]
    fn message_lines() {
        insta::assert_snapshot!(message_line(&message(1, "hi")), @"[12:30] bob: hi");

        let mut reply = message(2, "agreed");
        reply.reply_to_id = Some(1);
        insta::assert_snapshot!(message_line(&reply), @"[12:30] bob (re #1): agreed");
    }

    #[test]
    fn failed_reads_differently_from_reconnecting() {
        let reconnecting = ConnectionState {
            status: SessionStatus::Reconnecting,
            reconnect_attempt: 2,
            last_error: Some(ConnectionFault::Connect("refused".into())),
        };
        let failed = ConnectionState {
            status: SessionStatus::Failed,
            reconnect_attempt: 5,
            last_error: Some(ConnectionFault::ReconnectExhausted { attempts: 5 }),
        };

        assert!(status_line(&reconnecting).starts_with("[reconnecting, attempt 2]"));
        insta::assert_snapshot!(
            status_line(&failed),
            @"[disconnected] gave up after 5 attempts; /switch to the room to retry"
        );
    }

    #[test]
    fn room_list_marks_active() {
        let mut private = Room::new(2, "ops");
        private.is_private = true;
        let rooms = vec![Room::new(1, "general"), private];

        insta::assert_snapshot!(room_list(&rooms, Some(1)), @"rooms: *1 general, 2 ops (private)");
        insta::assert_snapshot!(room_list(&[], None), @"rooms: (none)");
    }

    #[test]
    fn only_changes_are_printed() {
        let mut coordinator: Coordinator<Duration> =
            Coordinator::new(CoordinatorConfig::default(), Some("t".into()));
        let mut renderer = Renderer::new();

        coordinator.handle(CoordinatorEvent::RoomsLoaded(Ok(vec![Room::new(1, "general")])), Duration::ZERO);
        coordinator.select_room(Room::new(1, "general"));
        let generation = coordinator.session().generation();
        coordinator.handle(
            CoordinatorEvent::Transport { generation, event: TransportEvent::Opened },
            Duration::ZERO,
        );

        insta::assert_snapshot!(rendered(&mut renderer, &coordinator), @r###"
        rooms: *1 general
        == general ==
        [connected]
        "###);

        let frame = serde_json::to_string(&message(7, "hello")).unwrap();
        coordinator.handle(
            CoordinatorEvent::Transport { generation, event: TransportEvent::Message(frame) },
            Duration::ZERO,
        );

        insta::assert_snapshot!(rendered(&mut renderer, &coordinator), @"[12:30] bob: hello");
        assert_eq!(rendered(&mut renderer, &coordinator), "");
    }
}
