//! Inbound frame dispatch.
//!
//! Turns raw frame text into typed [`DomainEvent`]s and classifies transport
//! closes. A frame that fails to decode is logged and dropped; it never
//! affects connection state or blocks the frames behind it.

use chatsync_proto::{InboundFrame, Message, ServerNotice, close};

use crate::error::DecodeError;

/// Typed event decoded from an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// A message was broadcast to a room.
    MessageReceived(Message),
    /// Server rejected something this client sent.
    ServerNotice(ServerNotice),
}

/// Decode one inbound frame.
pub fn decode(raw: &str) -> Result<DomainEvent, DecodeError> {
    match InboundFrame::decode(raw) {
        Ok(InboundFrame::Message(message)) => Ok(DomainEvent::MessageReceived(message)),
        Ok(InboundFrame::Notice(notice)) => Ok(DomainEvent::ServerNotice(notice)),
        Err(source) => Err(DecodeError::Malformed { len: raw.len(), source }),
    }
}

/// How a transport close should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Intentional close. No reconnect.
    Manual,
    /// Dropped connection. Reconnect with backoff.
    Abnormal,
}

/// Classify a close code.
pub fn classify_close(code: u16) -> CloseKind {
    if close::is_normal(code) { CloseKind::Manual } else { CloseKind::Abnormal }
}

/// Frame decoder with drop accounting.
#[derive(Debug, Default, Clone)]
pub struct Dispatcher {
    decoded: u64,
    dropped: u64,
}

impl Dispatcher {
    /// Create a dispatcher with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a frame, logging and dropping it if malformed.
    pub fn dispatch(&mut self, raw: &str) -> Option<DomainEvent> {
        match decode(raw) {
            Ok(event) => {
                self.decoded += 1;
                Some(event)
            },
            Err(err) => {
                self.dropped += 1;
                tracing::warn!(error = %err, dropped = self.dropped, "dropping inbound frame");
                None
            },
        }
    }

    /// Frames decoded successfully.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Frames dropped as malformed.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &str = r#"{"id":1,"chat_id":9,"user_id":2,"username":"a","content":"hi","message_type":"text","created_at":"2024-05-01T12:00:00Z"}"#;

    #[test]
    fn decodes_message() {
        let event = decode(MESSAGE).unwrap();
        assert!(matches!(event, DomainEvent::MessageReceived(m) if m.room_id == 9));
    }

    #[test]
    fn decodes_notice() {
        let event = decode(r#"{"type":"error","message":"Invalid message: too long"}"#).unwrap();
        assert!(matches!(event, DomainEvent::ServerNotice(n) if n.message.contains("too long")));
    }

    #[test]
    fn malformed_reports_length() {
        let err = decode("{oops").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { len: 5, .. }));
    }

    #[test]
    fn bad_frame_does_not_block_next() {
        let mut dispatcher = Dispatcher::new();

        assert!(dispatcher.dispatch("garbage").is_none());
        assert!(dispatcher.dispatch(MESSAGE).is_some());
        assert_eq!(dispatcher.dropped(), 1);
        assert_eq!(dispatcher.decoded(), 1);
    }

    #[test]
    fn close_classification() {
        assert_eq!(classify_close(close::NORMAL), CloseKind::Manual);
        assert_eq!(classify_close(close::GOING_AWAY), CloseKind::Abnormal);
        assert_eq!(classify_close(close::ABNORMAL), CloseKind::Abnormal);
    }
}
