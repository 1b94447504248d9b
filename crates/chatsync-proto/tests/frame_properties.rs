//! Property-based tests for frame decoding.
//!
//! Decoding is fed whatever the network delivers, so it must never panic and
//! must never confuse a broadcast message with a server notice.

use chatsync_proto::{
    InboundFrame, MAX_CONTENT_LEN, Message, MessageType, OutboundMessage, ProtocolError,
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

fn message_strategy() -> impl Strategy<Value = Message> {
    (
        any::<u64>(),
        any::<u64>(),
        any::<u64>(),
        "[a-z]{1,12}",
        ".{0,64}",
        prop_oneof![Just("text"), Just("image"), Just("file"), Just("system"), Just("sticker")],
        proptest::option::of(any::<u64>()),
        0i64..4_000_000_000,
    )
        .prop_map(|(id, room_id, user_id, username, content, kind, reply_to_id, secs)| Message {
            id,
            room_id,
            user_id,
            username,
            content,
            message_type: kind.to_string(),
            reply_to_id,
            created_at: Utc.timestamp_opt(secs, 0).single().unwrap_or_default(),
        })
}

proptest! {
    /// Property: arbitrary text never panics the decoder
    #[test]
    fn prop_decode_never_panics(text in ".{0,256}") {
        let _ = InboundFrame::decode(&text);
    }

    /// Property: a message record always decodes as a message, field for field
    #[test]
    fn prop_message_frames_are_messages(msg in message_strategy()) {
        let text = serde_json::to_string(&msg).unwrap();
        let decoded = InboundFrame::decode(&text).unwrap();
        prop_assert_eq!(decoded, InboundFrame::Message(msg));
    }

    /// Property: validation accepts exactly the non-blank content within the limit
    #[test]
    fn prop_validation_matches_server_rules(content in ".{0,64}", pad in 0usize..2) {
        let content = if pad == 1 { content.repeat(MAX_CONTENT_LEN / 8 + 1) } else { content };
        let result = OutboundMessage::new(content.clone(), MessageType::Text, None).validate();

        if content.trim().is_empty() {
            prop_assert!(matches!(result, Err(ProtocolError::EmptyContent)));
        } else if content.len() > MAX_CONTENT_LEN {
            let is_too_long = matches!(result, Err(ProtocolError::ContentTooLong { .. }));
            prop_assert!(is_too_long);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    /// Property: outbound frames always carry content and a type tag
    #[test]
    fn prop_outbound_frames_carry_required_fields(
        content in "[a-z ]{1,32}",
        reply in proptest::option::of(any::<u64>()),
    ) {
        let text = OutboundMessage::new(content.clone(), MessageType::Text, reply).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        prop_assert_eq!(value["content"].as_str(), Some(content.as_str()));
        prop_assert_eq!(value["message_type"].as_str(), Some("text"));
        prop_assert_eq!(value.get("reply_to_id").and_then(serde_json::Value::as_u64), reply);
    }
}
