//! Fuzz target for inbound frame decoding
//!
//! Arbitrary text fed through the dispatcher must never panic. Frames that
//! fail to decode are counted as dropped; frames that decode are counted as
//! decoded, and a decoded frame re-encodes to something that decodes again.

#![no_main]

use chatsync_core::{Dispatcher, dispatch};
use chatsync_proto::InboundFrame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut dispatcher = Dispatcher::new();
    let event = dispatcher.dispatch(text);
    assert_eq!(dispatcher.decoded() + dispatcher.dropped(), 1);
    assert_eq!(event.is_some(), dispatch::decode(text).is_ok());

    if let Ok(frame) = InboundFrame::decode(text) {
        let encoded = frame.encode().unwrap();
        assert_eq!(InboundFrame::decode(&encoded).unwrap(), frame);
    }
});
