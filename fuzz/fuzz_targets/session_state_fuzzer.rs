//! Fuzz target for the transport session state machine
//!
//! # Strategy
//!
//! - Generations: current, previous and far-future tags on every event
//! - Close codes: normal, going away, no status, abnormal and arbitrary
//! - Clock: monotonic jumps of up to a minute between ticks
//!
//! # Invariants
//!
//! - Every status change is a legal transition
//! - At most one connection is live at a time
//! - Reconnect attempts never exceed the configured maximum
//! - A pending reconnect exists exactly while `Reconnecting`
//! - Frames are only delivered while `Open`

#![no_main]

use std::{collections::BTreeSet, time::Duration};

use arbitrary::Arbitrary;
use chatsync_core::{Generation, Session, SessionAction, SessionConfig, SessionStatus, TransportEvent};
use chatsync_proto::close;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum SessionOp {
    Open { room_id: Option<u8>, with_token: bool },
    Close,
    Send,
    Event { target: GenerationChoice, event: EventChoice },
    Tick { advance_ms: u16 },
}

#[derive(Debug, Clone, Arbitrary)]
enum GenerationChoice {
    Current,
    Previous,
    Future(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum EventChoice {
    Opened,
    Message,
    Closed(CloseChoice),
    Faulted,
}

#[derive(Debug, Clone, Arbitrary)]
enum CloseChoice {
    Normal,
    GoingAway,
    NoStatus,
    Abnormal,
    Other(u16),
}

fn code(choice: &CloseChoice) -> u16 {
    match choice {
        CloseChoice::Normal => close::NORMAL,
        CloseChoice::GoingAway => close::GOING_AWAY,
        CloseChoice::NoStatus => close::NO_STATUS,
        CloseChoice::Abnormal => close::ABNORMAL,
        CloseChoice::Other(code) => *code,
    }
}

fn generation(session: &Session<Duration>, choice: &GenerationChoice) -> Generation {
    let current = session.generation();
    match choice {
        GenerationChoice::Current => current,
        GenerationChoice::Previous => {
            let mut previous = Generation::ZERO;
            while previous.next() < current {
                previous = previous.next();
            }
            previous
        },
        GenerationChoice::Future(n) => {
            let mut future = current;
            for _ in 0..=*n {
                future = future.next();
            }
            future
        },
    }
}

fuzz_target!(|ops: Vec<SessionOp>| {
    let config = SessionConfig::default();
    let mut session: Session<Duration> = Session::new(config);
    let mut now = Duration::ZERO;
    let mut live: BTreeSet<Generation> = BTreeSet::new();

    for op in ops {
        let before = session.status();
        let actions = match op {
            SessionOp::Open { room_id, with_token } => {
                session.open(room_id.map(u64::from), with_token.then_some("token"))
            },
            SessionOp::Close => session.close("fuzz"),
            SessionOp::Send => session.send("{}".to_string()).into_iter().collect(),
            SessionOp::Event { target, event } => {
                let tag = generation(&session, &target);
                let event = match event {
                    EventChoice::Opened => TransportEvent::Opened,
                    EventChoice::Message => TransportEvent::Message("{}".to_string()),
                    EventChoice::Closed(choice) => {
                        live.remove(&tag);
                        TransportEvent::Closed { code: code(&choice), reason: String::new() }
                    },
                    EventChoice::Faulted => {
                        live.remove(&tag);
                        TransportEvent::Faulted("fuzz".to_string())
                    },
                };
                session.handle(tag, event, now)
            },
            SessionOp::Tick { advance_ms } => {
                now += Duration::from_millis(u64::from(advance_ms) * 10);
                session.tick(now)
            },
        };

        let mut status = before;
        for action in &actions {
            match action {
                SessionAction::Connect { generation, .. } => {
                    live.insert(*generation);
                },
                SessionAction::Disconnect { generation, .. } => {
                    live.remove(generation);
                },
                SessionAction::StatusChanged { from, to } => {
                    assert_eq!(*from, status);
                    assert!(from.can_transition_to(*to), "illegal transition {from:?} -> {to:?}");
                    status = *to;
                },
                SessionAction::Deliver { .. } => {
                    assert_eq!(session.status(), SessionStatus::Open);
                },
                _ => {},
            }
        }

        assert_eq!(status, session.status());
        assert!(live.len() <= 1, "live connections: {live:?}");
        assert!(session.state().reconnect_attempt <= config.max_attempts);
        assert_eq!(
            session.pending_reconnect().is_some(),
            session.status() == SessionStatus::Reconnecting
        );
    }
});
