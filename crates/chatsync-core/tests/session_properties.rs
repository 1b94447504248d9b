//! Property-based tests for the Session state machine.
//!
//! Drives the session with arbitrary interleavings of commands, transport
//! events (including events from stale generations) and clock advances, and
//! checks the lifecycle guarantees after every step.

use std::time::Duration;

use chatsync_core::{
    Generation, Session, SessionAction, SessionConfig, SessionStatus, TransportEvent,
};
use chatsync_proto::close;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Open(u64),
    Close,
    Send,
    Opened { stale: bool },
    Message { stale: bool },
    Closed { code: u16, stale: bool },
    Faulted { stale: bool },
    Advance(u64),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        2 => (1u64..4).prop_map(Step::Open),
        1 => Just(Step::Close),
        1 => Just(Step::Send),
        3 => any::<bool>().prop_map(|stale| Step::Opened { stale }),
        2 => any::<bool>().prop_map(|stale| Step::Message { stale }),
        2 => (prop_oneof![Just(close::NORMAL), Just(close::GOING_AWAY), Just(close::ABNORMAL)], any::<bool>())
            .prop_map(|(code, stale)| Step::Closed { code, stale }),
        2 => any::<bool>().prop_map(|stale| Step::Faulted { stale }),
        3 => (0u64..40_000).prop_map(Step::Advance),
    ]
}

fn target(session: &Session<Duration>, stale: bool) -> Generation {
    if stale { Generation::ZERO } else { session.generation() }
}

/// Tracks which connections the driver would consider live.
#[derive(Default)]
struct LiveSet {
    live: Vec<Generation>,
}

impl LiveSet {
    fn apply(&mut self, actions: &[SessionAction]) {
        for action in actions {
            match action {
                SessionAction::Connect { generation, .. } => self.live.push(*generation),
                SessionAction::Disconnect { generation, .. } => {
                    self.live.retain(|g| g != generation);
                },
                _ => {},
            }
        }
    }

    fn closed(&mut self, generation: Generation) {
        self.live.retain(|g| *g != generation);
    }
}

proptest! {
    #[test]
    fn prop_at_most_one_live_connection(steps in prop::collection::vec(step_strategy(), 0..80)) {
        let mut session = Session::<Duration>::new(SessionConfig::default());
        let mut live = LiveSet::default();
        let mut now = Duration::ZERO;

        for step in steps {
            let actions = match step {
                Step::Open(room) => session.open(Some(room), Some("token")),
                Step::Close => session.close("test"),
                Step::Send => session.send("x".into()).map(|a| vec![a]).unwrap_or_default(),
                Step::Opened { stale } => {
                    let g = target(&session, stale);
                    session.handle(g, TransportEvent::Opened, now)
                },
                Step::Message { stale } => {
                    let g = target(&session, stale);
                    session.handle(g, TransportEvent::Message("{}".into()), now)
                },
                Step::Closed { code, stale } => {
                    let g = target(&session, stale);
                    live.closed(g);
                    session.handle(g, TransportEvent::Closed { code, reason: String::new() }, now)
                },
                Step::Faulted { stale } => {
                    let g = target(&session, stale);
                    live.closed(g);
                    session.handle(g, TransportEvent::Faulted("io".into()), now)
                },
                Step::Advance(ms) => {
                    now += Duration::from_millis(ms);
                    session.tick(now)
                },
            };

            live.apply(&actions);
            prop_assert!(live.live.len() <= 1, "live connections: {:?}", live.live);

            if let Some(&g) = live.live.first() {
                prop_assert_eq!(g, session.generation());
            }
        }
    }

    #[test]
    fn prop_status_transitions_are_legal(steps in prop::collection::vec(step_strategy(), 0..80)) {
        let mut session = Session::<Duration>::new(SessionConfig::default());
        let mut now = Duration::ZERO;

        for step in steps {
            let actions = match step {
                Step::Open(room) => session.open(Some(room), Some("token")),
                Step::Close => session.close("test"),
                Step::Send => Vec::new(),
                Step::Opened { stale } => {
                    let g = target(&session, stale);
                    session.handle(g, TransportEvent::Opened, now)
                },
                Step::Message { stale } => {
                    let g = target(&session, stale);
                    session.handle(g, TransportEvent::Message("{}".into()), now)
                },
                Step::Closed { code, stale } => {
                    let g = target(&session, stale);
                    session.handle(g, TransportEvent::Closed { code, reason: String::new() }, now)
                },
                Step::Faulted { stale } => {
                    let g = target(&session, stale);
                    session.handle(g, TransportEvent::Faulted("io".into()), now)
                },
                Step::Advance(ms) => {
                    now += Duration::from_millis(ms);
                    session.tick(now)
                },
            };

            for action in &actions {
                if let SessionAction::StatusChanged { from, to } = action {
                    prop_assert!(from.can_transition_to(*to), "{:?} -> {:?}", from, to);
                }
            }

            let state = session.state();
            prop_assert!(state.reconnect_attempt <= SessionConfig::default().max_attempts);
            prop_assert_eq!(
                session.next_deadline().is_some(),
                state.status == SessionStatus::Reconnecting
            );
        }
    }

    #[test]
    fn prop_stale_events_never_change_state(
        events in prop::collection::vec(
            prop_oneof![
                Just(TransportEvent::Opened),
                Just(TransportEvent::Message("{}".into())),
                Just(TransportEvent::Closed { code: close::ABNORMAL, reason: String::new() }),
                Just(TransportEvent::Faulted("io".into())),
            ],
            1..20,
        )
    ) {
        let mut session = Session::<Duration>::new(SessionConfig::default());
        session.open(Some(1), Some("token"));
        let stale = session.generation();
        session.open(Some(2), Some("token"));

        let before = session.state();
        for event in events {
            let actions = session.handle(stale, event, Duration::ZERO);
            prop_assert!(actions.is_empty());
        }
        prop_assert_eq!(session.state(), before);
    }
}
