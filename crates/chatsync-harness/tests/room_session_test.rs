//! End-to-end room session scenarios over the simulation driver.
//!
//! Every step is checked against the standard invariant registry, so these
//! tests also fail if a scenario passes through an illegal state.

use std::time::Duration;

use chatsync_app::{Command, CoordinatorConfig, CoordinatorEvent};
use chatsync_core::{ConnectionFault, SessionConfig, SessionStatus, TransportEvent};
use chatsync_harness::{ConnectBehavior, Simulation, message_frame, test_message};
use chatsync_proto::{CreateRoomRequest, HistoryPage, MessageType, Room, close};

fn send(content: &str) -> Command {
    Command::Send { content: content.into(), message_type: MessageType::Text, reply_to_id: None }
}

fn connected_sim(room_id: u64) -> Simulation {
    let mut sim = Simulation::default();
    sim.driver().set_rooms(vec![Room::new(1, "general"), Room::new(2, "random")]);
    sim.start(vec![Command::Select(room_id)]).unwrap();
    assert_eq!(sim.coordinator().status(), SessionStatus::Open);
    sim
}

/// Fail the current connection and every reconnect until the session stops
/// scheduling. Returns the delays it scheduled, in milliseconds.
fn exhaust_reconnects(sim: &mut Simulation) -> Vec<u128> {
    sim.driver().set_connect_behavior(ConnectBehavior::Refuse);
    sim.driver().drop_connection();
    sim.settle().unwrap();

    let mut delays = Vec::new();
    while let Some(skipped) = sim.fire_reconnect().unwrap() {
        delays.push(skipped.as_millis());
    }
    delays
}

#[test]
fn inbound_message_extends_cached_history() {
    let mut sim = Simulation::default();
    let (m1, m2, m3) = (test_message(1, 1), test_message(2, 1), test_message(3, 1));
    sim.driver().set_rooms(vec![Room::new(1, "general")]);
    sim.driver().set_history(1, HistoryPage {
        messages: vec![m1.clone(), m2.clone()],
        total: 2,
        has_more: false,
    });

    sim.start(vec![Command::Select(1)]).unwrap();
    assert_eq!(sim.coordinator().active_messages(), [m1.clone(), m2.clone()]);

    sim.receive(&m3).unwrap();

    assert_eq!(sim.coordinator().active_messages(), [m1, m2, m3.clone()]);
    let room = sim.coordinator().rooms().iter().find(|r| r.id == 1).unwrap();
    assert_eq!(room.last_message.as_ref(), Some(&m3));
}

#[test]
fn reconnect_delays_double_then_fail() {
    let mut sim = connected_sim(1);

    let delays = exhaust_reconnects(&mut sim);
    let rendered: Vec<String> = delays.iter().map(ToString::to_string).collect();
    insta::assert_snapshot!(rendered.join(", "), @"1000, 2000, 4000, 8000, 16000");

    let state = sim.coordinator().connection_state();
    assert_eq!(state.status, SessionStatus::Failed);
    assert_eq!(state.last_error, Some(ConnectionFault::ReconnectExhausted { attempts: 5 }));

    // Nothing further happens on its own.
    let connects = sim.driver().connects().len();
    sim.advance(Duration::from_secs(600)).unwrap();
    assert_eq!(sim.driver().connects().len(), connects);
    assert_eq!(sim.coordinator().status(), SessionStatus::Failed);
}

#[test]
fn reconnect_delay_is_capped() {
    let config = CoordinatorConfig {
        session: SessionConfig { max_attempts: 7, ..SessionConfig::default() },
        ..CoordinatorConfig::default()
    };
    let mut sim = Simulation::with_config(config, Some("token"));
    sim.start(vec![Command::Select(1)]).unwrap();

    let delays = exhaust_reconnects(&mut sim);
    assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000]);
}

#[test]
fn successful_reconnect_resets_backoff() {
    let mut sim = connected_sim(1);

    sim.driver().drop_connection();
    sim.settle().unwrap();
    assert_eq!(sim.coordinator().status(), SessionStatus::Reconnecting);
    assert_eq!(sim.fire_reconnect().unwrap(), Some(Duration::from_millis(1000)));
    assert_eq!(sim.coordinator().status(), SessionStatus::Open);

    sim.driver().drop_connection();
    sim.settle().unwrap();
    let pending = sim.coordinator().session().pending_reconnect().copied().unwrap();
    assert_eq!(pending.attempt, 1);
    assert_eq!(pending.delay, Duration::from_millis(1000));
}

#[test]
fn failed_session_is_distinguishable_and_retried_by_select() {
    let mut sim = connected_sim(1);
    exhaust_reconnects(&mut sim);
    assert_eq!(sim.coordinator().status(), SessionStatus::Failed);
    assert!(!sim.coordinator().is_connected());

    sim.driver().set_connect_behavior(ConnectBehavior::Accept);
    sim.command(Command::Select(1)).unwrap();

    let state = sim.coordinator().connection_state();
    assert_eq!(state.status, SessionStatus::Open);
    assert_eq!(state.reconnect_attempt, 0);
    assert_eq!(state.last_error, None);
}

#[test]
fn quitting_while_reconnecting_cancels_the_timer() {
    let mut sim = connected_sim(1);
    sim.driver().drop_connection();
    sim.settle().unwrap();
    assert_eq!(sim.coordinator().status(), SessionStatus::Reconnecting);

    let connects = sim.driver().connects().len();
    assert!(sim.command(Command::Quit).unwrap());

    assert_eq!(sim.coordinator().status(), SessionStatus::Idle);
    assert_eq!(sim.coordinator().next_deadline(), None);

    sim.advance(Duration::from_secs(60)).unwrap();
    assert_eq!(sim.driver().connects().len(), connects);
}

#[test]
fn leaving_the_active_room_closes_without_reconnect() {
    let mut sim = connected_sim(1);
    let generation = sim.driver().latest_generation().unwrap();

    sim.command(Command::Leave(1)).unwrap();

    assert_eq!(sim.driver().disconnects(), vec![(generation, close::NORMAL)]);
    assert_eq!(sim.coordinator().status(), SessionStatus::Idle);
    assert_eq!(sim.coordinator().active_room(), None);
    assert!(sim.coordinator().rooms().iter().all(|r| r.id != 1));

    sim.advance(Duration::from_secs(60)).unwrap();
    assert_eq!(sim.driver().connects().len(), 1);
}

#[test]
fn switching_rooms_discards_the_old_connection() {
    let mut sim = connected_sim(1);
    let first = sim.driver().latest_generation().unwrap();

    sim.command(Command::Select(2)).unwrap();
    let second = sim.driver().latest_generation().unwrap();

    assert_ne!(first, second);
    assert_eq!(sim.driver().disconnects(), vec![(first, close::NORMAL)]);
    assert_eq!(sim.driver().live_connections(), vec![second]);
    assert_eq!(sim.coordinator().status(), SessionStatus::Open);
    assert_eq!(sim.coordinator().active_room(), Some(2));

    // Late traffic from the superseded connection.
    sim.driver()
        .inject_transport(first, TransportEvent::Message(message_frame(&test_message(50, 2))));
    sim.driver().inject_transport(first, TransportEvent::Closed {
        code: close::ABNORMAL,
        reason: "reset".into(),
    });
    sim.settle().unwrap();

    assert!(sim.coordinator().active_messages().is_empty());
    assert_eq!(sim.coordinator().status(), SessionStatus::Open);
    assert_eq!(sim.coordinator().next_deadline(), None);
}

#[test]
fn reselecting_the_live_room_is_a_noop() {
    let mut sim = connected_sim(1);

    sim.command(Command::Select(1)).unwrap();

    assert_eq!(sim.driver().connects().len(), 1);
    assert!(sim.driver().disconnects().is_empty());
    assert_eq!(sim.driver().history_requests(), vec![1]);
}

#[test]
fn history_is_fetched_once_per_room() {
    let mut sim = connected_sim(1);
    sim.command(Command::Select(2)).unwrap();
    sim.command(Command::Select(1)).unwrap();

    assert_eq!(sim.driver().history_requests(), vec![1, 2]);
    assert_eq!(sim.driver().connects().len(), 3);
}

#[test]
fn send_requires_an_open_session() {
    let mut sim = Simulation::default();
    sim.driver().set_connect_behavior(ConnectBehavior::Hold);
    sim.start(vec![Command::Select(1)]).unwrap();
    assert_eq!(sim.coordinator().status(), SessionStatus::Connecting);

    sim.command(send("too early")).unwrap();
    assert!(sim.driver().transmitted().is_empty());
    assert!(sim.coordinator().notice().is_some_and(|n| n.contains("not connected")));

    let generation = sim.driver().latest_generation().unwrap();
    sim.driver().inject_transport(generation, TransportEvent::Opened);
    sim.settle().unwrap();

    sim.command(send("hello")).unwrap();
    assert_eq!(sim.driver().transmitted(), vec![(
        generation,
        r#"{"content":"hello","message_type":"text"}"#.to_string()
    )]);
}

#[test]
fn missing_token_never_connects() {
    let mut sim = Simulation::new(None);
    sim.start(vec![Command::Select(1)]).unwrap();

    assert_eq!(sim.coordinator().status(), SessionStatus::Idle);
    assert!(sim.driver().connects().is_empty());
    assert_eq!(sim.coordinator().active_room(), Some(1));
}

#[test]
fn malformed_frames_and_notices_leave_the_session_open() {
    let mut sim = connected_sim(1);

    sim.driver().inject_frame("{garbage");
    sim.driver().inject_frame(r#"{"type":"error","message":"Message too long"}"#);
    sim.settle().unwrap();

    assert_eq!(sim.coordinator().status(), SessionStatus::Open);
    assert_eq!(sim.coordinator().dropped_frames(), 1);
    assert_eq!(sim.coordinator().notice(), Some("Message too long"));
    assert!(sim.coordinator().active_messages().is_empty());
}

#[test]
fn failed_history_load_is_empty_and_not_retried() {
    let mut sim = Simulation::default();
    sim.driver().set_rest_failing(true);
    sim.start(vec![Command::Select(1)]).unwrap();

    assert_eq!(sim.coordinator().status(), SessionStatus::Open);
    assert!(sim.coordinator().active_messages().is_empty());
    assert!(sim.coordinator().notice().is_some_and(|n| n.starts_with("Failed to load rooms")));

    sim.driver().set_rest_failing(false);
    sim.command(Command::Select(2)).unwrap();
    sim.command(Command::Select(1)).unwrap();
    assert_eq!(sim.driver().history_requests(), vec![1, 2]);
}

#[test]
fn created_room_is_listed_first_and_selected() {
    let mut sim = Simulation::default();
    sim.driver().set_rooms(vec![Room::new(1, "general")]);
    sim.start(Vec::new()).unwrap();

    sim.command(Command::Create(CreateRoomRequest {
        name: "design".into(),
        description: None,
        is_private: false,
        max_members: None,
    }))
    .unwrap();

    let rooms = sim.coordinator().rooms();
    assert_eq!(rooms.first().map(|r| r.name.as_str()), Some("design"));
    let created = rooms[0].id;
    assert_eq!(sim.coordinator().active_room(), Some(created));
    assert_eq!(sim.driver().connects().last().map(|c| c.room_id), Some(created));
}

#[test]
fn joining_refreshes_the_room_list() {
    let mut sim = Simulation::default();
    sim.start(Vec::new()).unwrap();
    assert!(sim.coordinator().rooms().is_empty());

    sim.command(Command::Join(7)).unwrap();

    assert_eq!(sim.coordinator().rooms().iter().map(|r| r.id).collect::<Vec<_>>(), vec![7]);
    assert_eq!(sim.coordinator().notice(), Some("Joined room 7"));
}

#[test]
fn tick_without_pending_reconnect_does_nothing() {
    let mut sim = connected_sim(1);
    let renders = sim.driver().renders();

    sim.dispatch(CoordinatorEvent::Tick).unwrap();

    assert_eq!(sim.driver().renders(), renders);
    assert_eq!(sim.driver().connects().len(), 1);
}
