//! Seeded chaos runs.
//!
//! Each run replays a generated script of user commands, server frames,
//! transport faults and clock jumps. The simulation checks the invariant
//! registry after every step and panics on the first violation, naming the
//! step that caused it.

use chatsync_app::Command;
use chatsync_core::SessionStatus;
use chatsync_harness::{ChaosScript, ChaosStep, Simulation};
use chatsync_proto::Room;
use proptest::prelude::*;

fn run(seed: u64, len: usize) -> Simulation {
    let script = ChaosScript::generate(seed, len);
    let mut sim = Simulation::default();
    sim.driver().set_rooms(vec![Room::new(1, "general"), Room::new(2, "random")]);
    sim.start(Vec::new()).unwrap();

    for step in &script.steps {
        if sim.apply(step).unwrap() {
            break;
        }
    }
    sim
}

#[test]
fn fixed_seeds_hold_invariants() {
    for seed in [0, 1, 7, 42, 1337, 0xdead_beef] {
        run(seed, 300);
    }
}

#[test]
fn same_seed_replays_identically() {
    let a = run(99, 200);
    let b = run(99, 200);

    assert_eq!(a.driver().connects(), b.driver().connects());
    assert_eq!(a.driver().transmitted(), b.driver().transmitted());
    assert_eq!(a.coordinator().connection_state(), b.coordinator().connection_state());
    assert_eq!(a.coordinator().active_messages(), b.coordinator().active_messages());
}

#[test]
fn quit_after_chaos_releases_everything() {
    let mut sim = run(5, 250);

    assert!(sim.command(Command::Quit).unwrap());

    assert!(sim.driver().live_connections().is_empty());
    assert_eq!(sim.coordinator().next_deadline(), None);
    assert!(matches!(sim.coordinator().status(), SessionStatus::Idle | SessionStatus::Closing));
}

#[test]
fn reconnect_storm_stays_bounded() {
    let mut sim = Simulation::default();
    sim.start(vec![Command::Select(1)]).unwrap();

    for _ in 0..50 {
        sim.apply(&ChaosStep::DropConnection).unwrap();
        sim.apply(&ChaosStep::Advance(35_000)).unwrap();
    }

    let state = sim.coordinator().connection_state();
    assert!(state.reconnect_attempt <= 5);
    assert_eq!(state.status, SessionStatus::Open);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_chaos_preserves_invariants(seed in any::<u64>(), len in 1usize..200) {
        let sim = run(seed, len);
        prop_assert!(sim.driver().live_connections().len() <= 1);
    }
}
