//! Standard invariants for the room session client.

use chatsync_core::SessionStatus;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

fn violation(invariant: &'static str, message: String) -> InvariantResult {
    Err(Violation { invariant, message })
}

/// At most one transport connection is live, and it belongs to the current
/// generation.
pub struct AtMostOneLiveConnection;

impl Invariant for AtMostOneLiveConnection {
    fn name(&self) -> &'static str {
        "at_most_one_live_connection"
    }

    fn check(&self, _before: Option<&SystemSnapshot>, after: &SystemSnapshot) -> InvariantResult {
        match after.live_connections.as_slice() {
            [] => Ok(()),
            [live] if *live == after.generation => Ok(()),
            [live] => violation(
                self.name(),
                format!("live connection {live} is not the current generation {}", after.generation),
            ),
            many => violation(self.name(), format!("{} live connections: {many:?}", many.len())),
        }
    }
}

/// A connecting or open session is bound to the active room.
pub struct SessionBoundToActiveRoom;

impl Invariant for SessionBoundToActiveRoom {
    fn name(&self) -> &'static str {
        "session_bound_to_active_room"
    }

    fn check(&self, _before: Option<&SystemSnapshot>, after: &SystemSnapshot) -> InvariantResult {
        let connected = matches!(after.status, SessionStatus::Connecting | SessionStatus::Open);
        if connected && after.session_room != after.active_room {
            return violation(
                self.name(),
                format!(
                    "session {:?} bound to {:?} but active room is {:?}",
                    after.status, after.session_room, after.active_room
                ),
            );
        }
        Ok(())
    }
}

/// Reconnect attempts never exceed the limit, and a reconnect is pending
/// exactly while the session is reconnecting.
pub struct ReconnectBounded;

impl Invariant for ReconnectBounded {
    fn name(&self) -> &'static str {
        "reconnect_bounded"
    }

    fn check(&self, _before: Option<&SystemSnapshot>, after: &SystemSnapshot) -> InvariantResult {
        if after.reconnect_attempt > after.max_attempts {
            return violation(
                self.name(),
                format!("attempt {} exceeds limit {}", after.reconnect_attempt, after.max_attempts),
            );
        }

        let reconnecting = after.status == SessionStatus::Reconnecting;
        if reconnecting != after.reconnect_pending {
            return violation(
                self.name(),
                format!("status {:?} with reconnect pending = {}", after.status, after.reconnect_pending),
            );
        }
        Ok(())
    }
}

/// A room's history only grows at the tail between steps, unless a history
/// load was served for it in between.
pub struct HistoryAppendOnly;

impl Invariant for HistoryAppendOnly {
    fn name(&self) -> &'static str {
        "history_append_only"
    }

    fn check(&self, before: Option<&SystemSnapshot>, after: &SystemSnapshot) -> InvariantResult {
        let Some(before) = before else {
            return Ok(());
        };

        for (room_id, ids) in &after.histories {
            let Some(previous) = before.histories.get(room_id) else {
                continue;
            };
            if before.loads(*room_id) != after.loads(*room_id) {
                continue;
            }
            if !ids.starts_with(previous) {
                return violation(
                    self.name(),
                    format!("room {room_id} history rewritten: {previous:?} -> {ids:?}"),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chatsync_core::Generation;

    use super::*;

    fn snapshot() -> SystemSnapshot {
        SystemSnapshot::empty(5)
    }

    #[test]
    fn two_live_connections_violate() {
        let g1 = Generation::ZERO.next();
        let mut after = snapshot();
        after.generation = g1.next();
        after.live_connections = vec![g1, g1.next()];

        assert!(AtMostOneLiveConnection.check(None, &after).is_err());
    }

    #[test]
    fn stale_live_connection_violates() {
        let g1 = Generation::ZERO.next();
        let mut after = snapshot();
        after.generation = g1.next();
        after.live_connections = vec![g1];

        assert!(AtMostOneLiveConnection.check(None, &after).is_err());
    }

    #[test]
    fn open_session_on_other_room_violates() {
        let mut after = snapshot();
        after.status = SessionStatus::Open;
        after.session_room = Some(1);
        after.active_room = Some(2);

        assert!(SessionBoundToActiveRoom.check(None, &after).is_err());

        after.status = SessionStatus::Closing;
        assert!(SessionBoundToActiveRoom.check(None, &after).is_ok());
    }

    #[test]
    fn reconnecting_without_timer_violates() {
        let mut after = snapshot();
        after.status = SessionStatus::Reconnecting;
        assert!(ReconnectBounded.check(None, &after).is_err());

        after.reconnect_pending = true;
        assert!(ReconnectBounded.check(None, &after).is_ok());

        after.reconnect_attempt = 6;
        assert!(ReconnectBounded.check(None, &after).is_err());
    }

    #[test]
    fn rewritten_history_violates_unless_reloaded() {
        let mut before = snapshot();
        before.histories.insert(1, vec![1, 2, 3]);

        let mut after = snapshot();
        after.histories.insert(1, vec![1, 3]);
        assert!(HistoryAppendOnly.check(Some(&before), &after).is_err());

        after.history_loads.insert(1, 1);
        assert!(HistoryAppendOnly.check(Some(&before), &after).is_ok());

        let mut grown = snapshot();
        grown.histories.insert(1, vec![1, 2, 3, 4]);
        assert!(HistoryAppendOnly.check(Some(&before), &grown).is_ok());
    }
}
