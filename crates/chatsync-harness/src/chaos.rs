//! Seeded chaos scripts.
//!
//! A [`ChaosScript`] is a reproducible sequence of user commands, server
//! frames, transport faults and clock jumps. The same seed always produces
//! the same script, so a failing seed is a complete bug report.

use chatsync_proto::{MessageId, RoomId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::sim_driver::ConnectBehavior;

/// Rooms a script moves between.
const ROOMS: [RoomId; 3] = [1, 2, 3];

/// One scripted perturbation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChaosStep {
    /// User selects a room.
    Select(RoomId),
    /// User leaves a room.
    Leave(RoomId),
    /// User sends a message to the active room.
    Send(String),
    /// Server broadcasts a message to the active room.
    Inbound(MessageId),
    /// Server pushes a frame that is not valid JSON.
    Malformed,
    /// Server pushes an error notice.
    Notice,
    /// Transport reports `Opened` again for the current connection.
    Opened,
    /// Connection drops without a close handshake.
    DropConnection,
    /// Transport reports an I/O error.
    Fault,
    /// Server closes the connection normally.
    NormalClose,
    /// A superseded connection reports a frame.
    StaleEvent,
    /// Virtual time moves forward by this many milliseconds.
    Advance(u64),
    /// Change how new connections are answered.
    ConnectBehavior(ConnectBehavior),
    /// Start or end a REST outage.
    RestOutage(bool),
}

/// Reproducible sequence of chaos steps.
#[derive(Debug, Clone)]
pub struct ChaosScript {
    /// Seed the script was generated from.
    pub seed: u64,
    /// Steps in order.
    pub steps: Vec<ChaosStep>,
}

impl ChaosScript {
    /// Generate `len` steps from `seed`.
    pub fn generate(seed: u64, len: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut next_id: MessageId = 1;

        let steps = (0..len)
            .map(|_| {
                let room = ROOMS[rng.gen_range(0..ROOMS.len())];
                match rng.gen_range(0..100) {
                    0..15 => ChaosStep::Select(room),
                    15..19 => ChaosStep::Leave(room),
                    19..29 => ChaosStep::Send(format!("hello {}", rng.gen_range(0..1000))),
                    29..47 => {
                        next_id += 1;
                        ChaosStep::Inbound(next_id)
                    },
                    47..50 => ChaosStep::Malformed,
                    50..52 => ChaosStep::Notice,
                    52..55 => ChaosStep::Opened,
                    55..63 => ChaosStep::DropConnection,
                    63..68 => ChaosStep::Fault,
                    68..71 => ChaosStep::NormalClose,
                    71..75 => ChaosStep::StaleEvent,
                    75..90 => ChaosStep::Advance(rng.gen_range(0..20_000)),
                    90..96 => ChaosStep::ConnectBehavior(match rng.gen_range(0..4) {
                        0 => ConnectBehavior::Refuse,
                        1 => ConnectBehavior::Hold,
                        _ => ConnectBehavior::Accept,
                    }),
                    _ => ChaosStep::RestOutage(rng.gen_bool(0.3)),
                }
            })
            .collect();

        Self { seed, steps }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the script has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
