//! Runtime-over-simulation wiring.
//!
//! [`Simulation`] owns a [`Runtime`] running on a [`SimDriver`] and checks
//! the invariant registry after every step. Futures are driven with
//! [`futures::executor::block_on`]: the sim driver never waits on anything,
//! so every call completes on its first poll.

use std::time::Duration;

use chatsync_app::{Command, Coordinator, CoordinatorConfig, CoordinatorEvent, Runtime};
use chatsync_core::{Environment, TransportEvent};
use chatsync_proto::{Message, MessageId, RoomId};
use chrono::{DateTime, Utc};
use futures::executor::block_on;

use crate::{
    InvariantRegistry, SimDriver, SimDriverError, SimInstant, SystemSnapshot,
    chaos::ChaosStep,
};

/// Upper bound on queued events drained by one [`Simulation::settle`].
const MAX_SETTLE_STEPS: usize = 1_000;

/// Seconds since the epoch of the first test message timestamp.
const BASE_TIMESTAMP: i64 = 1_714_564_800;

/// A message in `room_id` with deterministic content and timestamp.
pub fn test_message(id: MessageId, room_id: RoomId) -> Message {
    let offset = i64::try_from(id).unwrap_or(i64::MAX - BASE_TIMESTAMP);
    Message {
        id,
        room_id,
        user_id: 2,
        username: "bob".into(),
        content: format!("message {id}"),
        message_type: "text".into(),
        reply_to_id: None,
        created_at: DateTime::<Utc>::from_timestamp(BASE_TIMESTAMP + offset, 0)
            .unwrap_or_default(),
    }
}

/// `message` as the text frame the server broadcasts.
pub fn message_frame(message: &Message) -> String {
    serde_json::to_string(message).unwrap_or_default()
}

/// Deterministic client simulation with invariant checking.
pub struct Simulation {
    runtime: Runtime<SimDriver>,
    driver: SimDriver,
    registry: InvariantRegistry,
    max_attempts: u32,
    last: Option<SystemSnapshot>,
    steps: usize,
}

impl Simulation {
    /// Client with default configuration and credential `token`.
    pub fn new(token: Option<&str>) -> Self {
        Self::with_config(CoordinatorConfig::default(), token)
    }

    /// Client with `config` and credential `token`.
    pub fn with_config(config: CoordinatorConfig, token: Option<&str>) -> Self {
        Self::with_driver(SimDriver::new(), config, token)
    }

    /// Client over a prepared driver.
    pub fn with_driver(driver: SimDriver, config: CoordinatorConfig, token: Option<&str>) -> Self {
        let coordinator = Coordinator::new(config, token.map(str::to_string));
        Self {
            runtime: Runtime::new(driver.clone(), coordinator),
            driver,
            registry: InvariantRegistry::standard(),
            max_attempts: config.session.max_attempts,
            last: None,
            steps: 0,
        }
    }

    /// Driver handle for scripting the server side.
    pub fn driver(&self) -> &SimDriver {
        &self.driver
    }

    /// Coordinator read model.
    pub fn coordinator(&self) -> &Coordinator<SimInstant> {
        self.runtime.coordinator()
    }

    /// Current virtual time.
    pub fn now(&self) -> SimInstant {
        self.driver.env().now()
    }

    /// Observable state right now.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::capture(
            self.runtime.coordinator(),
            self.max_attempts,
            self.driver.live_connections(),
            self.driver.histories_served(),
        )
    }

    /// Load the room list and apply `commands`, then drain queued events.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn start(&mut self, commands: Vec<Command>) -> Result<bool, SimDriverError> {
        let quit = block_on(self.runtime.start(commands))?;
        self.check("start");
        Ok(quit || self.settle()?)
    }

    /// Apply one user command, then drain queued events.
    ///
    /// Returns `true` if the command quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn command(&mut self, command: Command) -> Result<bool, SimDriverError> {
        self.dispatch(CoordinatorEvent::Command(command))
    }

    /// Feed one event, then drain queued events.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn dispatch(&mut self, event: CoordinatorEvent) -> Result<bool, SimDriverError> {
        let quit = block_on(self.runtime.dispatch(event))?;
        self.check("dispatch");
        Ok(quit || self.settle()?)
    }

    /// Run one event loop cycle.
    ///
    /// With nothing queued this jumps the clock to the pending reconnect
    /// deadline, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn step(&mut self) -> Result<bool, SimDriverError> {
        let quit = block_on(self.runtime.step())?;
        self.check("step");
        Ok(quit)
    }

    /// Process queued events until none are left.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn settle(&mut self) -> Result<bool, SimDriverError> {
        for _ in 0..MAX_SETTLE_STEPS {
            if !self.driver.has_pending() {
                return Ok(false);
            }
            if self.step()? {
                return Ok(true);
            }
        }

        tracing::warn!(steps = MAX_SETTLE_STEPS, "events still queued after settle limit");
        Ok(false)
    }

    /// Move the clock forward, fire anything due, then drain queued events.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn advance(&mut self, duration: Duration) -> Result<bool, SimDriverError> {
        self.driver.env().advance(duration);
        self.dispatch(CoordinatorEvent::Tick)
    }

    /// Jump to the pending reconnect deadline and fire it.
    ///
    /// Returns the delay that was skipped, or `None` if no reconnect was
    /// pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn fire_reconnect(&mut self) -> Result<Option<Duration>, SimDriverError> {
        let Some(deadline) = self.coordinator().next_deadline() else {
            return Ok(None);
        };

        let skipped = deadline - self.now();
        self.advance(skipped)?;
        Ok(Some(skipped))
    }

    /// Deliver `message` on the newest connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn receive(&mut self, message: &Message) -> Result<bool, SimDriverError> {
        self.driver.inject_frame(message_frame(message));
        self.settle()
    }

    /// Apply a chaos step.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn apply(&mut self, step: &ChaosStep) -> Result<bool, SimDriverError> {
        let current = self.coordinator().session().generation();

        match step {
            ChaosStep::Select(room_id) => return self.command(Command::Select(*room_id)),
            ChaosStep::Leave(room_id) => return self.command(Command::Leave(*room_id)),
            ChaosStep::Send(content) => {
                return self.command(Command::Send {
                    content: content.clone(),
                    message_type: chatsync_proto::MessageType::Text,
                    reply_to_id: None,
                });
            },
            ChaosStep::Inbound(id) => {
                let room_id = self.coordinator().active_room().unwrap_or(1);
                return self.receive(&test_message(*id, room_id));
            },
            ChaosStep::Malformed => self.driver.inject_frame("{not json"),
            ChaosStep::Notice => {
                self.driver.inject_frame(r#"{"type":"error","message":"rate limited"}"#);
            },
            ChaosStep::Opened => self.driver.inject_transport(current, TransportEvent::Opened),
            ChaosStep::DropConnection => self.driver.drop_connection(),
            ChaosStep::Fault => {
                self.driver.inject_transport(current, TransportEvent::Faulted("reset".into()));
            },
            ChaosStep::NormalClose => {
                self.driver.inject_transport(current, TransportEvent::Closed {
                    code: chatsync_proto::close::NORMAL,
                    reason: "server shutdown".into(),
                });
            },
            ChaosStep::StaleEvent => {
                self.driver.inject_transport(
                    chatsync_core::Generation::ZERO,
                    TransportEvent::Message(message_frame(&test_message(0, 1))),
                );
            },
            ChaosStep::Advance(ms) => return self.advance(Duration::from_millis(*ms)),
            ChaosStep::ConnectBehavior(behavior) => self.driver.set_connect_behavior(*behavior),
            ChaosStep::RestOutage(failing) => self.driver.set_rest_failing(*failing),
        }

        self.settle()
    }

    fn check(&mut self, context: &str) {
        self.steps += 1;
        let snapshot = self.snapshot();
        self.registry.assert_all(
            self.last.as_ref(),
            &snapshot,
            &format!("after {context} #{}", self.steps),
        );
        self.last = Some(snapshot);
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(Some("token"))
    }
}
