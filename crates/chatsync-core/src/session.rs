//! Transport session state machine.
//!
//! Owns the lifecycle of exactly one live transport connection, bound to a
//! `(room_id, token)` pair. Uses the action pattern: methods take time as
//! input and return [`SessionAction`]s for the driver to execute.
//!
//! # State Machine
//!
//! ```text
//!             open                 Opened
//! ┌──────┐ ─────────> ┌────────────┐ ───────> ┌──────┐
//! │ Idle │            │ Connecting │          │ Open │
//! └──────┘ <───┐      └────────────┘          └──────┘
//!     ^        │        │        ^               │  │
//!     │ Closed │  fault │        │ timer         │  │ close()
//!     │        │        v        │               │  v
//! ┌─────────┐  │  ┌──────────────┐  abnormal     │ ┌─────────┐
//! │ Failed  │  │  │ Reconnecting │ <─────────────┘ │ Closing │
//! └─────────┘  │  └──────────────┘                 └─────────┘
//!              └────────────────────────────────────────┘
//! ```
//!
//! Every connect attempt gets a fresh [`Generation`]. Transport events carry
//! the generation of the connection that produced them; events from any
//! other generation are discarded, so a late callback from a superseded
//! connection can never touch the state of a newer one.

use std::{fmt, time::Duration};

use chatsync_proto::{RoomId, close};

use crate::{
    backoff::{ReconnectTimer, SessionConfig},
    dispatch::{CloseKind, classify_close},
    env::Instant,
    error::{ConnectionFault, SendRejected},
};

/// Tag distinguishing successive connect attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Generation before any connect attempt.
    pub const ZERO: Self = Self(0);

    /// Following generation.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// No connection and none pending.
    Idle,
    /// Connect in flight.
    Connecting,
    /// Connection established. Sends are accepted.
    Open,
    /// Intentional close in flight.
    Closing,
    /// Connection lost, reconnect timer pending.
    Reconnecting,
    /// Reconnects exhausted. Only a new `open` retries.
    Failed,
}

impl SessionStatus {
    /// Returns true if a transport connection may exist in this status.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Closing)
    }

    /// Returns true if `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionStatus::{Closing, Connecting, Failed, Idle, Open, Reconnecting};

        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Open | Reconnecting | Failed | Closing | Idle)
                | (Open, Closing | Reconnecting | Failed | Idle)
                | (Closing | Failed, Idle)
                | (Reconnecting, Connecting | Idle)
        )
    }
}

/// Observable connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    /// Current status.
    pub status: SessionStatus,
    /// Reconnects scheduled since the last successful open.
    pub reconnect_attempt: u32,
    /// Most recent fault, cleared on a successful open.
    pub last_error: Option<ConnectionFault>,
}

/// Event reported by the transport for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established.
    Opened,
    /// Text frame received.
    Message(String),
    /// Connection closed with the given code.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Transport error. Treated as the end of the connection.
    Faulted(String),
}

/// Actions returned by the session for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a transport connection and tag all of its events with
    /// `generation`.
    Connect {
        /// Generation of the new connection.
        generation: Generation,
        /// Room to connect to.
        room_id: RoomId,
        /// Bearer credential.
        token: String,
    },

    /// Write a text frame on the connection.
    Transmit {
        /// Generation of the connection to write on.
        generation: Generation,
        /// Frame text.
        payload: String,
    },

    /// Close the connection.
    ///
    /// [`close::ABNORMAL`] means the connection already failed: tear it down
    /// without a close handshake.
    Disconnect {
        /// Generation of the connection to close.
        generation: Generation,
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },

    /// Inbound frame for the dispatcher.
    Deliver {
        /// Generation the frame arrived on.
        generation: Generation,
        /// Frame text.
        payload: String,
    },

    /// Status changed.
    StatusChanged {
        /// Previous status.
        from: SessionStatus,
        /// New status.
        to: SessionStatus,
    },

    /// Reconnect scheduled.
    ReconnectScheduled {
        /// One-based attempt number.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },

    /// Pending reconnect cancelled.
    ReconnectCancelled {
        /// Attempt that will no longer happen.
        attempt: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    room_id: RoomId,
    token: String,
}

/// Transport session state machine.
///
/// Pure state machine: no I/O, no stored clock. Generic over the instant type
/// so tests can drive it with virtual time.
#[derive(Debug, Clone)]
pub struct Session<I> {
    config: SessionConfig,
    status: SessionStatus,
    generation: Generation,
    binding: Option<Binding>,
    attempt: u32,
    last_error: Option<ConnectionFault>,
    timer: Option<ReconnectTimer<I>>,
}

impl<I: Instant> Session<I> {
    /// Create an idle session.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            status: SessionStatus::Idle,
            generation: Generation::ZERO,
            binding: None,
            attempt: 0,
            last_error: None,
            timer: None,
        }
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Returns true if sends are currently accepted.
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// Generation of the current (or most recent) connect attempt.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Room the session is bound to. `None` when idle.
    pub fn room_id(&self) -> Option<RoomId> {
        self.binding.as_ref().map(|b| b.room_id)
    }

    /// Snapshot of status, attempt counter and last fault.
    pub fn state(&self) -> ConnectionState {
        ConnectionState {
            status: self.status,
            reconnect_attempt: self.attempt,
            last_error: self.last_error.clone(),
        }
    }

    /// Pending reconnect, if any.
    pub fn pending_reconnect(&self) -> Option<&ReconnectTimer<I>> {
        self.timer.as_ref()
    }

    /// When [`Session::tick`] next needs to run. `None` if nothing is pending.
    pub fn next_deadline(&self) -> Option<I> {
        self.timer.map(|t| t.deadline)
    }

    /// Start a connection for `room_id` authenticated by `token`.
    ///
    /// A no-op when either is absent. Any existing connection or pending
    /// reconnect is closed first with manual-close semantics, so at most one
    /// connection is ever live.
    pub fn open(&mut self, room_id: Option<RoomId>, token: Option<&str>) -> Vec<SessionAction> {
        let (Some(room_id), Some(token)) = (room_id, token.filter(|t| !t.is_empty())) else {
            tracing::debug!(?room_id, "open ignored: room or token missing");
            return Vec::new();
        };

        let mut actions = self.release("superseded");
        self.attempt = 0;
        self.last_error = None;
        self.binding = Some(Binding { room_id, token: token.to_string() });
        self.connect(&mut actions);
        actions
    }

    /// Intentionally close the session.
    ///
    /// Cancels any pending reconnect and suppresses automatic reconnection.
    /// A live connection moves to `Closing` until the transport confirms the
    /// close; anything else goes straight to `Idle`.
    pub fn close(&mut self, reason: &str) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        self.cancel_reconnect(&mut actions);

        match self.status {
            SessionStatus::Connecting | SessionStatus::Open => {
                actions.push(SessionAction::Disconnect {
                    generation: self.generation,
                    code: close::NORMAL,
                    reason: reason.to_string(),
                });
                self.transition(SessionStatus::Closing, &mut actions);
            },
            SessionStatus::Reconnecting | SessionStatus::Failed => {
                self.go_idle(&mut actions);
            },
            SessionStatus::Closing | SessionStatus::Idle => {},
        }

        actions
    }

    /// Hand a frame to the transport.
    ///
    /// # Errors
    ///
    /// - `SendRejected` if the session is not `Open`. Nothing is queued.
    pub fn send(&mut self, payload: String) -> Result<SessionAction, SendRejected> {
        if self.status != SessionStatus::Open {
            return Err(SendRejected { status: self.status });
        }

        Ok(SessionAction::Transmit { generation: self.generation, payload })
    }

    /// Process an event reported by the transport.
    ///
    /// Events from any generation but the current one, or arriving when no
    /// connection should be live, are discarded.
    pub fn handle(
        &mut self,
        generation: Generation,
        event: TransportEvent,
        now: I,
    ) -> Vec<SessionAction> {
        if generation != self.generation || !self.status.is_live() {
            tracing::trace!(
                %generation,
                current = %self.generation,
                status = ?self.status,
                "discarding stale transport event"
            );
            return Vec::new();
        }

        let mut actions = Vec::new();

        match (self.status, event) {
            (SessionStatus::Connecting, TransportEvent::Opened) => {
                self.attempt = 0;
                self.last_error = None;
                self.transition(SessionStatus::Open, &mut actions);
            },
            (_, TransportEvent::Opened) => {},

            (SessionStatus::Open, TransportEvent::Message(payload)) => {
                actions.push(SessionAction::Deliver { generation, payload });
            },
            (_, TransportEvent::Message(_)) => {
                tracing::debug!(status = ?self.status, "dropping frame received while not open");
            },

            (SessionStatus::Closing, TransportEvent::Closed { .. } | TransportEvent::Faulted(_)) => {
                self.go_idle(&mut actions);
            },

            (status, TransportEvent::Closed { code, reason }) => match classify_close(code) {
                CloseKind::Manual => {
                    tracing::debug!(code, %reason, "peer closed connection");
                    self.go_idle(&mut actions);
                },
                CloseKind::Abnormal => {
                    self.last_error = Some(if status == SessionStatus::Connecting {
                        ConnectionFault::Connect(reason)
                    } else {
                        ConnectionFault::AbnormalClose { code, reason }
                    });
                    self.schedule_reconnect(now, &mut actions);
                },
            },

            (status, TransportEvent::Faulted(error)) => {
                actions.push(SessionAction::Disconnect {
                    generation,
                    code: close::ABNORMAL,
                    reason: error.clone(),
                });
                self.last_error = Some(if status == SessionStatus::Connecting {
                    ConnectionFault::Connect(error)
                } else {
                    ConnectionFault::AbnormalClose { code: close::ABNORMAL, reason: error }
                });
                self.schedule_reconnect(now, &mut actions);
            },
        }

        actions
    }

    /// Fire the pending reconnect if it is due.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        let due = self.timer.is_some_and(|t| t.is_due(now));
        if due && self.status == SessionStatus::Reconnecting {
            if let Some(timer) = self.timer.take() {
                tracing::info!(attempt = timer.attempt, "reconnecting");
            }
            self.connect(&mut actions);
        }

        actions
    }

    /// Close whatever is live and drop the pending reconnect, ending in
    /// `Idle`. Used before starting a fresh connection.
    fn release(&mut self, reason: &str) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        self.cancel_reconnect(&mut actions);

        if matches!(self.status, SessionStatus::Connecting | SessionStatus::Open) {
            actions.push(SessionAction::Disconnect {
                generation: self.generation,
                code: close::NORMAL,
                reason: reason.to_string(),
            });
        }

        if self.status != SessionStatus::Idle {
            self.transition(SessionStatus::Idle, &mut actions);
        }

        actions
    }

    fn connect(&mut self, actions: &mut Vec<SessionAction>) {
        let Some(binding) = self.binding.clone() else {
            return;
        };

        self.generation = self.generation.next();
        self.transition(SessionStatus::Connecting, actions);
        actions.push(SessionAction::Connect {
            generation: self.generation,
            room_id: binding.room_id,
            token: binding.token,
        });
    }

    fn schedule_reconnect(&mut self, now: I, actions: &mut Vec<SessionAction>) {
        if self.attempt >= self.config.max_attempts {
            tracing::warn!(attempts = self.attempt, room_id = ?self.room_id(), "reconnects exhausted");
            self.last_error = Some(ConnectionFault::ReconnectExhausted { attempts: self.attempt });
            self.transition(SessionStatus::Failed, actions);
            return;
        }

        let delay = self.config.delay_for(self.attempt);
        self.attempt += 1;
        self.timer = Some(ReconnectTimer {
            generation: self.generation,
            attempt: self.attempt,
            delay,
            deadline: now + delay,
        });

        tracing::warn!(
            attempt = self.attempt,
            delay_ms = delay.as_millis() as u64,
            error = ?self.last_error,
            "connection lost, scheduling reconnect"
        );

        self.transition(SessionStatus::Reconnecting, actions);
        actions.push(SessionAction::ReconnectScheduled { attempt: self.attempt, delay });
    }

    fn cancel_reconnect(&mut self, actions: &mut Vec<SessionAction>) {
        if let Some(timer) = self.timer.take() {
            tracing::debug!(attempt = timer.attempt, "reconnect cancelled");
            actions.push(SessionAction::ReconnectCancelled { attempt: timer.attempt });
        }
    }

    fn go_idle(&mut self, actions: &mut Vec<SessionAction>) {
        self.binding = None;
        self.transition(SessionStatus::Idle, actions);
    }

    fn transition(&mut self, to: SessionStatus, actions: &mut Vec<SessionAction>) {
        let from = self.status;
        debug_assert!(from.can_transition_to(to), "illegal transition {from:?} -> {to:?}");

        tracing::debug!(?from, ?to, generation = %self.generation, "session status");
        self.status = to;
        actions.push(SessionAction::StatusChanged { from, to });
    }
}
