//! Terminal driver for the line client.
//!
//! Implements the [`Driver`] trait over stdin lines, stdout, one WebSocket
//! task per connection generation, and the REST client.

use std::{
    collections::HashMap,
    io::{self, Write},
};

use chatsync_app::{Command, Coordinator, CoordinatorEvent, Driver};
use chatsync_core::{Environment, Generation, TransportEvent};
use chatsync_proto::{CreateRoomRequest, HistoryPage, Room, RoomId, close};
use chatsync_transport::{Connection, Endpoint, RestClient, RestError, SystemEnv, TransportError};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::mpsc,
};

use crate::{
    input::{self, HELP, Input},
    render::Renderer,
};

/// Transport events buffered between the connection tasks and the loop.
const EVENT_CAPACITY: usize = 256;

fn print(text: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{text}")?;
    out.flush()
}

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// I/O error from stdin or stdout.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// REST call failed.
    #[error("{0}")]
    Rest(#[from] RestError),
}

/// Terminal driver implementing the [`Driver`] trait.
pub struct TerminalDriver {
    env: SystemEnv,
    endpoint: Endpoint,
    rest: RestClient,
    connections: HashMap<Generation, Connection>,
    events_tx: mpsc::Sender<(Generation, TransportEvent)>,
    events_rx: mpsc::Receiver<(Generation, TransportEvent)>,
    lines: Lines<BufReader<Stdin>>,
    input_closed: bool,
    renderer: Renderer,
    /// Active room as of the last render, for `/leave` without an argument.
    active: Option<RoomId>,
}

impl TerminalDriver {
    /// Create a driver for the server at `endpoint`.
    pub fn new(endpoint: Endpoint, token: Option<String>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);

        Self {
            env: SystemEnv::new(),
            rest: RestClient::new(endpoint.clone(), token),
            endpoint,
            connections: HashMap::new(),
            events_tx,
            events_rx,
            lines: BufReader::new(tokio::io::stdin()).lines(),
            input_closed: false,
            renderer: Renderer::new(),
            active: None,
        }
    }

    /// Turn a stdin line into an event. `None` if the line was handled
    /// locally.
    fn line(&self, line: &str) -> Result<Option<CoordinatorEvent>, TerminalError> {
        match input::parse(line, self.active) {
            Ok(Some(Input::Command(command))) => Ok(Some(command.into())),
            Ok(Some(Input::Help)) => {
                print(HELP)?;
                Ok(None)
            },
            Ok(None) => Ok(None),
            Err(e) => {
                print(&format!("! {e}"))?;
                Ok(None)
            },
        }
    }
}

impl Driver for TerminalDriver {
    type Error = TerminalError;
    type Instant = std::time::Instant;

    async fn poll_event(
        &mut self,
        deadline: Option<Self::Instant>,
    ) -> Result<Option<CoordinatorEvent>, Self::Error> {
        let env = self.env;

        loop {
            let timer = async move {
                match deadline {
                    Some(deadline) => env.sleep(env.until(deadline)).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                Some((generation, event)) = self.events_rx.recv() => {
                    if matches!(event, TransportEvent::Closed { .. } | TransportEvent::Faulted(_)) {
                        self.connections.remove(&generation);
                    }
                    return Ok(Some(CoordinatorEvent::Transport { generation, event }));
                }

                line = self.lines.next_line(), if !self.input_closed => {
                    match line? {
                        Some(line) => {
                            if let Some(event) = self.line(&line)? {
                                return Ok(Some(event));
                            }
                        },
                        None => {
                            self.input_closed = true;
                            return Ok(Some(Command::Quit.into()));
                        },
                    }
                }

                () = timer => return Ok(None),
            }
        }
    }

    fn connect(&mut self, generation: Generation, room_id: RoomId, token: &str) {
        let url = self.endpoint.transport_url(room_id, token);
        let connection = Connection::spawn(generation, url, self.events_tx.clone());
        self.connections.insert(generation, connection);
    }

    async fn transmit(&mut self, generation: Generation, payload: String) -> Result<(), Self::Error> {
        let connection = self
            .connections
            .get(&generation)
            .ok_or(TransportError::UnknownConnection(generation.get()))?;
        connection.send(payload).await?;
        Ok(())
    }

    fn disconnect(&mut self, generation: Generation, code: u16, reason: &str) {
        let Some(connection) = self.connections.get(&generation) else {
            return;
        };

        if code == close::ABNORMAL {
            connection.abort();
            self.connections.remove(&generation);
            return;
        }

        if let Err(e) = connection.close(code, reason) {
            tracing::debug!(%generation, error = %e, "close handshake unavailable, aborting");
            connection.abort();
            self.connections.remove(&generation);

            // The task is gone and will not report the close itself.
            let closed = TransportEvent::Closed { code, reason: reason.to_string() };
            if self.events_tx.try_send((generation, closed)).is_err() {
                tracing::warn!(%generation, "event queue full, close not reported");
            }
        }
    }

    async fn fetch_history(
        &mut self,
        room_id: RoomId,
        limit: u32,
        offset: u32,
    ) -> Result<HistoryPage, Self::Error> {
        Ok(self.rest.history(room_id, limit, offset).await?)
    }

    async fn fetch_rooms(&mut self) -> Result<Vec<Room>, Self::Error> {
        Ok(self.rest.list_rooms().await?)
    }

    async fn create_room(&mut self, request: CreateRoomRequest) -> Result<Room, Self::Error> {
        Ok(self.rest.create_room(&request).await?)
    }

    async fn join_room(&mut self, room_id: RoomId) -> Result<(), Self::Error> {
        Ok(self.rest.join_room(room_id).await?)
    }

    async fn leave_room(&mut self, room_id: RoomId) -> Result<(), Self::Error> {
        Ok(self.rest.leave_room(room_id).await?)
    }

    fn now(&self) -> Self::Instant {
        self.env.now()
    }

    fn render(&mut self, coordinator: &Coordinator<Self::Instant>) -> Result<(), Self::Error> {
        self.active = coordinator.active_room();
        let mut out = io::stdout().lock();
        self.renderer.render(coordinator, &mut out)?;
        Ok(())
    }

    fn stop(&mut self) {
        for (generation, connection) in self.connections.drain() {
            tracing::debug!(%generation, "dropping connection on stop");
            connection.abort();
        }
    }
}
