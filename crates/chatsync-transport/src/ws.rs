//! WebSocket transport.
//!
//! Each connect attempt runs in its own task, owns its socket, and reports
//! everything that happens to it as [`TransportEvent`]s tagged with its
//! [`Generation`]. The task always ends with exactly one `Closed` or
//! `Faulted` event unless it is aborted or its handle is dropped.
//!
//! A requested close keeps the task alive until the peer acknowledges the
//! close frame or [`CLOSE_TIMEOUT`] passes, so the session sees the close
//! complete.

use std::time::Duration;

use chatsync_core::{Generation, TransportEvent};
use chatsync_proto::close;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{
    self,
    protocol::{CloseFrame, frame::coding::CloseCode},
};
use url::Url;

use crate::TransportError;

/// How long a requested close waits for the peer's close frame.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound queue depth per connection.
const OUTBOUND_CAPACITY: usize = 32;

/// Instruction for a connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send a text frame.
    Text(String),
    /// Start the close handshake.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Handle to a connection task.
#[derive(Debug)]
pub struct Connection {
    generation: Generation,
    outbound: mpsc::Sender<Outbound>,
    abort_handle: tokio::task::AbortHandle,
}

impl Connection {
    /// Spawn a connection task for `url`.
    ///
    /// Events are sent on `events` tagged with `generation`.
    pub fn spawn(
        generation: Generation,
        url: Url,
        events: mpsc::Sender<(Generation, TransportEvent)>,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let handle = tokio::spawn(run_connection(generation, url, outbound_rx, events));

        Self { generation, outbound, abort_handle: handle.abort_handle() }
    }

    /// Generation this connection reports under.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Queue a text frame.
    ///
    /// # Errors
    ///
    /// - `TransportError::Closed` if the task has ended
    pub async fn send(&self, payload: String) -> Result<(), TransportError> {
        self.outbound.send(Outbound::Text(payload)).await.map_err(|_| TransportError::Closed)
    }

    /// Start the close handshake. The task reports `Closed` when it
    /// completes.
    ///
    /// # Errors
    ///
    /// - `TransportError::Closed` if the task has ended or its queue is full
    pub fn close(&self, code: u16, reason: &str) -> Result<(), TransportError> {
        self.outbound
            .try_send(Outbound::Close { code, reason: reason.to_string() })
            .map_err(|_| TransportError::Closed)
    }

    /// Drop the connection without a close handshake. No further events are
    /// reported.
    pub fn abort(&self) {
        self.abort_handle.abort();
    }
}

async fn run_connection(
    generation: Generation,
    url: Url,
    mut outbound: mpsc::Receiver<Outbound>,
    events: mpsc::Sender<(Generation, TransportEvent)>,
) {
    let emit = |event: TransportEvent| {
        let events = events.clone();
        async move {
            if events.send((generation, event)).await.is_err() {
                tracing::trace!(%generation, "event receiver gone");
            }
        }
    };

    tracing::debug!(%generation, host = ?url.host_str(), path = url.path(), "connecting");

    let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            emit(TransportEvent::Faulted(e.to_string())).await;
            return;
        },
    };

    emit(TransportEvent::Opened).await;

    let (mut write, mut read) = stream.split();
    let mut closing: Option<(u16, String)> = None;
    let close_timer = tokio::time::sleep(Duration::MAX);
    tokio::pin!(close_timer);

    loop {
        tokio::select! {
            command = outbound.recv(), if closing.is_none() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(tungstenite::Message::Text(text.into())).await {
                        emit(TransportEvent::Faulted(e.to_string())).await;
                        return;
                    }
                },
                Some(Outbound::Close { code, reason }) => {
                    let frame = CloseFrame { code: CloseCode::from(code), reason: reason.clone().into() };
                    if write.send(tungstenite::Message::Close(Some(frame))).await.is_err() {
                        emit(TransportEvent::Closed { code, reason }).await;
                        return;
                    }
                    close_timer.as_mut().reset(tokio::time::Instant::now() + CLOSE_TIMEOUT);
                    closing = Some((code, reason));
                },
                None => {
                    tracing::debug!(%generation, "connection handle dropped");
                    let _ = write.close().await;
                    return;
                },
            },

            message = read.next() => match message {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    emit(TransportEvent::Message(text.to_string())).await;
                },
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.to_string()))
                        .unwrap_or((close::NO_STATUS, String::new()));
                    emit(TransportEvent::Closed { code, reason }).await;
                    return;
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    match closing.take() {
                        Some((code, reason)) => emit(TransportEvent::Closed { code, reason }).await,
                        None => emit(TransportEvent::Faulted(e.to_string())).await,
                    }
                    return;
                },
                None => {
                    let (code, reason) = closing
                        .take()
                        .unwrap_or((close::ABNORMAL, "stream ended".to_string()));
                    emit(TransportEvent::Closed { code, reason }).await;
                    return;
                },
            },

            () = &mut close_timer, if closing.is_some() => {
                tracing::debug!(%generation, "close handshake timed out");
                let (code, reason) = closing.take().unwrap_or((close::NORMAL, String::new()));
                emit(TransportEvent::Closed { code, reason }).await;
                return;
            },
        }
    }
}
