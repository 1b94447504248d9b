//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the runtime from specific I/O
//! implementations. The production driver speaks WebSocket and HTTP; the
//! simulation driver scripts both against a virtual clock. The generic
//! [`crate::Runtime`] handles all orchestration.

use std::future::Future;

use chatsync_core::{Generation, Instant};
use chatsync_proto::{CreateRoomRequest, HistoryPage, Room, RoomId};

use crate::{Coordinator, CoordinatorEvent};

/// Abstracts I/O operations for the runtime.
///
/// Transport connections are fire-and-forget: [`Driver::connect`] starts a
/// connection and everything that happens to it afterwards is reported as
/// [`CoordinatorEvent::Transport`] from [`Driver::poll_event`], tagged with
/// the generation it was started with. REST calls are awaited directly.
///
/// # Associated Types
///
/// - [`Error`](Driver::Error): Platform-specific error type
/// - [`Instant`](Driver::Instant): Time representation (real or virtual)
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Instant;

    /// Wait for the next input event.
    ///
    /// Returns `None` once `deadline` passes with nothing to report, or
    /// immediately if nothing is pending and no deadline is set in a driver
    /// that cannot block.
    ///
    /// # Errors
    ///
    /// Returns an error if the input source fails.
    fn poll_event(
        &mut self,
        deadline: Option<Self::Instant>,
    ) -> impl Future<Output = Result<Option<CoordinatorEvent>, Self::Error>> + Send;

    /// Start a transport connection to `room_id`.
    fn connect(&mut self, generation: Generation, room_id: RoomId, token: &str);

    /// Write a frame on the connection tagged `generation`.
    ///
    /// # Errors
    ///
    /// Returns an error if that connection is gone.
    fn transmit(
        &mut self,
        generation: Generation,
        payload: String,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close the connection tagged `generation`.
    ///
    /// [`chatsync_proto::close::ABNORMAL`] means the connection already
    /// failed and is dropped without a close handshake.
    fn disconnect(&mut self, generation: Generation, code: u16, reason: &str);

    /// Load a page of history for a room.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn fetch_history(
        &mut self,
        room_id: RoomId,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<HistoryPage, Self::Error>> + Send;

    /// Load the room list.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn fetch_rooms(&mut self) -> impl Future<Output = Result<Vec<Room>, Self::Error>> + Send;

    /// Create a room.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn create_room(
        &mut self,
        request: CreateRoomRequest,
    ) -> impl Future<Output = Result<Room, Self::Error>> + Send;

    /// Join a room.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn join_room(&mut self, room_id: RoomId) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Leave a room.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn leave_room(&mut self, room_id: RoomId)
    -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the read model.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, coordinator: &Coordinator<Self::Instant>) -> Result<(), Self::Error>;

    /// Close every connection and release resources.
    fn stop(&mut self);
}
