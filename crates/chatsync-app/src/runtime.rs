//! Generic runtime for application orchestration.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`Coordinator`]: room, session and store state machine
//! - [`Driver`]: platform-specific I/O

use std::collections::VecDeque;

use crate::{Command, Coordinator, CoordinatorAction, CoordinatorEvent, Driver};

/// Generic runtime that orchestrates a Coordinator over a Driver.
pub struct Runtime<D: Driver> {
    driver: D,
    coordinator: Coordinator<D::Instant>,
}

impl<D: Driver> Runtime<D> {
    /// Create a runtime.
    pub fn new(driver: D, coordinator: Coordinator<D::Instant>) -> Self {
        Self { driver, coordinator }
    }

    /// Run the main event loop until a quit command.
    ///
    /// Loads the room list, applies `initial` commands, then repeatedly:
    /// 1. Waits for the next driver event or the next reconnect deadline
    /// 2. Feeds the event to the coordinator
    /// 3. Executes the resulting actions, feeding REST completions back in
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to poll or render. Transport and
    /// REST failures are not errors; they are reported to the coordinator.
    pub async fn run(mut self, initial: Vec<Command>) -> Result<(), D::Error> {
        self.driver.render(&self.coordinator)?;

        let mut quit = self.start(initial).await?;
        while !quit {
            quit = self.step().await?;
        }

        self.driver.stop();
        Ok(())
    }

    /// Load the room list and apply `commands`.
    ///
    /// Returns `true` if one of them quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to render.
    pub async fn start(&mut self, commands: Vec<Command>) -> Result<bool, D::Error> {
        let actions = self.coordinator.refresh_rooms();
        let mut quit = self.execute(actions).await?;

        for command in commands {
            if quit {
                break;
            }
            quit = self.dispatch(CoordinatorEvent::Command(command)).await?;
        }

        Ok(quit)
    }

    /// Process one cycle of the event loop.
    ///
    /// Returns `true` if the application should quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to poll or render.
    pub async fn step(&mut self) -> Result<bool, D::Error> {
        let deadline = self.coordinator.next_deadline();
        let event = self.driver.poll_event(deadline).await?;

        if let Some(event) = event
            && self.dispatch(event).await?
        {
            return Ok(true);
        }

        self.dispatch(CoordinatorEvent::Tick).await
    }

    /// Feed one event to the coordinator and execute the result.
    ///
    /// Returns `true` if the application should quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to render.
    pub async fn dispatch(&mut self, event: CoordinatorEvent) -> Result<bool, D::Error> {
        let now = self.driver.now();
        let actions = self.coordinator.handle(event, now);
        self.execute(actions).await
    }

    /// Execute actions until none are left. Renders at most once.
    async fn execute(&mut self, actions: Vec<CoordinatorAction>) -> Result<bool, D::Error> {
        let mut pending = VecDeque::from(actions);
        let mut quit = false;
        let mut render = false;

        while let Some(action) = pending.pop_front() {
            let completion = match action {
                CoordinatorAction::Render => {
                    render = true;
                    None
                },
                CoordinatorAction::Quit => {
                    quit = true;
                    None
                },
                CoordinatorAction::Connect { generation, room_id, token } => {
                    tracing::debug!(%generation, room_id, "connecting");
                    self.driver.connect(generation, room_id, &token);
                    None
                },
                CoordinatorAction::Transmit { generation, payload } => {
                    if let Err(e) = self.driver.transmit(generation, payload).await {
                        tracing::warn!(%generation, error = %e, "transmit failed");
                    }
                    None
                },
                CoordinatorAction::Disconnect { generation, code, reason } => {
                    tracing::debug!(%generation, code, %reason, "disconnecting");
                    self.driver.disconnect(generation, code, &reason);
                    None
                },
                CoordinatorAction::FetchHistory { room_id, limit, offset } => {
                    let result = self.driver.fetch_history(room_id, limit, offset).await;
                    Some(CoordinatorEvent::HistoryLoaded { room_id, result: result.map_err(describe) })
                },
                CoordinatorAction::FetchRooms => {
                    let result = self.driver.fetch_rooms().await;
                    Some(CoordinatorEvent::RoomsLoaded(result.map_err(describe)))
                },
                CoordinatorAction::CreateRoom(request) => {
                    let result = self.driver.create_room(request).await;
                    Some(CoordinatorEvent::RoomCreated(result.map_err(describe)))
                },
                CoordinatorAction::JoinRoom { room_id } => {
                    let result = self.driver.join_room(room_id).await;
                    Some(CoordinatorEvent::RoomJoined { room_id, result: result.map_err(describe) })
                },
                CoordinatorAction::LeaveRoom { room_id } => {
                    let result = self.driver.leave_room(room_id).await;
                    Some(CoordinatorEvent::RoomLeft { room_id, result: result.map_err(describe) })
                },
            };

            if let Some(event) = completion {
                let now = self.driver.now();
                pending.extend(self.coordinator.handle(event, now));
            }
        }

        if render {
            self.driver.render(&self.coordinator)?;
        }

        Ok(quit)
    }

    /// Get a reference to the Coordinator.
    pub fn coordinator(&self) -> &Coordinator<D::Instant> {
        &self.coordinator
    }

    /// Get a mutable reference to the Coordinator.
    pub fn coordinator_mut(&mut self) -> &mut Coordinator<D::Instant> {
        &mut self.coordinator
    }

    /// Get a reference to the Driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the Driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

fn describe<E: std::error::Error>(error: E) -> String {
    error.to_string()
}
