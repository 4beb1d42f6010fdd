//! Room manager: allocates room codes, tracks rooms, and routes seats.

use std::collections::HashMap;
use std::sync::Arc;

use battlequiz_pool::QuestionCatalog;
use battlequiz_protocol::{ClientMessage, RoomCode, RoomSnapshot, SeatId, SettingsRequest};
use rand::Rng;

use crate::room::spawn_room;
use crate::{merge_settings, EngineConfig, RoomError, RoomHandle, SeatSender};

/// Manages all active rooms and tracks which seat is in which room.
///
/// This is the entry point for room operations from the connection
/// handlers.
pub struct RoomManager {
    /// Active rooms, keyed by room code.
    rooms: HashMap<RoomCode, RoomHandle>,

    /// Maps each seat to the room it sits in.
    /// A seat can be in at most ONE room at a time.
    seat_rooms: HashMap<SeatId, RoomCode>,

    engine: EngineConfig,
    catalog: Arc<QuestionCatalog>,
}

impl RoomManager {
    /// Creates a new, empty room manager.
    pub fn new(engine: EngineConfig, catalog: Arc<QuestionCatalog>) -> Self {
        Self {
            rooms: HashMap::new(),
            seat_rooms: HashMap::new(),
            engine: engine.validated(),
            catalog,
        }
    }

    /// Creates a room with `seat` as host and returns its code.
    ///
    /// The host gets `RoomCreated` on `sender` before any other room
    /// message.
    pub fn create_room(
        &mut self,
        seat: SeatId,
        name: &str,
        request: &SettingsRequest,
        sender: SeatSender,
    ) -> Result<RoomCode, RoomError> {
        if let Some(current) = self.seat_rooms.get(&seat) {
            return Err(RoomError::AlreadySeated(seat, current.clone()));
        }

        let settings = merge_settings(request);
        let code = self.allocate_code();
        let max_players = settings.max_players;
        let handle = spawn_room(
            code.clone(),
            seat,
            name,
            sender,
            settings,
            &self.engine,
            Arc::clone(&self.catalog),
        );
        self.rooms.insert(code.clone(), handle);
        self.seat_rooms.insert(seat, code.clone());
        tracing::info!(room_id = %code, host = %seat, max_players, "room created");
        Ok(code)
    }

    /// Picks a random code not used by any live room.
    fn allocate_code(&self) -> RoomCode {
        let alphabet = self.engine.code_alphabet.as_bytes();
        let mut rng = rand::rng();
        loop {
            let code: String = (0..self.engine.code_length)
                .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
                .collect();
            let code = RoomCode(code);
            if !self.rooms.contains_key(&code) {
                return code;
            }
            tracing::debug!(room_id = %code, "room code collision, retrying");
        }
    }

    /// Seats `seat` in an existing room.
    ///
    /// Enforces the "one room at a time" invariant.
    pub async fn join_room(
        &mut self,
        seat: SeatId,
        code: &RoomCode,
        name: String,
        sender: SeatSender,
    ) -> Result<(), RoomError> {
        let handle = self.handle_for_join(seat, code)?;
        handle.join(seat, name, sender).await?;
        self.record_join(seat, code)
    }

    /// First half of a join: checks the seat is free and returns a handle
    /// to the room, so the caller can await the room without holding the
    /// manager. Finish with [`record_join`](Self::record_join).
    pub fn handle_for_join(&self, seat: SeatId, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        if let Some(current) = self.seat_rooms.get(&seat) {
            return Err(RoomError::AlreadySeated(seat, current.clone()));
        }
        self.rooms
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))
    }

    /// Indexes a seat the room has accepted.
    pub fn record_join(&mut self, seat: SeatId, code: &RoomCode) -> Result<(), RoomError> {
        if !self.rooms.contains_key(code) {
            return Err(RoomError::RoomNotFound(code.clone()));
        }
        self.seat_rooms.insert(seat, code.clone());
        Ok(())
    }

    /// Routes a client message to the room it names, on behalf of `seat`.
    pub async fn route_message(
        &self,
        seat: SeatId,
        code: &RoomCode,
        msg: ClientMessage,
    ) -> Result<(), RoomError> {
        self.handle_for_seat(seat, code)?.send_message(seat, msg).await
    }

    /// Returns a handle to `code` if `seat` sits there.
    pub fn handle_for_seat(&self, seat: SeatId, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        let handle = self
            .rooms
            .get(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;

        if self.seat_rooms.get(&seat) != Some(code) {
            return Err(RoomError::NotSeated(seat, code.clone()));
        }
        Ok(handle.clone())
    }

    /// Removes `seat` from its room, destroying the room if it was the
    /// last one there. A seat that is not in any room is ignored.
    pub async fn leave(&mut self, seat: SeatId) -> Result<(), RoomError> {
        let Some(code) = self.seat_rooms.remove(&seat) else {
            return Ok(());
        };
        let Some(handle) = self.rooms.get(&code) else {
            return Ok(());
        };

        let remaining = handle.leave(seat).await?;
        if remaining == 0 {
            self.destroy_room(&code).await?;
        }
        Ok(())
    }

    /// Returns the current snapshot of a room.
    pub async fn room_snapshot(&self, code: &RoomCode) -> Result<RoomSnapshot, RoomError> {
        let handle = self
            .rooms
            .get(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        handle.snapshot().await
    }

    /// Shuts down a room and removes all its seats from the index.
    pub async fn destroy_room(&mut self, code: &RoomCode) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;

        let _ = handle.shutdown().await;
        self.seat_rooms.retain(|_, c| c != code);

        tracing::info!(room_id = %code, "room destroyed");
        Ok(())
    }

    /// Returns the room a seat is currently in, if any.
    pub fn seat_room(&self, seat: SeatId) -> Option<&RoomCode> {
        self.seat_rooms.get(&seat)
    }

    /// Returns the number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Lists all active room codes.
    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }
}
