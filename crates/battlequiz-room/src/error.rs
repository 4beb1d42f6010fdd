//! Error types for the room layer.

use battlequiz_protocol::{QuestionId, RoomCode, SeatId};

/// Errors that can occur during room operations.
///
/// Everything except [`RoomError::StaleAnswer`] is shown to the client
/// that caused it, using the `Display` text.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this code exists.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    /// Every seat is taken.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// HP configuration, replay start, or abort from a seat that is not
    /// the host.
    #[error("only the host can do that")]
    NotHost,

    /// Answer for the wrong question, after the window closed, twice, or
    /// from an eliminated seat. Logged, never sent.
    #[error("stale answer from {seat} for question {question_id}")]
    StaleAnswer { seat: SeatId, question_id: QuestionId },

    /// The room has started and no longer takes seats.
    #[error("room {0} is no longer accepting players")]
    Closed(RoomCode),

    /// A connection may only hold one seat at a time.
    #[error("{0} is already seated in room {1}")]
    AlreadySeated(SeatId, RoomCode),

    /// The seat sent a room message for a room it does not sit in.
    #[error("{0} is not seated in room {1}")]
    NotSeated(SeatId, RoomCode),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}
