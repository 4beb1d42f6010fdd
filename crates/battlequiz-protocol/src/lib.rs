//! Wire protocol for BattleQuiz.
//!
//! This crate defines the "language" that quiz clients and the battle
//! server speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`SeatId`],
//!   [`RoomCode`], snapshots) — the structures that travel on the wire.
//! - **Settings** ([`RoomSettings`], [`SettingsRequest`]) — what a host
//!   may configure when creating a room.
//! - **Questions** ([`Question`], [`QuestionView`], [`Difficulty`]).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages are turned
//!   into frames and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections or rooms. It only
//! knows how messages look.
//!
//! ```text
//! Transport (frames) → Protocol (messages) → Room (battle state)
//! ```

mod codec;
mod error;
mod question;
mod settings;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use question::{Difficulty, Question, QuestionId, QuestionView, CHOICE_COUNT};
pub use settings::{GenreFilter, RoomSettings, RoundCap, SettingsRequest};
pub use types::{
    ClientMessage, GameOverInfo, Lifecycle, Recipient, RoomCode, RoomSnapshot, RoundResult,
    SeatId, SeatSnapshot, SeatSummary, ServerMessage, Winner,
};
