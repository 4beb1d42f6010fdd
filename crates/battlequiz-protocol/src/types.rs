//! Core protocol types: identities, recipients, and every message that
//! crosses the wire.
//!
//! Both message enums are internally tagged, so a frame looks like
//! `{ "type": "SubmitAnswer", "room_id": "K7QPA", ... }`. That shape is
//! easy to build and switch on from JavaScript.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Difficulty, GenreFilter, Question, QuestionId, QuestionView, RoomSettings};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies a seat, i.e. one connected player. Assigned by the server
/// from the connection id and never reused while the process runs.
///
/// Serialized as a plain number (`42`, not `{"0":42}`). Also accepts a
/// numeric string, which is what a JSON object key looks like once serde
/// has buffered it for an internally tagged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SeatId(pub u64);

impl<'de> Deserialize<'de> for SeatId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n)),
            Raw::Text(text) => text
                .parse()
                .map(Self)
                .map_err(|_| serde::de::Error::custom(format!("invalid seat id {text:?}"))),
        }
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// The short code players type to join a room, e.g. `"K7QPA"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who inside a room should receive a server message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every seat in the room.
    All,
    /// One specific seat.
    Seat(SeatId),
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// The lifecycle flag of a room.
///
/// ```text
/// WaitingForPlayers → WaitingForHpConfig → Playing ⇄ Finished
/// ```
///
/// `Finished → Playing` is the replay edge. Any state may jump straight to
/// `Finished` (disconnect, abort).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    WaitingForPlayers,
    WaitingForHpConfig,
    Playing,
    Finished,
}

impl Lifecycle {
    /// Returns `true` if the room is accepting new seats.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::WaitingForPlayers)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Returns `true` if moving to `target` is a legal edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::WaitingForPlayers, Self::WaitingForHpConfig)
                | (Self::WaitingForHpConfig, Self::Playing)
                | (Self::Finished, Self::Playing)
                | (Self::WaitingForPlayers, Self::Finished)
                | (Self::WaitingForHpConfig, Self::Finished)
                | (Self::Playing, Self::Finished)
        )
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForPlayers => write!(f, "WaitingForPlayers"),
            Self::WaitingForHpConfig => write!(f, "WaitingForHpConfig"),
            Self::Playing => write!(f, "Playing"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots and results
// ---------------------------------------------------------------------------

/// A seat's name, in join order. Sent when the room fills up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSummary {
    pub seat_id: SeatId,
    pub name: String,
}

/// Everything about a seat that clients render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSnapshot {
    pub seat_id: SeatId,
    pub name: String,
    pub hp: u32,
    pub initial_hp: u32,
    pub is_eliminated: bool,
    pub replay_ready: bool,
}

/// Full roster snapshot of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomCode,
    pub host_id: SeatId,
    pub max_players: usize,
    pub lifecycle: Lifecycle,
    pub round: u32,
    pub used_question_count: usize,
    pub players: Vec<SeatSnapshot>,
}

/// Outcome of a finished match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Seat(SeatId),
    Draw,
}

/// Terminal information attached to the last round result and sent as
/// `GameOver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverInfo {
    pub winner: Winner,
    pub reason: String,
    pub final_hp: BTreeMap<SeatId, u32>,
}

/// Result of one round, addressed to one seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: u32,
    pub players: Vec<SeatSnapshot>,
    pub message: String,
    pub question_text: String,
    pub choices: Vec<String>,
    pub correct_index: usize,
    pub correct_answer: String,
    /// The recipient's own choice, `None` if they did not answer.
    pub your_answer: Option<usize>,
    pub can_continue: bool,
    pub game_over: Option<GameOverInfo>,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// "Open a new room with me as host."
    CreateRoom {
        #[serde(default)]
        name: String,
        #[serde(default)]
        settings: crate::SettingsRequest,
    },

    /// "Seat me in this room."
    JoinRoom {
        room_id: RoomCode,
        #[serde(default)]
        name: String,
    },

    /// Host only: starting HP per seat. Missing seats get the default.
    ConfigureHp {
        room_id: RoomCode,
        #[serde(default)]
        initial_hp: BTreeMap<SeatId, i64>,
    },

    /// An answer to the live question. `choice_index: null` means no
    /// answer (timed out).
    SubmitAnswer {
        room_id: RoomCode,
        question_id: QuestionId,
        choice_index: Option<usize>,
        elapsed_seconds: Option<f64>,
    },

    /// Ask to move on; counts as a ready acknowledgement while the
    /// next-round barrier is open.
    RequestNext { room_id: RoomCode },

    /// Next-round barrier acknowledgement.
    ReadyForNext { room_id: RoomCode },

    /// "I want a rematch."
    ReplayReady { room_id: RoomCode },

    /// Host only: restart the finished match.
    StartReplay { room_id: RoomCode },

    /// Host only: end the match now.
    Abort { room_id: RoomCode },

    /// Single-player draw straight from the question pool. No room needed.
    DrawQuestion {
        #[serde(default)]
        genres: GenreFilter,
        #[serde(default)]
        difficulties: BTreeSet<Difficulty>,
        #[serde(default)]
        exhaustible: bool,
        #[serde(default)]
        used_ids: BTreeSet<QuestionId>,
    },
}

impl ClientMessage {
    /// The room this message is addressed to. `None` for messages that
    /// create a room or need none.
    pub fn room_id(&self) -> Option<&RoomCode> {
        match self {
            Self::JoinRoom { room_id, .. }
            | Self::ConfigureHp { room_id, .. }
            | Self::SubmitAnswer { room_id, .. }
            | Self::RequestNext { room_id }
            | Self::ReadyForNext { room_id }
            | Self::ReplayReady { room_id }
            | Self::StartReplay { room_id }
            | Self::Abort { room_id } => Some(room_id),
            Self::CreateRoom { .. } | Self::DrawQuestion { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Messages the server sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    RoomCreated {
        room_id: RoomCode,
        seat_id: SeatId,
        settings: RoomSettings,
    },

    RoomJoined {
        room_id: RoomCode,
        seat_id: SeatId,
    },

    /// A user-facing error. Also used to announce that an opponent left.
    RoomError { message: String },

    /// The room is full; the host should now assign starting HP.
    RoomReadyForHpConfig {
        players: Vec<SeatSummary>,
        settings: RoomSettings,
    },

    GameStart {
        players: Vec<SeatSnapshot>,
        initial_hp: BTreeMap<SeatId, u32>,
        settings: RoomSettings,
    },

    CountdownStart { seconds: u32, difficulty: Difficulty },

    Question {
        round: u32,
        question: QuestionView,
        time_limit_seconds: u32,
    },

    RoundResult(RoundResult),

    GameOver(GameOverInfo),

    GameAborted { room_id: RoomCode, reason: String },

    RoomState(RoomSnapshot),

    /// Reply to `DrawQuestion`. `recycled` tells the caller to forget its
    /// used-id set because the pool started over.
    QuestionDrawn {
        question: Option<Question>,
        recycled: bool,
    },
}

// =========================================================================
// Tests
// =========================================================================
