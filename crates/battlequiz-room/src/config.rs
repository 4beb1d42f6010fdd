//! Engine configuration, the settings merge, and the round state machine.

use std::collections::BTreeSet;
use std::time::Duration;

use battlequiz_protocol::{Difficulty, GenreFilter, RoomSettings, RoundCap, SettingsRequest};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// Room settings
// ---------------------------------------------------------------------------

pub const DEFAULT_ROUND_CAP: u32 = 10;
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 30;
pub const MAX_TIME_LIMIT_SECS: u32 = 600;
pub const DEFAULT_MAX_PLAYERS: usize = 2;

/// Merges a client's settings request over the defaults.
///
/// Invalid values are coerced, never rejected:
/// - seat count outside {2, 3} → 2
/// - round cap 0 → 10
/// - time limit 0 → 30, above 600 → 600
/// - empty difficulty or genre set → everything
pub fn merge_settings(request: &SettingsRequest) -> RoomSettings {
    let max_players = match request.max_players {
        None => DEFAULT_MAX_PLAYERS,
        Some(n @ (2 | 3)) => n as usize,
        Some(n) => {
            warn!(requested = n, "unsupported seat count, using {DEFAULT_MAX_PLAYERS}");
            DEFAULT_MAX_PLAYERS
        }
    };

    let round_cap = match request.round_cap {
        None | Some(RoundCap::Finite(0)) => RoundCap::Finite(DEFAULT_ROUND_CAP),
        Some(cap) => cap,
    };

    let time_limit_secs = match request.time_limit_secs {
        None | Some(0) => DEFAULT_TIME_LIMIT_SECS,
        Some(n) if n > MAX_TIME_LIMIT_SECS => {
            warn!(requested = n, "time limit too long, clamping to {MAX_TIME_LIMIT_SECS}");
            MAX_TIME_LIMIT_SECS
        }
        Some(n) => n,
    };

    let difficulties = match &request.difficulties {
        Some(set) if !set.is_empty() => set.clone(),
        _ => Difficulty::ALL.into_iter().collect::<BTreeSet<_>>(),
    };

    let genres = match &request.genres {
        Some(GenreFilter::Only(tags)) if tags.is_empty() => GenreFilter::All,
        Some(filter) => filter.clone(),
        None => GenreFilter::All,
    };

    RoomSettings {
        genres,
        difficulties,
        round_cap,
        time_limit_secs,
        max_players,
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

pub const DEFAULT_CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Server-wide engine settings. Shared by every room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Countdown between drawing a question and delivering it.
    pub countdown_secs: u32,
    /// Submit blank answers for seats that miss the answer window.
    pub enforce_answer_deadline: bool,
    /// Added to the room's time limit before the deadline fires, to
    /// absorb client latency.
    pub deadline_grace_secs: u32,
    /// Starting HP for seats the host leaves out.
    pub default_hp: u32,
    /// Room code length.
    pub code_length: usize,
    /// Characters room codes are made of.
    pub code_alphabet: String,
    /// Room actor command channel capacity.
    pub channel_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            enforce_answer_deadline: true,
            deadline_grace_secs: 2,
            default_hp: 20,
            code_length: 5,
            code_alphabet: DEFAULT_CODE_ALPHABET.to_string(),
            channel_size: 64,
        }
    }
}

impl EngineConfig {
    /// Fix out-of-range values so the config is safe to use.
    ///
    /// Called by [`RoomManager::new`](crate::RoomManager::new).
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.code_length == 0 {
            warn!("code_length is 0, using {}", defaults.code_length);
            self.code_length = defaults.code_length;
        }
        if self.code_alphabet.is_empty() || !self.code_alphabet.is_ascii() {
            warn!(alphabet = %self.code_alphabet, "code_alphabet must be non-empty ASCII, using default");
            self.code_alphabet = defaults.code_alphabet;
        }
        if self.channel_size == 0 {
            self.channel_size = defaults.channel_size;
        }
        if self.default_hp == 0 {
            warn!("default_hp is 0, using {}", defaults.default_hp);
            self.default_hp = defaults.default_hp;
        }
        self
    }

    pub fn countdown(&self) -> Duration {
        Duration::from_secs(u64::from(self.countdown_secs))
    }

    /// How long after the question is delivered the answer window is cut
    /// off, for a room with `time_limit_secs`.
    pub fn answer_deadline(&self, time_limit_secs: u32) -> Duration {
        Duration::from_secs(u64::from(time_limit_secs) + u64::from(self.deadline_grace_secs))
    }
}

// ---------------------------------------------------------------------------
// RoundPhase
// ---------------------------------------------------------------------------

/// Where a room is inside the round loop.
///
/// ```text
/// Idle → Countdown → AnswerWindow → Resolving → AwaitingNext → Countdown …
///                                              ↘ Finished → Countdown (replay)
/// ```
///
/// - **Idle**: no match running yet (seating, HP configuration).
/// - **Countdown**: question drawn and announced, not yet delivered.
/// - **AnswerWindow**: question delivered, collecting one answer per
///   active seat.
/// - **Resolving**: damage being applied. Never observed between messages.
/// - **AwaitingNext**: round result sent, waiting on the ready barrier.
/// - **Finished**: match over. Replay goes back to Countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Idle,
    Countdown,
    AnswerWindow,
    Resolving,
    AwaitingNext,
    Finished,
}

impl RoundPhase {
    /// Returns `true` if transitioning to `target` is a legal edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        use RoundPhase::*;
        matches!(
            (self, target),
            (Idle, Countdown)
                | (Countdown, AnswerWindow)
                | (AnswerWindow, Resolving)
                | (Resolving, AwaitingNext)
                | (Resolving, Finished)
                | (AwaitingNext, Countdown)
                | (Finished, Countdown)
                | (_, Finished)
        )
    }
}

impl std::fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Countdown => write!(f, "Countdown"),
            Self::AnswerWindow => write!(f, "AnswerWindow"),
            Self::Resolving => write!(f, "Resolving"),
            Self::AwaitingNext => write!(f, "AwaitingNext"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}
