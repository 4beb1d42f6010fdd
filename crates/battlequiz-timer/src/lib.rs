//! Round timer for BattleQuiz rooms.
//!
//! A room has at most one pending timed action at a time: either the
//! countdown before a question is delivered, or the answer deadline after
//! it. [`RoundTimer`] is that single slot. Every arm carries the room's
//! generation number, and the fired event hands it back, so the room can
//! discard a fire that belongs to a round it already left.
//!
//! # Idle mode
//!
//! When nothing is armed, [`RoundTimer::wait_for_fire`] pends forever.
//! Rooms spend most of their life like this (waiting for players, HP
//! configuration, the next-round barrier).
//!
//! # Integration
//!
//! The timer sits inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         fired = timer.wait_for_fire() => {
//!             let msgs = room.on_timer(fired.kind, fired.generation);
//!         }
//!     }
//!     timer.sync(room.wanted_timer());
//! }
//! ```

use std::fmt;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Requests and events
// ---------------------------------------------------------------------------

/// Which timed action is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Countdown between drawing a question and delivering it.
    Countdown,
    /// Server-side cut-off for the answer window.
    AnswerDeadline,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Countdown => f.write_str("countdown"),
            Self::AnswerDeadline => f.write_str("answer_deadline"),
        }
    }
}

/// What a room wants armed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub kind: TimerKind,
    pub generation: u64,
    /// Delay from the moment the request is first armed.
    pub after: Duration,
}

/// Returned by [`RoundTimer::wait_for_fire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    kind: TimerKind,
    generation: u64,
    deadline: Instant,
}

// ---------------------------------------------------------------------------
// RoundTimer
// ---------------------------------------------------------------------------

/// Single-slot one-shot timer. One per room actor.
#[derive(Debug, Default)]
pub struct RoundTimer {
    slot: Option<Armed>,
    fired_total: u64,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the slot, replacing anything already pending.
    pub fn arm(&mut self, request: TimerRequest) {
        let deadline = Instant::now() + request.after;
        if let Some(old) = self.slot {
            trace!(kind = %old.kind, generation = old.generation, "replacing pending timer");
        }
        debug!(
            kind = %request.kind,
            generation = request.generation,
            after_ms = request.after.as_millis() as u64,
            "timer armed"
        );
        self.slot = Some(Armed {
            kind: request.kind,
            generation: request.generation,
            deadline,
        });
    }

    /// Drop whatever is pending. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(old) = self.slot.take() {
            debug!(kind = %old.kind, generation = old.generation, "timer cancelled");
        }
    }

    /// Reconcile the slot with what the room currently wants.
    ///
    /// A request with the same kind and generation as the pending one
    /// keeps the original deadline; anything else re-arms or cancels.
    pub fn sync(&mut self, wanted: Option<TimerRequest>) {
        match (wanted, self.slot) {
            (None, _) => self.cancel(),
            (Some(req), Some(cur)) if cur.kind == req.kind && cur.generation == req.generation => {}
            (Some(req), _) => self.arm(req),
        }
    }

    /// Wait until the pending timer is due and clear the slot.
    ///
    /// Pends forever while nothing is armed. Cancel-safe: if the future is
    /// dropped before the deadline, the slot is left untouched.
    pub async fn wait_for_fire(&mut self) -> TimerFired {
        let Some(armed) = self.slot else {
            return std::future::pending().await;
        };

        time::sleep_until(armed.deadline).await;

        self.slot = None;
        self.fired_total += 1;
        trace!(kind = %armed.kind, generation = armed.generation, "timer fired");

        TimerFired {
            kind: armed.kind,
            generation: armed.generation,
        }
    }

    /// Kind and generation of the pending timer, if any.
    pub fn pending(&self) -> Option<(TimerKind, u64)> {
        self.slot.map(|a| (a.kind, a.generation))
    }

    pub fn is_armed(&self) -> bool {
        self.slot.is_some()
    }

    /// Time left before the pending timer fires.
    pub fn remaining(&self) -> Option<Duration> {
        self.slot
            .map(|a| a.deadline.saturating_duration_since(Instant::now()))
    }

    /// Number of fires delivered over the timer's life.
    pub fn fired_total(&self) -> u64 {
        self.fired_total
    }
}
