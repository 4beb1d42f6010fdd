//! Damage resolution.
//!
//! Pure functions: given who answered what and how fast, decide how much
//! HP each seat loses, then whether the match is over. Nothing in here
//! touches room state.
//!
//! Two-seat rooms reward speed (a bonus on top of the base damage, and
//! only the faster of two correct answers lands). Three-seat rooms have no
//! speed bonus; damage depends on how many seats were correct and on the
//! order the correct answers arrived in.

use battlequiz_protocol::{Difficulty, RoundCap, SeatId, Winner};

/// Elapsed time recorded for a seat that sent no usable time.
pub const NO_ANSWER_ELAPSED: f64 = 9999.0;

/// Base damage of a correct answer.
pub fn base_damage(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => 2,
        Difficulty::Normal => 4,
        Difficulty::Hard => 7,
    }
}

/// Extra damage for a fast correct answer. Two-seat rooms only.
pub fn speed_bonus(elapsed_secs: f64) -> u32 {
    if elapsed_secs <= 2.0 {
        3
    } else if elapsed_secs <= 3.0 {
        1
    } else {
        0
    }
}

fn half_up(n: u32) -> u32 {
    n.div_ceil(2)
}

/// One seat's answer for the round, already graded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Response {
    pub seat: SeatId,
    pub correct: bool,
    pub elapsed_secs: f64,
}

/// HP lost by one seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub seat: SeatId,
    pub amount: u32,
}

/// What happened in the round, for the result message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Two seats, both correct; the faster one landed its hit.
    Outpaced { attacker: SeatId, target: SeatId, amount: u32 },
    /// Two seats, both correct in exactly the same time.
    DeadHeat,
    /// Two seats, only `attacker` was correct.
    Landed { attacker: SeatId, target: SeatId, amount: u32 },
    /// Three seats, at least one correct. `correct` is fastest first.
    Ranked { correct: Vec<SeatId> },
    /// Nobody was correct.
    NoneCorrect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Only seats that actually lose HP.
    pub hits: Vec<Hit>,
    pub verdict: Verdict,
}

impl Resolution {
    pub fn damage_to(&self, seat: SeatId) -> u32 {
        self.hits
            .iter()
            .filter(|h| h.seat == seat)
            .map(|h| h.amount)
            .sum()
    }
}

/// Resolves a round.
///
/// `seats` is the room's seat list in join order. `responses` holds at
/// most one entry per seat; seats without an entry (eliminated ones) never
/// take damage in a three-seat room and count as wrong in a two-seat room.
/// `max_players` picks the rule set, whatever the number of seats alive.
pub fn resolve(
    max_players: usize,
    seats: &[SeatId],
    responses: &[Response],
    difficulty: Difficulty,
) -> Resolution {
    if max_players >= 3 {
        resolve_trio(seats, responses, difficulty)
    } else {
        resolve_duel(seats, responses, difficulty)
    }
}

fn response_of(responses: &[Response], seat: SeatId) -> Option<&Response> {
    responses.iter().find(|r| r.seat == seat)
}

fn resolve_duel(seats: &[SeatId], responses: &[Response], difficulty: Difficulty) -> Resolution {
    let none = Resolution {
        hits: Vec::new(),
        verdict: Verdict::NoneCorrect,
    };
    let [a, b] = match seats {
        [a, b, ..] => [*a, *b],
        _ => return none,
    };

    let grade = |seat: SeatId| {
        let r = response_of(responses, seat);
        let correct = r.is_some_and(|r| r.correct);
        let elapsed = r.map_or(NO_ANSWER_ELAPSED, |r| r.elapsed_secs);
        let potential = if correct {
            base_damage(difficulty) + speed_bonus(elapsed)
        } else {
            0
        };
        (correct, elapsed, potential)
    };
    let (a_ok, a_time, a_dmg) = grade(a);
    let (b_ok, b_time, b_dmg) = grade(b);

    let landed = |attacker: SeatId, target: SeatId, amount: u32| Resolution {
        hits: vec![Hit { seat: target, amount }],
        verdict: Verdict::Landed { attacker, target, amount },
    };
    let outpaced = |attacker: SeatId, target: SeatId, amount: u32| Resolution {
        hits: vec![Hit { seat: target, amount }],
        verdict: Verdict::Outpaced { attacker, target, amount },
    };

    match (a_ok, b_ok) {
        (true, true) if a_time < b_time => outpaced(a, b, a_dmg),
        (true, true) if b_time < a_time => outpaced(b, a, b_dmg),
        (true, true) => Resolution {
            hits: Vec::new(),
            verdict: Verdict::DeadHeat,
        },
        (true, false) => landed(a, b, a_dmg),
        (false, true) => landed(b, a, b_dmg),
        (false, false) => none,
    }
}

fn resolve_trio(seats: &[SeatId], responses: &[Response], difficulty: Difficulty) -> Resolution {
    let d = base_damage(difficulty);

    // Responders in join order, so the stable sort below breaks elapsed
    // ties in favor of the earlier seat.
    let responders: Vec<&Response> = seats
        .iter()
        .filter_map(|&s| response_of(responses, s))
        .collect();
    let mut correct: Vec<&Response> = responders.iter().copied().filter(|r| r.correct).collect();
    correct.sort_by(|x, y| x.elapsed_secs.total_cmp(&y.elapsed_secs));

    let mut hits = Vec::new();
    match correct.len() {
        0 => {
            return Resolution {
                hits,
                verdict: Verdict::NoneCorrect,
            };
        }
        1 | 2 => {
            if let [_, slower] = correct[..] {
                hits.push(Hit { seat: slower.seat, amount: half_up(d) });
            }
            for r in responders.iter().filter(|r| !r.correct) {
                hits.push(Hit { seat: r.seat, amount: half_up(3 * d) });
            }
        }
        _ => {
            hits.push(Hit { seat: correct[1].seat, amount: half_up(d) });
            hits.push(Hit { seat: correct[2].seat, amount: d });
        }
    }

    Resolution {
        hits,
        verdict: Verdict::Ranked {
            correct: correct.iter().map(|r| r.seat).collect(),
        },
    }
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

/// A seat's standing after damage was applied.
#[derive(Debug, Clone, Copy)]
pub struct Standing<'a> {
    pub seat: SeatId,
    pub name: &'a str,
    pub hp: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Finished { winner: Winner, reason: String },
}

/// Decides whether the match is over after `round`.
///
/// Two seats: both at 0 is a draw, one at 0 loses, otherwise a reached
/// round cap compares HP. Three seats: the match ends only when at most
/// one seat has HP left; the round cap never ends it.
pub fn judge(max_players: usize, standings: &[Standing<'_>], round: u32, cap: RoundCap) -> Outcome {
    if max_players >= 3 {
        judge_trio(standings)
    } else {
        judge_duel(standings, round, cap)
    }
}

fn finished(winner: Winner, reason: String) -> Outcome {
    Outcome::Finished { winner, reason }
}

fn judge_duel(standings: &[Standing<'_>], round: u32, cap: RoundCap) -> Outcome {
    let [a, b] = match standings {
        [a, b, ..] => [a, b],
        [only] => return finished(Winner::Seat(only.seat), format!("{} is the last one standing", only.name)),
        [] => return finished(Winner::Draw, "no players left".into()),
    };

    match (a.hp, b.hp) {
        (0, 0) => finished(Winner::Draw, "both players reached 0 HP".into()),
        (0, _) => finished(Winner::Seat(b.seat), format!("{} reached 0 HP", a.name)),
        (_, 0) => finished(Winner::Seat(a.seat), format!("{} reached 0 HP", b.name)),
        _ if cap.reached(round) => {
            if a.hp > b.hp {
                finished(Winner::Seat(a.seat), format!("{} had more HP at the final round", a.name))
            } else if b.hp > a.hp {
                finished(Winner::Seat(b.seat), format!("{} had more HP at the final round", b.name))
            } else {
                finished(Winner::Draw, "equal HP at the final round".into())
            }
        }
        _ => Outcome::Continue,
    }
}

fn judge_trio(standings: &[Standing<'_>]) -> Outcome {
    let alive: Vec<&Standing<'_>> = standings.iter().filter(|s| s.hp > 0).collect();
    match alive[..] {
        [] => finished(Winner::Draw, "every player reached 0 HP".into()),
        [last] => finished(Winner::Seat(last.seat), format!("only {} has HP left", last.name)),
        _ => Outcome::Continue,
    }
}
