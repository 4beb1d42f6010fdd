//! The per-room battle state machine.
//!
//! [`BattleRoom`] owns everything about one room: seats in join order, the
//! lifecycle flag, the round loop, the answer map, the used-question set
//! and both readiness barriers. Every operation takes the room from one
//! consistent state to the next and returns the messages to send, paired
//! with their recipients. It never does I/O and never sleeps; the room
//! actor feeds it client messages and timer fires.
//!
//! Stray input (late answers, acks outside the barrier, timer fires for an
//! earlier generation) is dropped without side effects.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use battlequiz_pool::{DrawFilter, QuestionCatalog};
use battlequiz_protocol::{
    GameOverInfo, Lifecycle, Question, QuestionId, QuestionView, Recipient, RoomCode,
    RoomSettings, RoomSnapshot, RoundResult, SeatId, SeatSnapshot, SeatSummary, ServerMessage,
};
use battlequiz_timer::{TimerKind, TimerRequest};
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::damage::{self, NO_ANSWER_ELAPSED, Outcome, Response, Standing, Verdict};
use crate::{EngineConfig, RoomError, RoundPhase};

/// Messages produced by one step, each with its recipients.
pub type Outbox = Vec<(Recipient, ServerMessage)>;

pub const ABORTED_BY_HOST: &str = "aborted_by_host";
pub const OPPONENT_DISCONNECTED: &str = "opponent disconnected";
pub const NO_QUESTION_AVAILABLE: &str = "no question available";

#[derive(Debug, Clone)]
struct Seat {
    id: SeatId,
    name: String,
    hp: u32,
    initial_hp: u32,
    eliminated: bool,
    replay_ready: bool,
}

impl Seat {
    fn new(id: SeatId, name: &str, position: usize) -> Self {
        let name = match name.trim() {
            "" => format!("Player {}", position + 1),
            trimmed => trimmed.to_string(),
        };
        Self {
            id,
            name,
            hp: 0,
            initial_hp: 0,
            eliminated: false,
            replay_ready: false,
        }
    }

    fn is_active(&self) -> bool {
        !self.eliminated && self.hp > 0
    }

    /// Elimination is sticky for the rest of the match.
    fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
        if self.hp == 0 {
            self.eliminated = true;
        }
    }

    fn reset_for_match(&mut self) {
        self.hp = self.initial_hp;
        self.eliminated = false;
        self.replay_ready = false;
    }

    fn snapshot(&self) -> SeatSnapshot {
        SeatSnapshot {
            seat_id: self.id,
            name: self.name.clone(),
            hp: self.hp,
            initial_hp: self.initial_hp,
            is_eliminated: self.eliminated,
            replay_ready: self.replay_ready,
        }
    }

    fn summary(&self) -> SeatSummary {
        SeatSummary {
            seat_id: self.id,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Answer {
    choice: Option<usize>,
    elapsed_secs: f64,
}

fn coerce_hp(requested: i64) -> u32 {
    requested.clamp(1, i64::from(u32::MAX)) as u32
}

/// State of one battle room.
pub struct BattleRoom {
    code: RoomCode,
    host: SeatId,
    settings: RoomSettings,
    engine: EngineConfig,
    catalog: Arc<QuestionCatalog>,
    rng: StdRng,

    /// Join order. Also the tie-break order for equal answer times.
    seats: Vec<Seat>,
    lifecycle: Lifecycle,
    phase: RoundPhase,
    round: u32,
    question: Option<Question>,
    answers: HashMap<SeatId, Answer>,
    used: HashSet<QuestionId>,
    ready_next: HashSet<SeatId>,
    /// Active-seat count when the next-round barrier opened.
    ready_threshold: usize,
    /// Bumped whenever a round starts or the room finishes. Timer fires
    /// carrying an older value are ignored.
    generation: u64,
    hp_configured: bool,
    /// Once a seat leaves, the room can never replay.
    lost_seat: bool,
}

impl BattleRoom {
    /// Creates a room with the host already seated.
    pub fn new(
        code: RoomCode,
        host: SeatId,
        host_name: &str,
        settings: RoomSettings,
        engine: EngineConfig,
        catalog: Arc<QuestionCatalog>,
        rng: StdRng,
    ) -> Self {
        Self {
            code,
            host,
            settings,
            engine,
            catalog,
            rng,
            seats: vec![Seat::new(host, host_name, 0)],
            lifecycle: Lifecycle::WaitingForPlayers,
            phase: RoundPhase::Idle,
            round: 0,
            question: None,
            answers: HashMap::new(),
            used: HashSet::new(),
            ready_next: HashSet::new(),
            ready_threshold: 0,
            generation: 0,
            hp_configured: false,
            lost_seat: false,
        }
    }

    // -----------------------------------------------------------------
    // Seating and HP configuration
    // -----------------------------------------------------------------

    /// Seats a new player. Filling the last seat opens HP configuration.
    pub fn join(&mut self, seat: SeatId, name: &str) -> Result<Outbox, RoomError> {
        if self.seat(seat).is_some() {
            return Err(RoomError::AlreadySeated(seat, self.code.clone()));
        }
        if self.seats.len() >= self.settings.max_players {
            return Err(RoomError::RoomFull(self.code.clone()));
        }
        if !self.lifecycle.is_joinable() {
            return Err(RoomError::Closed(self.code.clone()));
        }

        self.seats.push(Seat::new(seat, name, self.seats.len()));
        info!(
            room_id = %self.code,
            %seat,
            seats = self.seats.len(),
            max = self.settings.max_players,
            "seat joined"
        );

        let mut out = vec![(
            Recipient::Seat(seat),
            ServerMessage::RoomJoined {
                room_id: self.code.clone(),
                seat_id: seat,
            },
        )];

        if self.seats.len() == self.settings.max_players {
            self.set_lifecycle(Lifecycle::WaitingForHpConfig);
            out.push((
                Recipient::All,
                ServerMessage::RoomReadyForHpConfig {
                    players: self.seats.iter().map(Seat::summary).collect(),
                    settings: self.settings.clone(),
                },
            ));
        }
        Ok(out)
    }

    /// Host only. Seats missing from `initial_hp` get the default; every
    /// value is raised to at least 1.
    pub fn configure_hp(
        &mut self,
        seat: SeatId,
        initial_hp: &BTreeMap<SeatId, i64>,
    ) -> Result<Outbox, RoomError> {
        if seat != self.host {
            return Err(RoomError::NotHost);
        }
        if self.lifecycle != Lifecycle::WaitingForHpConfig {
            debug!(room_id = %self.code, lifecycle = %self.lifecycle, "hp config outside barrier ignored");
            return Ok(Vec::new());
        }

        let default_hp = self.engine.default_hp;
        for s in &mut self.seats {
            s.initial_hp = initial_hp.get(&s.id).map_or(default_hp, |&n| coerce_hp(n));
            s.reset_for_match();
        }
        self.hp_configured = true;
        self.used.clear();
        self.set_lifecycle(Lifecycle::Playing);
        info!(room_id = %self.code, seats = self.seats.len(), "game started");

        let mut out = vec![(Recipient::All, self.game_start())];
        self.start_round(&mut out);
        Ok(out)
    }

    // -----------------------------------------------------------------
    // Round loop
    // -----------------------------------------------------------------

    fn start_round(&mut self, out: &mut Outbox) {
        self.round += 1;
        self.answers.clear();
        self.ready_next.clear();

        let filter = DrawFilter {
            genres: &self.settings.genres,
            difficulties: &self.settings.difficulties,
            exhaustible: false,
        };
        let drawn = self
            .catalog
            .draw(&mut self.rng, &mut self.used, filter)
            .map(|d| (d.question.clone(), d.recycled));

        let Some((question, recycled)) = drawn else {
            warn!(room_id = %self.code, round = self.round, "question pool empty, finishing room");
            self.finalize();
            out.push((
                Recipient::All,
                ServerMessage::RoomError {
                    message: NO_QUESTION_AVAILABLE.to_string(),
                },
            ));
            return;
        };
        if recycled {
            debug!(room_id = %self.code, "used questions recycled");
        }

        self.generation += 1;
        self.set_phase(RoundPhase::Countdown);
        debug!(
            room_id = %self.code,
            round = self.round,
            question_id = question.id,
            difficulty = %question.difficulty,
            generation = self.generation,
            "round started"
        );

        out.push((
            Recipient::All,
            ServerMessage::CountdownStart {
                seconds: self.engine.countdown_secs,
                difficulty: question.difficulty,
            },
        ));
        self.question = Some(question);
    }

    /// Handles a fired round timer. Fires from an earlier generation, or
    /// for a phase the room already left, do nothing.
    pub fn on_timer(&mut self, kind: TimerKind, generation: u64) -> Outbox {
        if generation != self.generation || self.lifecycle.is_finished() {
            debug!(room_id = %self.code, %kind, generation, current = self.generation, "stale timer ignored");
            return Vec::new();
        }
        match (kind, self.phase) {
            (TimerKind::Countdown, RoundPhase::Countdown) => self.deliver_question(),
            (TimerKind::AnswerDeadline, RoundPhase::AnswerWindow) => self.expire_answer_window(),
            _ => {
                debug!(room_id = %self.code, %kind, phase = %self.phase, "timer does not match phase");
                Vec::new()
            }
        }
    }

    fn deliver_question(&mut self) -> Outbox {
        let Some(question) = &self.question else {
            return Vec::new();
        };
        let msg = ServerMessage::Question {
            round: self.round,
            question: QuestionView::from(question),
            time_limit_seconds: self.settings.time_limit_secs,
        };
        self.set_phase(RoundPhase::AnswerWindow);
        vec![(Recipient::All, msg)]
    }

    /// Submits a blank answer for every active seat that has not answered.
    fn expire_answer_window(&mut self) -> Outbox {
        let Some(question_id) = self.question.as_ref().map(|q| q.id) else {
            return Vec::new();
        };
        let missing: Vec<SeatId> = self
            .seats
            .iter()
            .filter(|s| s.is_active() && !self.answers.contains_key(&s.id))
            .map(|s| s.id)
            .collect();
        info!(room_id = %self.code, round = self.round, missing = missing.len(), "answer window expired");

        let elapsed = f64::from(self.settings.time_limit_secs);
        let mut out = Vec::new();
        for seat in missing {
            out.extend(self.submit_answer(seat, question_id, None, Some(elapsed)));
        }
        out
    }

    /// Records an answer. The round resolves as soon as every active seat
    /// has one. Anything that does not fit the live round is dropped.
    pub fn submit_answer(
        &mut self,
        seat: SeatId,
        question_id: QuestionId,
        choice: Option<usize>,
        elapsed_secs: Option<f64>,
    ) -> Outbox {
        match self.accept_answer(seat, question_id, choice, elapsed_secs) {
            Err(e) => {
                debug!(room_id = %self.code, error = %e, "answer dropped");
                Vec::new()
            }
            Ok(()) if self.answers.len() >= self.active_count() => self.resolve_round(),
            Ok(()) => Vec::new(),
        }
    }

    fn accept_answer(
        &mut self,
        seat: SeatId,
        question_id: QuestionId,
        choice: Option<usize>,
        elapsed_secs: Option<f64>,
    ) -> Result<(), RoomError> {
        let stale = RoomError::StaleAnswer { seat, question_id };
        if self.phase != RoundPhase::AnswerWindow || self.answers.contains_key(&seat) {
            return Err(stale);
        }
        if self.question.as_ref().map(|q| q.id) != Some(question_id) {
            return Err(stale);
        }
        if !self.seat(seat).is_some_and(Seat::is_active) {
            return Err(stale);
        }

        let elapsed_secs = elapsed_secs
            .filter(|t| t.is_finite() && *t >= 0.0)
            .unwrap_or(NO_ANSWER_ELAPSED);
        self.answers.insert(seat, Answer { choice, elapsed_secs });
        Ok(())
    }

    fn resolve_round(&mut self) -> Outbox {
        let Some(question) = self.question.clone() else {
            return Vec::new();
        };
        self.set_phase(RoundPhase::Resolving);

        let max_players = self.settings.max_players;
        let order: Vec<SeatId> = self.seats.iter().map(|s| s.id).collect();
        let responses: Vec<Response> = self
            .seats
            .iter()
            .filter_map(|s| {
                self.answers.get(&s.id).map(|a| Response {
                    seat: s.id,
                    correct: question.is_correct(a.choice),
                    elapsed_secs: a.elapsed_secs,
                })
            })
            .collect();

        let resolution = damage::resolve(max_players, &order, &responses, question.difficulty);
        for hit in &resolution.hits {
            if let Some(s) = self.seat_mut(hit.seat) {
                s.take_damage(hit.amount);
            }
        }
        let message = self.describe(&resolution.verdict, &resolution.hits);

        let outcome = {
            let standings: Vec<Standing<'_>> = self
                .seats
                .iter()
                .map(|s| Standing {
                    seat: s.id,
                    name: &s.name,
                    hp: s.hp,
                })
                .collect();
            damage::judge(max_players, &standings, self.round, self.settings.round_cap)
        };

        let game_over = match outcome {
            Outcome::Continue => {
                self.set_phase(RoundPhase::AwaitingNext);
                self.ready_next.clear();
                self.ready_threshold = self.active_count();
                None
            }
            Outcome::Finished { winner, reason } => {
                self.finalize();
                info!(room_id = %self.code, round = self.round, ?winner, %reason, "game finished");
                Some(GameOverInfo {
                    winner,
                    reason,
                    final_hp: self.seats.iter().map(|s| (s.id, s.hp)).collect(),
                })
            }
        };

        let players = self.seat_snapshots();
        let mut out: Outbox = self
            .seats
            .iter()
            .map(|s| {
                let result = RoundResult {
                    round: self.round,
                    players: players.clone(),
                    message: message.clone(),
                    question_text: question.prompt.clone(),
                    choices: question.choices.to_vec(),
                    correct_index: question.answer_index,
                    correct_answer: question.correct_choice().to_string(),
                    your_answer: self.answers.get(&s.id).and_then(|a| a.choice),
                    can_continue: game_over.is_none(),
                    game_over: game_over.clone(),
                };
                (Recipient::Seat(s.id), ServerMessage::RoundResult(result))
            })
            .collect();

        if let Some(info) = game_over {
            out.push((Recipient::All, ServerMessage::GameOver(info)));
            out.push((Recipient::All, ServerMessage::RoomState(self.snapshot())));
        }
        out
    }

    fn describe(&self, verdict: &Verdict, hits: &[damage::Hit]) -> String {
        let name = |id: SeatId| self.seat(id).map_or("?", |s| s.name.as_str());
        match verdict {
            Verdict::Outpaced { attacker, target, amount } => format!(
                "{} and {} both answered correctly, but {} was faster and dealt {amount} damage.",
                name(*attacker),
                name(*target),
                name(*attacker)
            ),
            Verdict::DeadHeat => {
                "Both answered correctly at the same moment. No damage this round.".to_string()
            }
            Verdict::Landed { attacker, target, amount } => format!(
                "{} answered correctly and dealt {amount} damage to {}.",
                name(*attacker),
                name(*target)
            ),
            Verdict::Ranked { correct } => {
                let first = correct.first().map_or("?", |id| name(*id));
                let mut msg = format!("{first} was the fastest correct answer!");
                if !hits.is_empty() {
                    let list: Vec<String> = hits
                        .iter()
                        .map(|h| format!("{} -{}", name(h.seat), h.amount))
                        .collect();
                    msg.push_str(&format!(" Damage: {}.", list.join(", ")));
                }
                msg
            }
            Verdict::NoneCorrect => "Nobody answered correctly. No damage this round.".to_string(),
        }
    }

    // -----------------------------------------------------------------
    // Next-round barrier
    // -----------------------------------------------------------------

    /// Acknowledges the round result. Once every seat that was active when
    /// the barrier opened has acknowledged, the next round starts.
    pub fn ready_for_next(&mut self, seat: SeatId) -> Outbox {
        if self.phase != RoundPhase::AwaitingNext {
            debug!(room_id = %self.code, %seat, phase = %self.phase, "ready outside barrier ignored");
            return Vec::new();
        }
        if !self.seat(seat).is_some_and(Seat::is_active) {
            debug!(room_id = %self.code, %seat, "ready from inactive seat ignored");
            return Vec::new();
        }

        self.ready_next.insert(seat);
        if self.ready_next.len() < self.ready_threshold {
            return Vec::new();
        }
        let mut out = Vec::new();
        self.start_round(&mut out);
        out
    }

    /// Same as [`ready_for_next`](Self::ready_for_next), but refused once
    /// the round cap is reached.
    pub fn request_next(&mut self, seat: SeatId) -> Outbox {
        if self.settings.round_cap.reached(self.round) {
            debug!(room_id = %self.code, %seat, round = self.round, "request-next past round cap ignored");
            return Vec::new();
        }
        self.ready_for_next(seat)
    }

    // -----------------------------------------------------------------
    // Replay, abort, departure
    // -----------------------------------------------------------------

    /// Flags a seat as wanting a rematch.
    pub fn replay_ready(&mut self, seat: SeatId) -> Outbox {
        if !self.lifecycle.is_finished() {
            debug!(room_id = %self.code, %seat, "replay-ready before finish ignored");
            return Vec::new();
        }
        let Some(s) = self.seat_mut(seat) else {
            return Vec::new();
        };
        s.replay_ready = true;
        vec![(Recipient::All, ServerMessage::RoomState(self.snapshot()))]
    }

    /// Host only. Restarts a finished match once every other seat is
    /// replay-ready.
    pub fn start_replay(&mut self, seat: SeatId) -> Result<Outbox, RoomError> {
        if seat != self.host {
            return Err(RoomError::NotHost);
        }
        if !self.lifecycle.is_finished() {
            debug!(room_id = %self.code, "replay before finish ignored");
            return Ok(Vec::new());
        }
        if !self.can_replay() {
            debug!(room_id = %self.code, seats = self.seats.len(), "room cannot replay");
            return Ok(Vec::new());
        }
        let waiting = self
            .seats
            .iter()
            .filter(|s| s.id != self.host && !s.replay_ready)
            .count();
        if waiting > 0 {
            debug!(room_id = %self.code, waiting, "replay start ignored, seats not ready");
            return Ok(Vec::new());
        }

        self.round = 0;
        self.question = None;
        self.answers.clear();
        self.ready_next.clear();
        self.used.clear();
        for s in &mut self.seats {
            s.reset_for_match();
        }
        self.set_lifecycle(Lifecycle::Playing);
        info!(room_id = %self.code, "replay started");

        let mut out = vec![
            (Recipient::All, ServerMessage::RoomState(self.snapshot())),
            (Recipient::All, self.game_start()),
        ];
        self.start_round(&mut out);
        Ok(out)
    }

    /// Host only. Ends the match on the spot; the room stays replayable.
    pub fn abort(&mut self, seat: SeatId) -> Result<Outbox, RoomError> {
        if seat != self.host {
            return Err(RoomError::NotHost);
        }
        if self.lifecycle.is_finished() {
            return Ok(Vec::new());
        }
        self.finalize();
        info!(room_id = %self.code, round = self.round, "game aborted by host");
        Ok(vec![
            (
                Recipient::All,
                ServerMessage::GameAborted {
                    room_id: self.code.clone(),
                    reason: ABORTED_BY_HOST.to_string(),
                },
            ),
            (Recipient::All, ServerMessage::RoomState(self.snapshot())),
        ])
    }

    /// Removes a seat. Before the match is over this finishes the room for
    /// everyone left; afterwards the others just get a fresh snapshot.
    pub fn leave(&mut self, seat: SeatId) -> Outbox {
        let Some(idx) = self.seats.iter().position(|s| s.id == seat) else {
            return Vec::new();
        };
        self.seats.remove(idx);
        self.answers.remove(&seat);
        self.ready_next.remove(&seat);
        self.lost_seat = true;
        info!(room_id = %self.code, %seat, seats = self.seats.len(), "seat left");

        if self.lifecycle.is_finished() {
            if self.seats.is_empty() {
                return Vec::new();
            }
            return vec![(Recipient::All, ServerMessage::RoomState(self.snapshot()))];
        }

        self.finalize();
        if self.seats.is_empty() {
            return Vec::new();
        }
        vec![(
            Recipient::All,
            ServerMessage::RoomError {
                message: OPPONENT_DISCONNECTED.to_string(),
            },
        )]
    }

    /// Marks the room finished and makes every pending timer stale.
    fn finalize(&mut self) {
        self.set_lifecycle(Lifecycle::Finished);
        self.set_phase(RoundPhase::Finished);
        self.generation += 1;
        self.ready_next.clear();
        for s in &mut self.seats {
            s.replay_ready = false;
        }
    }

    // -----------------------------------------------------------------
    // Timer wiring
    // -----------------------------------------------------------------

    /// The timer the room needs armed in its current state, if any.
    pub fn wanted_timer(&self) -> Option<TimerRequest> {
        if self.lifecycle.is_finished() {
            return None;
        }
        match self.phase {
            RoundPhase::Countdown => Some(TimerRequest {
                kind: TimerKind::Countdown,
                generation: self.generation,
                after: self.engine.countdown(),
            }),
            RoundPhase::AnswerWindow if self.engine.enforce_answer_deadline => Some(TimerRequest {
                kind: TimerKind::AnswerDeadline,
                generation: self.generation,
                after: self.engine.answer_deadline(self.settings.time_limit_secs),
            }),
            _ => None,
        }
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.code.clone(),
            host_id: self.host,
            max_players: self.settings.max_players,
            lifecycle: self.lifecycle,
            round: self.round,
            used_question_count: self.used.len(),
            players: self.seat_snapshots(),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host(&self) -> SeatId {
        self.host
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn hp(&self, seat: SeatId) -> Option<u32> {
        self.seat(seat).map(|s| s.hp)
    }

    /// Seats that may still answer.
    pub fn active_count(&self) -> usize {
        self.seats.iter().filter(|s| s.is_active()).count()
    }

    fn can_replay(&self) -> bool {
        self.hp_configured && !self.lost_seat && self.seats.len() == self.settings.max_players
    }

    fn seat(&self, id: SeatId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == id)
    }

    fn seat_mut(&mut self, id: SeatId) -> Option<&mut Seat> {
        self.seats.iter_mut().find(|s| s.id == id)
    }

    fn seat_snapshots(&self) -> Vec<SeatSnapshot> {
        self.seats.iter().map(Seat::snapshot).collect()
    }

    fn game_start(&self) -> ServerMessage {
        ServerMessage::GameStart {
            players: self.seat_snapshots(),
            initial_hp: self.seats.iter().map(|s| (s.id, s.initial_hp)).collect(),
            settings: self.settings.clone(),
        }
    }

    fn set_lifecycle(&mut self, next: Lifecycle) {
        if !self.lifecycle.can_transition_to(next) {
            warn!(room_id = %self.code, from = %self.lifecycle, to = %next, "unexpected lifecycle transition");
        }
        self.lifecycle = next;
    }

    fn set_phase(&mut self, next: RoundPhase) {
        if !self.phase.can_transition_to(next) {
            warn!(room_id = %self.code, from = %self.phase, to = %next, "unexpected round transition");
        }
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battlequiz_protocol::{Difficulty, RoundCap, SettingsRequest, Winner};
    use rand::SeedableRng;

    use crate::merge_settings;

    const ANN: SeatId = SeatId(1);
    const BOB: SeatId = SeatId(2);
    const CY: SeatId = SeatId(3);

    fn catalog(difficulty: Difficulty) -> Arc<QuestionCatalog> {
        let questions = (1..=6)
            .map(|id| Question {
                id,
                prompt: format!("question {id}"),
                choices: ["w".into(), "x".into(), "y".into(), "z".into()],
                answer_index: (id as usize) % 4,
                difficulty,
                genre: None,
            })
            .collect();
        Arc::new(QuestionCatalog::from_questions(questions).unwrap())
    }

    fn room_with(max_players: u32, round_cap: RoundCap, difficulty: Difficulty) -> BattleRoom {
        let settings = merge_settings(&SettingsRequest {
            max_players: Some(max_players),
            round_cap: Some(round_cap),
            ..Default::default()
        });
        BattleRoom::new(
            RoomCode::from("TEST1"),
            ANN,
            "ann",
            settings,
            EngineConfig::default(),
            catalog(difficulty),
            StdRng::seed_from_u64(11),
        )
    }

    /// Two seats, HP configured, first question delivered.
    fn duel(hp_ann: i64, hp_bob: i64) -> BattleRoom {
        let mut room = room_with(2, RoundCap::Finite(10), Difficulty::Easy);
        room.join(BOB, "bob").unwrap();
        room.configure_hp(ANN, &BTreeMap::from([(ANN, hp_ann), (BOB, hp_bob)]))
            .unwrap();
        deliver(&mut room);
        room
    }

    fn trio(round_cap: RoundCap) -> BattleRoom {
        let mut room = room_with(3, round_cap, Difficulty::Normal);
        room.join(BOB, "bob").unwrap();
        room.join(CY, "cy").unwrap();
        room.configure_hp(ANN, &BTreeMap::new()).unwrap();
        deliver(&mut room);
        room
    }

    fn deliver(room: &mut BattleRoom) -> Outbox {
        let generation = room.generation();
        room.on_timer(TimerKind::Countdown, generation)
    }

    fn answer(room: &mut BattleRoom, seat: SeatId, correct: bool, elapsed: f64) -> Outbox {
        let q = room.current_question().unwrap();
        let (id, right) = (q.id, q.answer_index);
        let choice = if correct { right } else { (right + 1) % 4 };
        room.submit_answer(seat, id, Some(choice), Some(elapsed))
    }

    fn count<F: Fn(&ServerMessage) -> bool>(out: &Outbox, pred: F) -> usize {
        out.iter().filter(|(_, m)| pred(m)).count()
    }

    fn result_for(out: &Outbox, seat: SeatId) -> RoundResult {
        out.iter()
            .find_map(|(r, m)| match (r, m) {
                (Recipient::Seat(s), ServerMessage::RoundResult(res)) if *s == seat => Some(res.clone()),
                _ => None,
            })
            .expect("round result for seat")
    }

    // --- seating ---------------------------------------------------------

    #[test]
    fn test_filling_last_seat_opens_hp_config() {
        let mut room = room_with(2, RoundCap::Finite(10), Difficulty::Easy);
        let out = room.join(BOB, "bob").unwrap();

        assert!(matches!(
            &out[0],
            (Recipient::Seat(BOB), ServerMessage::RoomJoined { seat_id: BOB, .. })
        ));
        assert!(matches!(
            &out[1],
            (Recipient::All, ServerMessage::RoomReadyForHpConfig { players, .. }) if players.len() == 2
        ));
        assert_eq!(room.lifecycle(), Lifecycle::WaitingForHpConfig);
    }

    #[test]
    fn test_three_seat_room_waits_for_third() {
        let mut room = room_with(3, RoundCap::Finite(10), Difficulty::Easy);
        let out = room.join(BOB, "bob").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(room.lifecycle(), Lifecycle::WaitingForPlayers);
        room.join(CY, "").unwrap();
        assert_eq!(room.lifecycle(), Lifecycle::WaitingForHpConfig);
        assert_eq!(room.snapshot().players[2].name, "Player 3");
    }

    #[test]
    fn test_join_full_room_fails() {
        let mut room = room_with(2, RoundCap::Finite(10), Difficulty::Easy);
        room.join(BOB, "bob").unwrap();
        assert!(matches!(room.join(CY, "cy"), Err(RoomError::RoomFull(_))));
        assert!(matches!(room.join(BOB, "bob"), Err(RoomError::AlreadySeated(..))));
        assert_eq!(room.seat_count(), 2);
    }

    #[test]
    fn test_join_closed_room_fails() {
        let mut room = room_with(2, RoundCap::Finite(10), Difficulty::Easy);
        room.join(BOB, "bob").unwrap();
        room.leave(BOB);
        assert!(matches!(room.join(CY, "cy"), Err(RoomError::Closed(_))));
    }

    // --- hp barrier ------------------------------------------------------

    #[test]
    fn test_configure_hp_by_non_host_rejected() {
        let mut room = room_with(2, RoundCap::Finite(10), Difficulty::Easy);
        room.join(BOB, "bob").unwrap();
        assert!(matches!(
            room.configure_hp(BOB, &BTreeMap::new()),
            Err(RoomError::NotHost)
        ));
        assert_eq!(room.lifecycle(), Lifecycle::WaitingForHpConfig);
        assert_eq!(room.round(), 0);
    }

    #[test]
    fn test_configure_hp_before_room_full_ignored() {
        let mut room = room_with(2, RoundCap::Finite(10), Difficulty::Easy);
        let out = room.configure_hp(ANN, &BTreeMap::new()).unwrap();
        assert!(out.is_empty());
        assert_eq!(room.lifecycle(), Lifecycle::WaitingForPlayers);
    }

    #[test]
    fn test_configure_hp_coerces_and_starts_countdown() {
        let mut room = room_with(3, RoundCap::Finite(10), Difficulty::Hard);
        room.join(BOB, "bob").unwrap();
        room.join(CY, "cy").unwrap();
        let out = room
            .configure_hp(ANN, &BTreeMap::from([(ANN, 0), (BOB, -5)]))
            .unwrap();

        assert_eq!(room.hp(ANN), Some(1));
        assert_eq!(room.hp(BOB), Some(1));
        assert_eq!(room.hp(CY), Some(20));
        assert_eq!(room.lifecycle(), Lifecycle::Playing);
        assert_eq!(room.phase(), RoundPhase::Countdown);
        assert_eq!(room.round(), 1);

        assert!(matches!(&out[0].1, ServerMessage::GameStart { initial_hp, .. } if initial_hp[&CY] == 20));
        assert!(matches!(
            &out[1].1,
            ServerMessage::CountdownStart { seconds: 3, difficulty: Difficulty::Hard }
        ));
        assert_eq!(
            room.wanted_timer().map(|t| t.kind),
            Some(TimerKind::Countdown)
        );
    }

    // --- countdown and answers -------------------------------------------

    #[test]
    fn test_stale_countdown_fire_ignored() {
        let mut room = room_with(2, RoundCap::Finite(10), Difficulty::Easy);
        room.join(BOB, "bob").unwrap();
        room.configure_hp(ANN, &BTreeMap::new()).unwrap();

        let old = room.generation() - 1;
        assert!(room.on_timer(TimerKind::Countdown, old).is_empty());
        assert_eq!(room.phase(), RoundPhase::Countdown);

        let out = deliver(&mut room);
        assert!(matches!(
            &out[..],
            [(Recipient::All, ServerMessage::Question { round: 1, time_limit_seconds: 30, .. })]
        ));
        assert_eq!(room.phase(), RoundPhase::AnswerWindow);
        assert_eq!(
            room.wanted_timer().map(|t| (t.kind, t.after.as_secs())),
            Some((TimerKind::AnswerDeadline, 32))
        );
    }

    #[test]
    fn test_answers_before_delivery_are_dropped() {
        let mut room = room_with(2, RoundCap::Finite(10), Difficulty::Easy);
        room.join(BOB, "bob").unwrap();
        room.configure_hp(ANN, &BTreeMap::new()).unwrap();
        assert!(answer(&mut room, ANN, true, 1.0).is_empty());
        assert!(answer(&mut room, BOB, true, 1.0).is_empty());
        assert_eq!(room.phase(), RoundPhase::Countdown);
    }

    #[test]
    fn test_mismatched_and_duplicate_answers_dropped() {
        let mut room = duel(20, 20);
        let live = room.current_question().unwrap().id;

        assert!(room.submit_answer(ANN, live + 100, Some(0), Some(1.0)).is_empty());
        assert!(answer(&mut room, ANN, true, 1.0).is_empty());
        assert!(answer(&mut room, ANN, false, 0.5).is_empty(), "second answer ignored");
        assert!(room.submit_answer(SeatId(99), live, Some(0), Some(1.0)).is_empty());
        assert_eq!(room.phase(), RoundPhase::AnswerWindow);

        let out = answer(&mut room, BOB, false, 2.0);
        assert_eq!(count(&out, |m| matches!(m, ServerMessage::RoundResult(_))), 2);
        assert_eq!(room.hp(BOB), Some(15), "2 base + 3 speed bonus");
    }

    #[test]
    fn test_round_resolves_exactly_once() {
        let mut room = duel(20, 20);
        answer(&mut room, ANN, true, 1.0);
        let first = answer(&mut room, BOB, true, 4.0);
        assert!(!first.is_empty());
        let again = answer(&mut room, BOB, true, 4.0);
        assert!(again.is_empty());
        assert_eq!(room.hp(BOB), Some(15));
        assert_eq!(room.hp(ANN), Some(20));
    }

    #[test]
    fn test_round_result_is_per_seat() {
        let mut room = duel(20, 20);
        let right = room.current_question().unwrap().answer_index;
        answer(&mut room, ANN, true, 2.5);
        let out = answer(&mut room, BOB, false, 1.0);

        let ann = result_for(&out, ANN);
        let bob = result_for(&out, BOB);
        assert_eq!(ann.your_answer, Some(right));
        assert_eq!(bob.your_answer, Some((right + 1) % 4));
        assert_eq!(ann.correct_index, right);
        assert_eq!(ann.message, "ann answered correctly and dealt 3 damage to bob.");
        assert!(ann.can_continue);
        assert!(ann.game_over.is_none());
        assert_eq!(room.phase(), RoundPhase::AwaitingNext);
        assert_eq!(room.wanted_timer(), None);
    }

    #[test]
    fn test_dead_heat_deals_no_damage() {
        let mut room = duel(20, 20);
        answer(&mut room, ANN, true, 1.5);
        let out = answer(&mut room, BOB, true, 1.5);
        assert_eq!(room.hp(ANN), Some(20));
        assert_eq!(room.hp(BOB), Some(20));
        assert!(result_for(&out, ANN).message.contains("same moment"));
    }

    // --- answer deadline -------------------------------------------------

    #[test]
    fn test_answer_deadline_fills_missing_answers() {
        let mut room = duel(20, 20);
        answer(&mut room, ANN, true, 4.0);
        let generation = room.generation();
        let out = room.on_timer(TimerKind::AnswerDeadline, generation);

        let bob = result_for(&out, BOB);
        assert_eq!(bob.your_answer, None);
        assert_eq!(room.hp(BOB), Some(18));
        assert_eq!(room.phase(), RoundPhase::AwaitingNext);
    }

    #[test]
    fn test_answer_deadline_with_no_answers_resolves_round() {
        let mut room = duel(20, 20);
        let generation = room.generation();
        let out = room.on_timer(TimerKind::AnswerDeadline, generation);
        assert_eq!(count(&out, |m| matches!(m, ServerMessage::RoundResult(_))), 2);
        assert_eq!(room.hp(ANN), Some(20));
        assert_eq!(room.hp(BOB), Some(20));
    }

    // --- next-round barrier ----------------------------------------------

    #[test]
    fn test_next_round_waits_for_every_active_seat() {
        let mut room = duel(20, 20);
        answer(&mut room, ANN, false, 1.0);
        answer(&mut room, BOB, false, 1.0);

        assert!(room.ready_for_next(ANN).is_empty());
        assert!(room.ready_for_next(ANN).is_empty(), "duplicate ack does not count twice");
        let out = room.request_next(BOB);
        assert!(matches!(&out[..], [(Recipient::All, ServerMessage::CountdownStart { .. })]));
        assert_eq!(room.round(), 2);
        assert_eq!(room.phase(), RoundPhase::Countdown);
    }

    #[test]
    fn test_ready_outside_barrier_ignored() {
        let mut room = duel(20, 20);
        assert!(room.ready_for_next(ANN).is_empty());
        assert!(room.ready_for_next(BOB).is_empty());
        assert_eq!(room.round(), 1);
        assert_eq!(room.phase(), RoundPhase::AnswerWindow);
    }

    #[test]
    fn test_no_repeated_question_until_pool_recycles() {
        let mut room = duel(20, 20);
        let mut seen = HashSet::new();
        for _ in 0..6 {
            assert!(seen.insert(room.current_question().unwrap().id));
            answer(&mut room, ANN, false, 1.0);
            answer(&mut room, BOB, false, 1.0);
            room.ready_for_next(ANN);
            room.ready_for_next(BOB);
            deliver(&mut room);
        }
        assert_eq!(room.snapshot().used_question_count, 1, "seventh draw recycled");
    }

    // --- termination -----------------------------------------------------

    #[test]
    fn test_duel_ends_when_hp_reaches_zero() {
        let mut room = duel(10, 5);
        answer(&mut room, ANN, true, 1.0);
        let out = answer(&mut room, BOB, false, 1.0);

        let info = result_for(&out, BOB).game_over.unwrap();
        assert_eq!(info.winner, Winner::Seat(ANN));
        assert_eq!(info.final_hp[&BOB], 0);
        assert!(!result_for(&out, ANN).can_continue);
        assert_eq!(count(&out, |m| matches!(m, ServerMessage::GameOver(_))), 1);
        assert!(matches!(
            out.last(),
            Some((Recipient::All, ServerMessage::RoomState(s))) if s.lifecycle == Lifecycle::Finished
        ));
        assert_eq!(room.lifecycle(), Lifecycle::Finished);
        assert_eq!(room.wanted_timer(), None);
        assert!(room.ready_for_next(ANN).is_empty());
    }

    #[test]
    fn test_duel_round_cap_compares_hp() {
        let mut room = room_with(2, RoundCap::Finite(1), Difficulty::Easy);
        room.join(BOB, "bob").unwrap();
        room.configure_hp(ANN, &BTreeMap::new()).unwrap();
        deliver(&mut room);
        answer(&mut room, ANN, false, 1.0);
        let out = answer(&mut room, BOB, true, 5.0);

        let info = result_for(&out, ANN).game_over.unwrap();
        assert_eq!(info.winner, Winner::Seat(BOB));
        assert_eq!(room.lifecycle(), Lifecycle::Finished);
    }

    // --- three seats -----------------------------------------------------

    #[test]
    fn test_trio_elimination_is_sticky() {
        let mut room = room_with(3, RoundCap::Infinite, Difficulty::Normal);
        room.join(BOB, "bob").unwrap();
        room.join(CY, "cy").unwrap();
        room.configure_hp(ANN, &BTreeMap::from([(CY, 3)])).unwrap();
        deliver(&mut room);

        answer(&mut room, ANN, true, 1.0);
        answer(&mut room, BOB, true, 2.0);
        let out = answer(&mut room, CY, false, 0.5);
        assert_eq!(room.hp(CY), Some(0));
        assert_eq!(room.hp(BOB), Some(18));
        assert!(result_for(&out, ANN).can_continue);
        assert_eq!(room.active_count(), 2);

        room.ready_for_next(CY);
        room.ready_for_next(ANN);
        room.ready_for_next(BOB);
        deliver(&mut room);

        assert!(answer(&mut room, CY, true, 0.1).is_empty(), "eliminated seat cannot answer");
        answer(&mut room, ANN, true, 1.0);
        let out = answer(&mut room, BOB, false, 1.0);
        assert_eq!(result_for(&out, CY).your_answer, None);
        assert_eq!(room.hp(CY), Some(0));
        assert_eq!(room.hp(BOB), Some(12));
    }

    #[test]
    fn test_trio_continues_past_round_cap() {
        let mut room = trio(RoundCap::Finite(1));
        answer(&mut room, ANN, false, 1.0);
        answer(&mut room, BOB, false, 1.0);
        let out = answer(&mut room, CY, false, 1.0);
        assert!(result_for(&out, ANN).can_continue);

        assert!(room.request_next(ANN).is_empty(), "request-next refused at the cap");
        room.ready_for_next(ANN);
        room.ready_for_next(BOB);
        let out = room.ready_for_next(CY);
        assert!(!out.is_empty());
        assert_eq!(room.round(), 2);
    }

    #[test]
    fn test_trio_last_standing_wins() {
        let mut room = room_with(3, RoundCap::Finite(10), Difficulty::Normal);
        room.join(BOB, "bob").unwrap();
        room.join(CY, "cy").unwrap();
        room.configure_hp(ANN, &BTreeMap::from([(ANN, 5), (BOB, 5), (CY, 5)]))
            .unwrap();
        deliver(&mut room);

        answer(&mut room, ANN, true, 1.0);
        answer(&mut room, BOB, false, 1.0);
        let out = answer(&mut room, CY, false, 1.0);
        let info = result_for(&out, BOB).game_over.unwrap();
        assert_eq!(info.winner, Winner::Seat(ANN));
        assert_eq!(room.lifecycle(), Lifecycle::Finished);
    }

    // --- replay ----------------------------------------------------------

    fn finished_duel() -> BattleRoom {
        let mut room = duel(10, 5);
        answer(&mut room, ANN, true, 1.0);
        answer(&mut room, BOB, false, 1.0);
        assert_eq!(room.lifecycle(), Lifecycle::Finished);
        room
    }

    #[test]
    fn test_replay_requires_host_and_ready_seats() {
        let mut room = finished_duel();
        assert!(matches!(room.start_replay(BOB), Err(RoomError::NotHost)));
        assert!(room.start_replay(ANN).unwrap().is_empty(), "bob not ready yet");

        let out = room.replay_ready(BOB);
        assert!(matches!(
            &out[..],
            [(Recipient::All, ServerMessage::RoomState(s))] if s.players[1].replay_ready
        ));

        let out = room.start_replay(ANN).unwrap();
        match &out[0] {
            (Recipient::All, ServerMessage::RoomState(s)) => {
                assert_eq!(s.round, 0);
                assert_eq!(s.used_question_count, 0);
                assert_eq!(s.lifecycle, Lifecycle::Playing);
                assert_eq!(s.players[0].hp, 10);
                assert_eq!(s.players[1].hp, 5);
                assert!(s.players.iter().all(|p| !p.is_eliminated && !p.replay_ready));
            }
            other => panic!("expected RoomState first, got {other:?}"),
        }
        assert!(matches!(out[1].1, ServerMessage::GameStart { .. }));
        assert!(matches!(out[2].1, ServerMessage::CountdownStart { .. }));
        assert_eq!(room.round(), 1);
        assert_eq!(room.phase(), RoundPhase::Countdown);
    }

    #[test]
    fn test_replay_ready_before_finish_ignored() {
        let mut room = duel(20, 20);
        assert!(room.replay_ready(BOB).is_empty());
    }

    // --- abort -----------------------------------------------------------

    #[test]
    fn test_abort_is_host_only_and_stales_timers() {
        let mut room = room_with(2, RoundCap::Finite(10), Difficulty::Easy);
        room.join(BOB, "bob").unwrap();
        room.configure_hp(ANN, &BTreeMap::new()).unwrap();
        let pending = room.wanted_timer().unwrap();

        assert!(matches!(room.abort(BOB), Err(RoomError::NotHost)));
        let out = room.abort(ANN).unwrap();
        assert!(matches!(
            &out[0].1,
            ServerMessage::GameAborted { reason, .. } if reason == ABORTED_BY_HOST
        ));
        assert!(matches!(&out[1].1, ServerMessage::RoomState(_)));
        assert_eq!(room.lifecycle(), Lifecycle::Finished);

        assert!(room.on_timer(pending.kind, pending.generation).is_empty());
        assert_eq!(room.phase(), RoundPhase::Finished);
        assert!(room.abort(ANN).unwrap().is_empty());

        room.replay_ready(BOB);
        assert!(!room.start_replay(ANN).unwrap().is_empty(), "aborted room can replay");
    }

    // --- departure -------------------------------------------------------

    #[test]
    fn test_leave_mid_match_finishes_room() {
        let mut room = duel(20, 20);
        answer(&mut room, ANN, true, 1.0);
        let out = room.leave(BOB);

        assert!(matches!(
            &out[..],
            [(Recipient::All, ServerMessage::RoomError { message })] if message == OPPONENT_DISCONNECTED
        ));
        assert_eq!(room.lifecycle(), Lifecycle::Finished);
        assert_eq!(room.wanted_timer(), None);
        assert!(answer(&mut room, ANN, true, 1.0).is_empty());
        assert!(room.start_replay(ANN).unwrap().is_empty(), "room lost a seat");
    }

    #[test]
    fn test_leave_finished_room_sends_snapshot() {
        let mut room = finished_duel();
        room.replay_ready(BOB);
        let out = room.leave(BOB);
        assert!(matches!(
            &out[..],
            [(Recipient::All, ServerMessage::RoomState(s))] if s.players.len() == 1
        ));
        assert!(room.start_replay(ANN).unwrap().is_empty());
        assert!(room.leave(ANN).is_empty());
        assert!(room.is_empty());
    }

    #[test]
    fn test_leave_unknown_seat_is_noop() {
        let mut room = duel(20, 20);
        assert!(room.leave(SeatId(42)).is_empty());
        assert_eq!(room.lifecycle(), Lifecycle::Playing);
    }
}
