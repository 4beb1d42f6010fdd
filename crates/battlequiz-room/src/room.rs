//! Room actor: an isolated Tokio task that owns one battle room.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. The task also owns the room's round timer, so
//! client messages and timer fires are handled one at a time, never
//! concurrently.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use battlequiz_pool::QuestionCatalog;
use battlequiz_protocol::{
    ClientMessage, Recipient, RoomCode, RoomSettings, RoomSnapshot, SeatId, ServerMessage,
};
use battlequiz_timer::RoundTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};

use crate::{BattleRoom, EngineConfig, Outbox, RoomError};

/// Channel sender for delivering outbound messages to a seat's connection.
pub type SeatSender = mpsc::UnboundedSender<ServerMessage>;

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in some variants is a reply channel: the caller
/// sends a command and waits for the response on it.
pub(crate) enum RoomCommand {
    /// Seat a player.
    Join {
        seat: SeatId,
        name: String,
        sender: SeatSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Remove a seat. Replies with the number of seats left.
    Leave {
        seat: SeatId,
        reply: oneshot::Sender<usize>,
    },

    /// Deliver a client message from a seated player.
    Client { seat: SeatId, msg: ClientMessage },

    /// Request the current room snapshot.
    GetSnapshot { reply: oneshot::Sender<RoomSnapshot> },

    /// Shut down the room.
    Shutdown,
}

/// Handle to a running room actor. Used to send commands to it.
///
/// This is cheap to clone, it's just an `mpsc::Sender` wrapper.
/// The `RoomManager` holds one of these per room.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.code.clone())
    }

    /// Sends a join request to the room.
    pub async fn join(&self, seat: SeatId, name: String, sender: SeatSender) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                seat,
                name,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Removes a seat and returns how many seats remain.
    pub async fn leave(&self, seat: SeatId) -> Result<usize, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave { seat, reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Forwards a client message to the room (fire-and-forget).
    pub async fn send_message(&self, seat: SeatId, msg: ClientMessage) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Client { seat, msg })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Requests the current room snapshot.
    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetSnapshot { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room: BattleRoom,
    timer: RoundTimer,
    /// Per-seat outbound channels.
    senders: HashMap<SeatId, SeatSender>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room.code(), "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle_command(cmd).is_break() {
                        break;
                    }
                }
                fired = self.timer.wait_for_fire() => {
                    let out = self.room.on_timer(fired.kind, fired.generation);
                    self.dispatch(out);
                }
            }
            self.timer.sync(self.room.wanted_timer());
        }

        tracing::info!(room_id = %self.room.code(), "room actor stopped");
    }

    /// Applies one command. `Break` means the actor should stop.
    fn handle_command(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Join {
                seat,
                name,
                sender,
                reply,
            } => {
                let result = match self.room.join(seat, &name) {
                    Ok(out) => {
                        self.senders.insert(seat, sender);
                        self.dispatch(out);
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            RoomCommand::Leave { seat, reply } => {
                self.senders.remove(&seat);
                let out = self.room.leave(seat);
                self.dispatch(out);
                let _ = reply.send(self.room.seat_count());
            }
            RoomCommand::Client { seat, msg } => self.handle_client(seat, msg),
            RoomCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.room.snapshot());
            }
            RoomCommand::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn handle_client(&mut self, seat: SeatId, msg: ClientMessage) {
        if !self.senders.contains_key(&seat) {
            tracing::warn!(room_id = %self.room.code(), %seat, "message from non-member, ignoring");
            return;
        }

        let result = match msg {
            ClientMessage::ConfigureHp { initial_hp, .. } => self.room.configure_hp(seat, &initial_hp),
            ClientMessage::SubmitAnswer {
                question_id,
                choice_index,
                elapsed_seconds,
                ..
            } => Ok(self
                .room
                .submit_answer(seat, question_id, choice_index, elapsed_seconds)),
            ClientMessage::RequestNext { .. } => Ok(self.room.request_next(seat)),
            ClientMessage::ReadyForNext { .. } => Ok(self.room.ready_for_next(seat)),
            ClientMessage::ReplayReady { .. } => Ok(self.room.replay_ready(seat)),
            ClientMessage::StartReplay { .. } => self.room.start_replay(seat),
            ClientMessage::Abort { .. } => self.room.abort(seat),
            ClientMessage::CreateRoom { .. }
            | ClientMessage::JoinRoom { .. }
            | ClientMessage::DrawQuestion { .. } => {
                tracing::debug!(room_id = %self.room.code(), %seat, "non-room message routed to room, ignoring");
                Ok(Vec::new())
            }
        };

        match result {
            Ok(out) => self.dispatch(out),
            Err(e) => {
                tracing::debug!(room_id = %self.room.code(), %seat, error = %e, "room operation rejected");
                self.send_to(seat, ServerMessage::RoomError { message: e.to_string() });
            }
        }
    }

    /// Dispatches outbound messages to the correct recipients.
    fn dispatch(&self, msgs: Outbox) {
        for (recipient, msg) in msgs {
            match recipient {
                Recipient::All => {
                    for seat in self.senders.keys() {
                        self.send_to(*seat, msg.clone());
                    }
                }
                Recipient::Seat(seat) => self.send_to(seat, msg),
            }
        }
    }

    /// Sends an outbound message to a single seat. Silently drops if the
    /// receiver is gone (connection closed).
    fn send_to(&self, seat: SeatId, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(&seat) {
            let _ = sender.send(msg);
        }
    }
}

/// Spawns a room actor with the host already seated and returns a handle.
///
/// The host receives `RoomCreated` before anything else the room sends.
/// `engine.channel_size` bounds the command channel.
pub(crate) fn spawn_room(
    code: RoomCode,
    host: SeatId,
    host_name: &str,
    host_sender: SeatSender,
    settings: RoomSettings,
    engine: &EngineConfig,
    catalog: Arc<QuestionCatalog>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(engine.channel_size);

    let room = BattleRoom::new(
        code.clone(),
        host,
        host_name,
        settings.clone(),
        engine.clone(),
        catalog,
        StdRng::from_os_rng(),
    );
    let actor = RoomActor {
        room,
        timer: RoundTimer::new(),
        senders: HashMap::from([(host, host_sender)]),
        receiver: rx,
    };
    actor.send_to(
        host,
        ServerMessage::RoomCreated {
            room_id: code.clone(),
            seat_id: host,
            settings,
        },
    );

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
