//! Per-connection handler: message routing and outbound delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The connection is one seat for its whole life; its seat id is the
//! connection id. The loop waits on three things at once:
//!   1. inbound frames → decode → route to the manager, a room, or the
//!      question pool
//!   2. outbound messages pushed by rooms (or by this handler) → encode →
//!      send
//!   3. the heartbeat → ping the peer, or drop it if it stopped answering
//!
//! A client that sends nothing is fine as long as it answers pings; only a
//! dead peer is disconnected.

use std::collections::HashSet;
use std::sync::Arc;

use battlequiz_pool::DrawFilter;
use battlequiz_protocol::{ClientMessage, Codec, SeatId, ServerMessage};
use battlequiz_room::SeatSender;
use battlequiz_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::BattleQuizError;
use crate::server::ServerState;

/// Drop guard that takes the seat out of its room when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct SeatGuard<C: Codec> {
    seat: SeatId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for SeatGuard<C> {
    fn drop(&mut self) {
        let seat = self.seat;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut rooms = state.rooms.lock().await;
            if let Err(e) = rooms.leave(seat).await {
                tracing::debug!(%seat, error = %e, "leave on disconnect failed");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), BattleQuizError> {
    let seat = SeatId(conn.id().into_inner());
    tracing::info!(%seat, peer = %conn.peer_addr(), "client connected");

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let _guard = SeatGuard {
        seat,
        state: Arc::clone(&state),
    };

    let mut heartbeat = tokio::time::interval(state.ping_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%seat, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%seat, error = %e, "recv error");
                        break;
                    }
                };

                match state.codec.decode::<ClientMessage>(&data) {
                    Ok(msg) => handle_client_message(&state, seat, msg, &outbound_tx).await,
                    Err(e) => {
                        tracing::debug!(%seat, error = %e, "failed to decode client message");
                        let _ = outbound_tx.send(ServerMessage::RoomError {
                            message: e.to_string(),
                        });
                    }
                }
            }
            Some(msg) = outbound_rx.recv() => {
                let bytes = state.codec.encode(&msg)?;
                conn.send(&bytes).await?;
            }
            _ = heartbeat.tick() => {
                if conn.last_seen().elapsed() >= state.peer_timeout {
                    tracing::info!(%seat, "peer stopped answering pings, closing");
                    let _ = conn.close().await;
                    break;
                }
                conn.ping().await?;
            }
        }
    }

    // _guard drops here → the seat leaves its room.
    Ok(())
}

/// Routes one decoded client message. Replies go through `outbound` so
/// they stay ordered with whatever the rooms push.
async fn handle_client_message<C: Codec>(
    state: &ServerState<C>,
    seat: SeatId,
    msg: ClientMessage,
    outbound: &SeatSender,
) {
    let result = match msg {
        ClientMessage::CreateRoom { name, settings } => state
            .rooms
            .lock()
            .await
            .create_room(seat, &name, &settings, outbound.clone())
            .map(|_| ()),

        ClientMessage::JoinRoom { room_id, name } => {
            // The manager lock is released while the room processes the
            // join; the room itself sends RoomJoined.
            let handle = state.rooms.lock().await.handle_for_join(seat, &room_id);
            match handle {
                Ok(handle) => match handle.join(seat, name, outbound.clone()).await {
                    Ok(()) => state.rooms.lock().await.record_join(seat, &room_id),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            }
        }

        ClientMessage::DrawQuestion {
            genres,
            difficulties,
            exhaustible,
            used_ids,
        } => {
            let mut used: HashSet<_> = used_ids.into_iter().collect();
            let filter = DrawFilter {
                genres: &genres,
                difficulties: &difficulties,
                exhaustible,
            };
            let reply = match state.catalog.draw(&mut rand::rng(), &mut used, filter) {
                Some(drawn) => ServerMessage::QuestionDrawn {
                    question: Some(drawn.question.clone()),
                    recycled: drawn.recycled,
                },
                None => ServerMessage::QuestionDrawn {
                    question: None,
                    recycled: false,
                },
            };
            let _ = outbound.send(reply);
            Ok(())
        }

        room_msg => match room_msg.room_id().cloned() {
            Some(code) => {
                let handle = state.rooms.lock().await.handle_for_seat(seat, &code);
                match handle {
                    Ok(handle) => handle.send_message(seat, room_msg).await,
                    Err(e) => Err(e),
                }
            }
            None => Ok(()),
        },
    };

    if let Err(e) = result {
        tracing::debug!(%seat, error = %e, "request rejected");
        let _ = outbound.send(ServerMessage::RoomError {
            message: e.to_string(),
        });
    }
}
