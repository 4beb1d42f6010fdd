//! Battle rooms for BattleQuiz.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns one
//! [`BattleRoom`] state machine and one round timer.
//!
//! # Key types
//!
//! - [`BattleRoom`] — the per-room rules: seats, HP barrier, rounds,
//!   readiness barriers, replay
//! - [`damage`] — the pure damage resolution engine
//! - [`RoomManager`] — allocates room codes, seats players, routes messages
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`EngineConfig`] — server-wide timings and code format
//! - [`merge_settings`] — the one place client settings become canonical

mod battle;
mod config;
pub mod damage;
mod error;
mod manager;
mod room;

pub use battle::{BattleRoom, Outbox};
pub use config::{merge_settings, EngineConfig, RoundPhase};
pub use error::RoomError;
pub use manager::RoomManager;
pub use room::{RoomHandle, SeatSender};
