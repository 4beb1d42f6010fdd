//! # BattleQuiz
//!
//! Server for a 2–3 player HP quiz battle.
//!
//! Players connect over WebSocket, one seat per connection. A host opens
//! a room, the others join by code, the host assigns starting HP, and the
//! room then plays timed multiple-choice rounds until one seat is left
//! standing or the round cap decides it.
//!
//! The layers, bottom to top:
//!
//! ```text
//! transport (frames) → protocol (messages) → pool (questions)
//!     → room (battle state, one actor per room) → server (this crate)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use battlequiz::prelude::*;
//!
//! # async fn run() -> Result<(), BattleQuizError> {
//! let catalog = Arc::new(QuestionCatalog::load("questions.json")?);
//! let server = BattleQuizServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build(catalog)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{LimitsConfig, ServerConfig};
pub use error::BattleQuizError;
pub use server::{BattleQuizServer, BattleQuizServerBuilder};

pub mod prelude {
    pub use crate::{
        BattleQuizError, BattleQuizServer, BattleQuizServerBuilder, LimitsConfig, ServerConfig,
    };
    pub use battlequiz_pool::{CatalogError, QuestionCatalog};
    pub use battlequiz_protocol::{
        ClientMessage, Codec, Difficulty, GameOverInfo, GenreFilter, JsonCodec, Lifecycle,
        ProtocolError, Question, QuestionView, RoomCode, RoomSettings, RoomSnapshot, RoundCap,
        RoundResult, SeatId, SeatSnapshot, SeatSummary, ServerMessage, SettingsRequest, Winner,
    };
    pub use battlequiz_room::{EngineConfig, RoomError};
    pub use battlequiz_transport::TransportError;
}
