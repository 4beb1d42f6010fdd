//! Unified error type for the BattleQuiz server.

use battlequiz_pool::CatalogError;
use battlequiz_protocol::ProtocolError;
use battlequiz_room::RoomError;
use battlequiz_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BattleQuizError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The question catalog could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A room-level error (full, not found, not host).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Bad or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
