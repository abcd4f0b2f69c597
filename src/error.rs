//! Error taxonomy for the simulation and the wire protocol
//!
//! Gameplay rejections (illegal moves, stale slam entries) are not errors and
//! never show up here. Everything below means a caller or a peer broke a rule
//! and the offending operation must stop.

use crate::player::PlayerId;
use thiserror::Error;

/// Failures while encoding, decoding or interpreting a message
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    /// Malformed JSON or an unknown kind label
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    /// A server-to-client message was delivered where an intent was expected
    #[error("{0} is not a player intent")]
    UnexpectedIntent(&'static str),
    #[error("unknown shape type {0}")]
    UnknownShapeType(usize),
    #[error("grid payload does not match {width}x{height}")]
    MalformedGrid { width: usize, height: usize },
}

/// Invariant violations inside the authoritative game
#[derive(Debug, Error)]
pub enum GameError {
    #[error("no player with id {0}")]
    UnknownPlayer(PlayerId),
    #[error("cell ({row}, {col}) is outside the grid, cannot place")]
    OutOfBounds { row: i32, col: i32 },
    #[error("piece of player {player} already overlaps the grid, cannot slam")]
    IllegalSlam { player: PlayerId },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
