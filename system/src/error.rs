use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything that can go wrong with a command, as seen by the client.
///
/// Errors are delivered only to the originating connection, correlated by
/// command id; they never leak into room broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("lobby not found")]
    NotFound,
    #[error("lobby code already in use")]
    DuplicateCode,
    #[error("command requires a privilege the sender does not hold")]
    Authorization,
    #[error("lobby is full")]
    Capacity,
    #[error("command is not valid in the lobby's current state")]
    StateConflict,
    #[error("storage failure: {0}")]
    Persistence(String),
    #[error("invalid payload: {0}")]
    Validation(String),
}
