pub extern crate bincode;
pub extern crate serde;
pub extern crate serde_json;

mod code;
mod error;
mod lobby;
mod message;
mod scoring;
mod types;
mod words;

pub use code::{generate_code, validate_code, GENERATED_CODE_LEN};
pub use error::GameError;
pub use lobby::{
    GameSettings, LeaveOutcome, LobbyState, LobbyStatus, Modifiers, Player, WordCategories,
};
pub use message::{
    CommandResult, DrawingEvent, GameCommand, GameEvent, IdentifiableCommand, IdentifiableEvent,
};
pub use scoring::{default_score, ScoreFn};
pub use types::{Color, CommandId, ConnectionId, Point};
pub use words::WordBag;
