use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::lobby::{GameSettings, Player};
use crate::types::{Color, CommandId, ConnectionId, Point};

/// One drawing primitive, relayed without touching durable state.
/// `Snapshot` carries an encoded raster and becomes the reconciliation
/// baseline for late joiners and undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawingEvent {
    Line {
        from: Point,
        to: Point,
        color: Color,
        width: f32,
    },
    Dot {
        point: Point,
        color: Color,
        width: f32,
    },
    Fill {
        point: Point,
        color: Color,
    },
    Clear,
    Snapshot {
        raster: Vec<u8>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifiableCommand {
    pub command_id: CommandId,
    pub command: GameCommand,
}

/// Everything a client may ask of the coordinator. Deserialization at the
/// connection boundary is the schema check; nothing loosely typed gets
/// past it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GameCommand {
    CreateLobby {
        code: String,
        username: String,
        settings: GameSettings,
    },
    JoinLobby {
        code: String,
        username: String,
    },
    LeaveLobby {
        code: String,
    },
    UpdateSettings {
        code: String,
        settings: GameSettings,
    },
    StartGame {
        code: String,
    },
    VerifyLobby {
        code: String,
    },
    Guess {
        code: String,
        text: String,
    },
    RerollWord {
        code: String,
    },
    Draw {
        code: String,
        event: DrawingEvent,
    },
}

impl GameCommand {
    /// Routing key; every command addresses exactly one lobby.
    pub fn code(&self) -> &str {
        match self {
            GameCommand::CreateLobby { code, .. }
            | GameCommand::JoinLobby { code, .. }
            | GameCommand::LeaveLobby { code }
            | GameCommand::UpdateSettings { code, .. }
            | GameCommand::StartGame { code }
            | GameCommand::VerifyLobby { code }
            | GameCommand::Guess { code, .. }
            | GameCommand::RerollWord { code }
            | GameCommand::Draw { code, .. } => code,
        }
    }
}

/// Lobby-state broadcasts always carry the canonical player list, never a
/// delta; clients only render what they receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    LobbyCreated {
        code: String,
    },
    LobbyJoined {
        code: String,
        players: Vec<Player>,
        settings: GameSettings,
    },
    PlayerJoined {
        players: Vec<Player>,
    },
    PlayerLeft {
        players: Vec<Player>,
    },
    LeftLobby,
    SettingsUpdated {
        settings: GameSettings,
    },
    GameStarted {
        players: Vec<Player>,
    },
    LobbyVerified {
        exists: bool,
    },
    TurnStarted {
        drawer: ConnectionId,
        round: u32,
        turn: usize,
        players: Vec<Player>,
    },
    /// Sent to the drawer only.
    WordAssigned {
        word: String,
    },
    /// Sent to the drawer only.
    WordRerolled {
        word: String,
    },
    TimerUpdate {
        remaining: u32,
    },
    GuessSubmitted {
        from: ConnectionId,
        text: String,
    },
    CorrectGuess {
        from: ConnectionId,
        players: Vec<Player>,
    },
    TurnEnded {
        word: String,
        players: Vec<Player>,
    },
    GameFinished {
        players: Vec<Player>,
    },
    Draw {
        from: ConnectionId,
        event: DrawingEvent,
    },
    /// Correlated ack for the drawer's own stroke; the stroke itself is
    /// only broadcast to the other members.
    DrawAccepted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandResult {
    Event(GameEvent),
    Error(GameError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IdentifiableEvent {
    /// Correlated response to one of this connection's own commands.
    ByMyself {
        command_id: CommandId,
        result: CommandResult,
    },
    /// Uncorrelated room broadcast.
    BySystem { event: GameEvent },
}
