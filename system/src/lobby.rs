use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::GameError;
use crate::types::ConnectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyStatus {
    Waiting,
    Playing,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub connection_id: ConnectionId,
    pub username: String,
    pub score: u32,
    pub is_drawing: bool,
    pub is_host: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCategories {
    pub agents: bool,
    pub weapons: bool,
}

impl WordCategories {
    pub fn is_empty(&self) -> bool {
        !self.agents && !self.weapons
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub reduce_time_on_guess: bool,
    pub allow_reroll: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Seconds each drawer gets per turn.
    pub drawing_time: u32,
    pub rounds: u32,
    pub max_players: usize,
    /// Seconds left on the clock after the first correct guess, when
    /// `reduce_time_on_guess` is set.
    pub first_guess_delay: u32,
    pub categories: WordCategories,
    pub modifiers: Modifiers,
}

impl std::default::Default for GameSettings {
    fn default() -> Self {
        Self {
            drawing_time: 90,
            rounds: 3,
            max_players: 8,
            first_guess_delay: 15,
            categories: WordCategories {
                agents: true,
                weapons: true,
            },
            modifiers: Modifiers {
                reduce_time_on_guess: false,
                allow_reroll: false,
            },
        }
    }
}

impl GameSettings {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.drawing_time < 10 || self.drawing_time > 300 {
            return Err(GameError::Validation(
                "drawing_time must be between 10 and 300 seconds".into(),
            ));
        }
        if self.rounds < 1 || self.rounds > 10 {
            return Err(GameError::Validation(
                "rounds must be between 1 and 10".into(),
            ));
        }
        if self.max_players < 2 || self.max_players > 16 {
            return Err(GameError::Validation(
                "max_players must be between 2 and 16".into(),
            ));
        }
        if self.first_guess_delay > self.drawing_time {
            return Err(GameError::Validation(
                "first_guess_delay cannot exceed drawing_time".into(),
            ));
        }
        if self.categories.is_empty() {
            return Err(GameError::Validation(
                "at least one word category must be enabled".into(),
            ));
        }
        Ok(())
    }
}

/// What `LobbyState::leave` did, so the caller can react.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub host_migrated: bool,
    pub was_drawing: bool,
    pub now_empty: bool,
}

/// The persisted record for one lobby. All membership and progress
/// mutations go through the methods here; the server side only decides
/// when to call them and what to broadcast afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyState {
    pub code: String,
    pub players: Vec<Player>,
    pub current_round: u32,
    /// Index of the current (or next, while waiting) drawer.
    pub current_turn: usize,
    pub settings: GameSettings,
    pub status: LobbyStatus,
    pub host: ConnectionId,
    pub updated_at: u64,
}

impl LobbyState {
    pub fn new(
        code: String,
        host: ConnectionId,
        username: String,
        settings: GameSettings,
    ) -> Self {
        Self {
            code,
            players: vec![Player {
                connection_id: host,
                username,
                score: 0,
                is_drawing: false,
                is_host: true,
            }],
            current_round: 0,
            current_turn: 0,
            settings,
            status: LobbyStatus::Waiting,
            host,
            updated_at: epoch_secs(),
        }
    }

    pub fn player(&self, connection_id: ConnectionId) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.connection_id == connection_id)
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.player(connection_id).is_some()
    }

    pub fn is_host(&self, connection_id: ConnectionId) -> bool {
        self.host == connection_id && self.contains(connection_id)
    }

    pub fn drawer(&self) -> Option<ConnectionId> {
        self.players
            .iter()
            .find(|p| p.is_drawing)
            .map(|p| p.connection_id)
    }

    /// Stamp the record before a write-through save.
    pub fn touch(&mut self) {
        self.updated_at = epoch_secs();
    }

    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        username: String,
    ) -> Result<(), GameError> {
        if self.status != LobbyStatus::Waiting {
            return Err(GameError::StateConflict);
        }
        if self.players.len() >= self.settings.max_players {
            return Err(GameError::Capacity);
        }
        // the first seat of an empty lobby takes host authority
        let is_host = self.players.is_empty();
        if is_host {
            self.host = connection_id;
        }
        self.players.push(Player {
            connection_id,
            username,
            score: 0,
            is_drawing: false,
            is_host,
        });
        Ok(())
    }

    /// Strips a persisted record of everything tied to the process that
    /// wrote it. Connections do not survive a restart, so membership and
    /// progress reset while the code and settings carry over; the next
    /// join takes the empty lobby's host seat.
    pub fn revive(&mut self) {
        self.players.clear();
        self.status = LobbyStatus::Waiting;
        self.current_round = 0;
        self.current_turn = 0;
    }

    /// Removes a player. Host authority migrates to the longest-tenured
    /// survivor (front of the list). While playing, the turn pointer is
    /// shifted so it keeps addressing the same seat.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Option<LeaveOutcome> {
        let idx = self
            .players
            .iter()
            .position(|p| p.connection_id == connection_id)?;
        let removed = self.players.remove(idx);

        if self.players.is_empty() {
            return Some(LeaveOutcome {
                host_migrated: false,
                was_drawing: removed.is_drawing,
                now_empty: true,
            });
        }

        let mut host_migrated = false;
        if removed.is_host {
            self.players[0].is_host = true;
            self.host = self.players[0].connection_id;
            host_migrated = true;
        }

        if idx < self.current_turn {
            self.current_turn -= 1;
        } else if self.current_turn >= self.players.len() {
            // The departed seat was the last of the round.
            self.current_turn = 0;
            if self.status == LobbyStatus::Playing {
                self.current_round += 1;
            }
        }

        Some(LeaveOutcome {
            host_migrated,
            was_drawing: removed.is_drawing,
            now_empty: false,
        })
    }

    pub fn update_settings(
        &mut self,
        connection_id: ConnectionId,
        settings: GameSettings,
    ) -> Result<(), GameError> {
        if !self.is_host(connection_id) {
            return Err(GameError::Authorization);
        }
        if self.status != LobbyStatus::Waiting {
            return Err(GameError::StateConflict);
        }
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    pub fn start(&mut self, connection_id: ConnectionId) -> Result<(), GameError> {
        if !self.is_host(connection_id) {
            return Err(GameError::Authorization);
        }
        if self.status != LobbyStatus::Waiting {
            return Err(GameError::StateConflict);
        }
        if self.players.len() < 2 {
            return Err(GameError::StateConflict);
        }
        self.status = LobbyStatus::Playing;
        self.current_round = 0;
        self.current_turn = 0;
        Ok(())
    }

    /// Marks the player at the turn pointer as the drawer and returns its
    /// connection id. Requires a non-empty player list while playing.
    pub fn begin_turn(&mut self) -> Option<ConnectionId> {
        if self.status != LobbyStatus::Playing || self.players.is_empty() {
            return None;
        }
        self.current_turn %= self.players.len();
        for p in self.players.iter_mut() {
            p.is_drawing = false;
        }
        let drawer = &mut self.players[self.current_turn];
        drawer.is_drawing = true;
        Some(drawer.connection_id)
    }

    pub fn clear_drawing(&mut self) {
        for p in self.players.iter_mut() {
            p.is_drawing = false;
        }
    }

    /// Moves the turn pointer past a completed turn. Wrapping to seat 0
    /// finishes the round; exhausting the configured rounds finishes the
    /// game. Returns true when the game just finished.
    pub fn advance_turn(&mut self) -> bool {
        self.clear_drawing();
        if self.players.is_empty() {
            return false;
        }
        self.current_turn = (self.current_turn + 1) % self.players.len();
        if self.current_turn == 0 {
            self.current_round += 1;
        }
        self.finish_if_rounds_exhausted()
    }

    pub fn finish_if_rounds_exhausted(&mut self) -> bool {
        if self.status == LobbyStatus::Playing && self.current_round >= self.settings.rounds {
            self.status = LobbyStatus::Finished;
            self.clear_drawing();
            true
        } else {
            false
        }
    }

    pub fn finish(&mut self) {
        self.status = LobbyStatus::Finished;
        self.clear_drawing();
    }

    /// Scores are only ever added to, keeping them monotonic within a
    /// session.
    pub fn award(&mut self, connection_id: ConnectionId, delta: u32) {
        if let Some(p) = self
            .players
            .iter_mut()
            .find(|p| p.connection_id == connection_id)
        {
            p.score = p.score.saturating_add(delta);
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby_with(usernames: &[&str]) -> LobbyState {
        let mut lobby = LobbyState::new(
            "ABC123".into(),
            1,
            usernames[0].into(),
            GameSettings::default(),
        );
        for (i, name) in usernames.iter().enumerate().skip(1) {
            lobby.join(i as ConnectionId + 1, (*name).into()).expect("");
        }
        lobby
    }

    #[test]
    fn it_keeps_exactly_one_host_through_joins_and_leaves() {
        let mut lobby = lobby_with(&["alice", "bob", "carol"]);
        assert_eq!(lobby.players.iter().filter(|p| p.is_host).count(), 1);

        let outcome = lobby.leave(1).expect("alice is present");
        assert!(outcome.host_migrated);
        assert_eq!(lobby.host, 2);
        assert!(lobby.players[0].is_host);
        assert_eq!(lobby.players.iter().filter(|p| p.is_host).count(), 1);
    }

    #[test]
    fn it_rejects_join_over_capacity() {
        let mut settings = GameSettings::default();
        settings.max_players = 2;
        let mut lobby = LobbyState::new("ABC123".into(), 1, "alice".into(), settings);
        lobby.join(2, "bob".into()).expect("");
        assert_eq!(lobby.join(3, "carol".into()), Err(GameError::Capacity));
        assert_eq!(lobby.players.len(), 2);
    }

    #[test]
    fn it_rejects_join_after_start() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        lobby.start(1).expect("host can start");
        assert_eq!(lobby.join(3, "carol".into()), Err(GameError::StateConflict));
    }

    #[test]
    fn it_requires_two_players_to_start() {
        let mut lobby = lobby_with(&["alice"]);
        assert_eq!(lobby.start(1), Err(GameError::StateConflict));
        assert_eq!(lobby.status, LobbyStatus::Waiting);
    }

    #[test]
    fn it_rejects_start_from_non_host() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        assert_eq!(lobby.start(2), Err(GameError::Authorization));
    }

    #[test]
    fn it_only_lets_the_host_change_settings_while_waiting() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        assert_eq!(
            lobby.update_settings(2, GameSettings::default()),
            Err(GameError::Authorization)
        );
        lobby.start(1).expect("");
        assert_eq!(
            lobby.update_settings(1, GameSettings::default()),
            Err(GameError::StateConflict)
        );
    }

    #[test]
    fn it_finishes_after_every_player_drew_in_every_round() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        lobby.settings.rounds = 2;
        lobby.start(1).expect("");

        let mut finished = false;
        let mut turns = 0;
        while !finished {
            let drawer = lobby.begin_turn().expect("playing with players");
            assert_eq!(lobby.drawer(), Some(drawer));
            finished = lobby.advance_turn();
            turns += 1;
            assert!(turns <= 4, "game must end after rounds * players turns");
        }
        assert_eq!(turns, 4);
        assert_eq!(lobby.status, LobbyStatus::Finished);
        assert_eq!(lobby.drawer(), None);
    }

    #[test]
    fn it_shifts_the_turn_pointer_when_an_earlier_seat_leaves() {
        let mut lobby = lobby_with(&["alice", "bob", "carol"]);
        lobby.start(1).expect("");
        lobby.begin_turn().expect("");
        lobby.advance_turn();
        // bob (seat 1) is up next; alice leaving must not skip him
        lobby.leave(1).expect("");
        assert_eq!(lobby.begin_turn(), Some(2));
    }

    #[test]
    fn it_validates_settings_bounds() {
        let mut s = GameSettings::default();
        s.drawing_time = 5;
        assert!(matches!(s.validate(), Err(GameError::Validation(_))));

        let mut s = GameSettings::default();
        s.categories = WordCategories {
            agents: false,
            weapons: false,
        };
        assert!(matches!(s.validate(), Err(GameError::Validation(_))));

        assert!(GameSettings::default().validate().is_ok());
    }

    #[test]
    fn it_hands_host_authority_to_the_first_join_after_revival() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        lobby.start(1).expect("");
        lobby.revive();

        assert!(lobby.players.is_empty());
        assert_eq!(lobby.status, LobbyStatus::Waiting);
        assert_eq!(lobby.current_round, 0);

        lobby.join(7, "dave".into()).expect("revived lobby accepts joins");
        assert_eq!(lobby.host, 7);
        assert!(lobby.players[0].is_host);
    }

    #[test]
    fn it_keeps_scores_monotonic() {
        let mut lobby = lobby_with(&["alice", "bob"]);
        lobby.award(2, 120);
        lobby.award(2, 30);
        assert_eq!(lobby.player(2).map(|p| p.score), Some(150));
    }
}
