use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::time::{delay_until, Duration, Instant};

use scrawl_system::{
    default_score, CommandId, CommandResult, ConnectionId, DrawingEvent, GameCommand, GameError,
    GameEvent, IdentifiableEvent, LobbyState, ScoreFn, WordBag,
};

use crate::connection::ConnectionEvent;
use crate::connection_tx_storage::ConnectionTx;
use crate::gateway::{GatewayNotice, NoticeTx};
use crate::relay::CanvasRelay;
use crate::store::LobbyStore;

pub type SessionTx = Sender<SessionMsg>;

/// Everything the gateway can hand a session task. One task owns one
/// lobby; its inbox is the serial queue that linearizes all mutations of
/// that lobby while distinct lobbies run in parallel.
#[derive(Debug)]
pub enum SessionMsg {
    Join {
        from: ConnectionId,
        command_id: CommandId,
        username: String,
        tx: ConnectionTx,
    },
    Command {
        from: ConnectionId,
        command_id: CommandId,
        command: GameCommand,
    },
    /// Implicit removal on disconnect; no reply is possible.
    Depart { from: ConnectionId },
}

const TICK: Duration = Duration::from_secs(1);
const INTERMISSION: Duration = Duration::from_secs(5);

enum Phase {
    Lobby,
    Turn(TurnState),
    Intermission { until: Instant },
    Over,
}

struct TurnState {
    word: &'static str,
    drawer: ConnectionId,
    started: Instant,
    deadline: Instant,
    next_tick: Instant,
    /// Correct guessers in rank order.
    guessed: Vec<ConnectionId>,
    rerolled: bool,
    /// Set when a turn end could not be committed; the retry must finish
    /// the turn for the original reason, not as a fresh timeout.
    pending_end: Option<TurnEndCause>,
}

#[derive(Debug, Clone, Copy)]
enum TurnEndCause {
    TimeUp,
    AllGuessed,
    DrawerLeft,
}

enum Wake {
    Msg(SessionMsg),
    Timer,
    Closed,
}

struct SessionTask {
    state: LobbyState,
    members: Vec<(ConnectionId, ConnectionTx)>,
    relay: CanvasRelay,
    phase: Phase,
    bag: WordBag,
    rng: StdRng,
    score: ScoreFn,
    store: Arc<dyn LobbyStore>,
    notice_tx: NoticeTx,
    rx: Receiver<SessionMsg>,
}

pub fn spawn_session(
    state: LobbyState,
    members: Vec<(ConnectionId, ConnectionTx)>,
    store: Arc<dyn LobbyStore>,
    notice_tx: NoticeTx,
) -> SessionTx {
    let (tx, rx) = channel(64);
    let mut rng = StdRng::from_entropy();
    let bag = WordBag::new(state.settings.categories, &mut rng);
    let task = SessionTask {
        state,
        members,
        relay: CanvasRelay::new(),
        phase: Phase::Lobby,
        bag,
        rng,
        score: default_score,
        store,
        notice_tx,
        rx,
    };
    tokio::spawn(task.run());
    tx
}

impl SessionTask {
    async fn run(mut self) {
        log::info!("lobby {}: session task started", self.state.code);
        loop {
            let wake = match self.next_deadline() {
                Some(at) => tokio::select! {
                    msg = self.rx.recv() => msg.map(Wake::Msg).unwrap_or(Wake::Closed),
                    _ = delay_until(at) => Wake::Timer,
                },
                None => self.rx.recv().await.map(Wake::Msg).unwrap_or(Wake::Closed),
            };
            let live = match wake {
                Wake::Msg(msg) => self.handle(msg).await,
                Wake::Timer => {
                    self.on_timer().await;
                    true
                }
                Wake::Closed => false,
            };
            if !live {
                break;
            }
        }
        log::info!("lobby {}: session task terminated", self.state.code);
    }

    fn next_deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::Turn(turn) => Some(turn.next_tick.min(turn.deadline)),
            Phase::Intermission { until } => Some(*until),
            Phase::Lobby | Phase::Over => None,
        }
    }

    async fn on_timer(&mut self) {
        enum Action {
            EndTurn(TurnEndCause),
            Tick(u32),
            StartTurn,
            Nothing,
        }

        let now = Instant::now();
        let action = match &mut self.phase {
            Phase::Turn(turn) => {
                if now >= turn.deadline {
                    Action::EndTurn(turn.pending_end.take().unwrap_or(TurnEndCause::TimeUp))
                } else {
                    turn.next_tick = turn.next_tick + TICK;
                    if turn.next_tick <= now {
                        turn.next_tick = now + TICK;
                    }
                    let left = turn.deadline - now;
                    Action::Tick(((left.as_millis() + 999) / 1000) as u32)
                }
            }
            Phase::Intermission { until } => {
                if now >= *until {
                    Action::StartTurn
                } else {
                    Action::Nothing
                }
            }
            Phase::Lobby | Phase::Over => Action::Nothing,
        };

        match action {
            Action::EndTurn(cause) => self.end_turn(cause).await,
            Action::Tick(remaining) => {
                self.broadcast(None, GameEvent::TimerUpdate { remaining })
                    .await
            }
            Action::StartTurn => self.start_turn().await,
            Action::Nothing => {}
        }
    }

    /// Returns false once the lobby emptied and the task should die.
    async fn handle(&mut self, msg: SessionMsg) -> bool {
        match msg {
            SessionMsg::Join {
                from,
                command_id,
                username,
                tx,
            } => self.handle_join(from, command_id, username, tx).await,
            SessionMsg::Depart { from } => self.remove_member(from, None).await,
            SessionMsg::Command {
                from,
                command_id,
                command,
            } => match command {
                GameCommand::LeaveLobby { .. } => self.remove_member(from, Some(command_id)).await,
                GameCommand::UpdateSettings { settings, .. } => {
                    self.handle_update_settings(from, command_id, settings).await;
                    true
                }
                GameCommand::StartGame { .. } => {
                    self.handle_start(from, command_id).await;
                    true
                }
                GameCommand::Guess { text, .. } => {
                    self.handle_guess(from, command_id, text).await;
                    true
                }
                GameCommand::RerollWord { .. } => {
                    self.handle_reroll(from, command_id).await;
                    true
                }
                GameCommand::Draw { event, .. } => {
                    self.handle_draw(from, command_id, event).await;
                    true
                }
                GameCommand::CreateLobby { .. }
                | GameCommand::JoinLobby { .. }
                | GameCommand::VerifyLobby { .. } => {
                    // the gateway resolves these before routing
                    self.reply_error(from, command_id, GameError::StateConflict)
                        .await;
                    true
                }
            },
        }
    }

    /// Returns false when a join denial leaves the task with nobody to
    /// serve (a revived lobby whose first join failed).
    async fn handle_join(
        &mut self,
        from: ConnectionId,
        command_id: CommandId,
        username: String,
        mut tx: ConnectionTx,
    ) -> bool {
        let denied = |err: GameError| IdentifiableEvent::ByMyself {
            command_id,
            result: CommandResult::Error(err),
        };

        if self.state.contains(from) {
            let _ = tx.send(wrap(denied(GameError::StateConflict))).await;
            self.notify_join_denied(from).await;
            return self.abandon_if_unseated().await;
        }

        let prev = self.state.clone();
        if let Err(err) = self.state.join(from, username) {
            let _ = tx.send(wrap(denied(err))).await;
            self.notify_join_denied(from).await;
            return self.abandon_if_unseated().await;
        }
        if !self.commit(prev).await {
            let _ = tx.send(wrap(denied(persistence_error()))).await;
            self.notify_join_denied(from).await;
            return self.abandon_if_unseated().await;
        }

        self.members.push((from, tx));
        let players = self.state.players.clone();
        log::info!(
            "lobby {}: connection {} joined ({} players)",
            self.state.code,
            from,
            players.len()
        );
        self.reply_ok(
            from,
            command_id,
            GameEvent::LobbyJoined {
                code: self.state.code.clone(),
                players: players.clone(),
                settings: self.state.settings.clone(),
            },
        )
        .await;
        self.broadcast(Some(from), GameEvent::PlayerJoined { players })
            .await;

        // a seat taken mid-turn needs the canvas baseline before any
        // further incremental event
        let resync = match &self.phase {
            Phase::Turn(turn) => self.relay.baseline().map(|event| (turn.drawer, event)),
            _ => None,
        };
        if let Some((drawer, event)) = resync {
            self.send_to(from, GameEvent::Draw { from: drawer, event })
                .await;
        }
        true
    }

    async fn abandon_if_unseated(&mut self) -> bool {
        if self.members.is_empty() && self.state.players.is_empty() {
            let _ = self
                .notice_tx
                .send(GatewayNotice::SessionClosed {
                    code: self.state.code.clone(),
                })
                .await;
            return false;
        }
        true
    }

    /// Removes a player on explicit leave (`reply_id` present) or
    /// disconnect. Returns false when the lobby emptied.
    async fn remove_member(&mut self, from: ConnectionId, reply_id: Option<CommandId>) -> bool {
        if !self.state.contains(from) {
            if let Some(command_id) = reply_id {
                self.reply_error(from, command_id, GameError::StateConflict)
                    .await;
            }
            return true;
        }

        let prev = self.state.clone();
        let outcome = match self.state.leave(from) {
            Some(outcome) => outcome,
            None => return true,
        };

        if !outcome.now_empty {
            self.state.touch();
            if let Err(err) = self.store.save(&self.state.code, &self.state).await {
                let detail = err.to_string();
                log::error!(
                    "lobby {}: persistence failed on leave: {}",
                    self.state.code,
                    detail
                );
                if let Some(command_id) = reply_id {
                    // explicit leave aborts like any other mutation
                    self.state = prev;
                    self.reply_error(from, command_id, GameError::Persistence(detail))
                        .await;
                    return true;
                }
                // the connection is gone regardless; registry consistency
                // wins over durability here
            }
        }

        if let Some(command_id) = reply_id {
            self.reply_ok(from, command_id, GameEvent::LeftLobby).await;
        }
        self.members.retain(|(id, _)| *id != from);
        let _ = self
            .notice_tx
            .send(GatewayNotice::MemberLeft {
                code: self.state.code.clone(),
                connection_id: from,
            })
            .await;

        if outcome.now_empty {
            if let Err(err) = self.store.delete(&self.state.code).await {
                log::error!("lobby {}: delete failed: {}", self.state.code, err);
            }
            let _ = self
                .notice_tx
                .send(GatewayNotice::SessionClosed {
                    code: self.state.code.clone(),
                })
                .await;
            log::info!("lobby {}: last player left, closing", self.state.code);
            return false;
        }

        let players = self.state.players.clone();
        log::info!(
            "lobby {}: connection {} left ({} players remain{})",
            self.state.code,
            from,
            players.len(),
            if outcome.host_migrated {
                ", host migrated"
            } else {
                ""
            }
        );
        self.broadcast(None, GameEvent::PlayerLeft { players }).await;

        match &self.phase {
            Phase::Turn(_) => {
                if outcome.was_drawing {
                    self.end_turn(TurnEndCause::DrawerLeft).await;
                } else if self.all_guessed() {
                    self.end_turn(TurnEndCause::AllGuessed).await;
                }
            }
            Phase::Intermission { .. } if self.state.players.len() < 2 => {
                self.finish_short_handed().await;
            }
            _ => {}
        }
        true
    }

    async fn handle_update_settings(
        &mut self,
        from: ConnectionId,
        command_id: CommandId,
        settings: scrawl_system::GameSettings,
    ) {
        let prev = self.state.clone();
        match self.state.update_settings(from, settings) {
            Err(err) => self.reply_error(from, command_id, err).await,
            Ok(()) => {
                if self.commit(prev).await {
                    let settings = self.state.settings.clone();
                    self.reply_ok(
                        from,
                        command_id,
                        GameEvent::SettingsUpdated {
                            settings: settings.clone(),
                        },
                    )
                    .await;
                    self.broadcast(Some(from), GameEvent::SettingsUpdated { settings })
                        .await;
                } else {
                    self.reply_error(from, command_id, persistence_error()).await;
                }
            }
        }
    }

    async fn handle_start(&mut self, from: ConnectionId, command_id: CommandId) {
        let prev = self.state.clone();
        match self.state.start(from) {
            Err(err) => self.reply_error(from, command_id, err).await,
            Ok(()) => {
                if self.commit(prev).await {
                    let players = self.state.players.clone();
                    log::info!(
                        "lobby {}: game started with {} players",
                        self.state.code,
                        players.len()
                    );
                    self.reply_ok(
                        from,
                        command_id,
                        GameEvent::GameStarted {
                            players: players.clone(),
                        },
                    )
                    .await;
                    self.broadcast(Some(from), GameEvent::GameStarted { players })
                        .await;
                    self.start_turn().await;
                } else {
                    self.reply_error(from, command_id, persistence_error()).await;
                }
            }
        }
    }

    async fn handle_guess(&mut self, from: ConnectionId, command_id: CommandId, text: String) {
        let (drawer, word, started, already_guessed, rank) = match &self.phase {
            Phase::Turn(turn) => (
                turn.drawer,
                turn.word,
                turn.started,
                turn.guessed.contains(&from),
                turn.guessed.len(),
            ),
            _ => {
                self.reply_error(from, command_id, GameError::StateConflict)
                    .await;
                return;
            }
        };
        if from == drawer || already_guessed || !self.state.contains(from) {
            self.reply_error(from, command_id, GameError::StateConflict)
                .await;
            return;
        }

        if !text.trim().eq_ignore_ascii_case(word) {
            let event = GameEvent::GuessSubmitted { from, text };
            self.reply_ok(from, command_id, event.clone()).await;
            self.broadcast(Some(from), event).await;
            return;
        }

        let elapsed = Instant::now() - started;
        let fraction = elapsed.as_secs_f32() / self.state.settings.drawing_time as f32;
        let (guesser_delta, drawer_delta) = (self.score)(fraction, rank);

        let prev = self.state.clone();
        self.state.award(from, guesser_delta);
        self.state.award(drawer, drawer_delta);
        if !self.commit(prev).await {
            self.reply_error(from, command_id, persistence_error()).await;
            return;
        }

        let reduce = self.state.settings.modifiers.reduce_time_on_guess;
        let clamp_secs = self.state.settings.first_guess_delay as u64;
        if let Phase::Turn(turn) = &mut self.phase {
            turn.guessed.push(from);
            if rank == 0 && reduce {
                let clamp = Instant::now() + Duration::from_secs(clamp_secs);
                if clamp < turn.deadline {
                    turn.deadline = clamp;
                }
            }
        }

        let players = self.state.players.clone();
        log::info!(
            "lobby {}: connection {} guessed the word (rank {})",
            self.state.code,
            from,
            rank
        );
        let event = GameEvent::CorrectGuess { from, players };
        self.reply_ok(from, command_id, event.clone()).await;
        self.broadcast(Some(from), event).await;

        if self.all_guessed() {
            self.end_turn(TurnEndCause::AllGuessed).await;
        }
    }

    async fn handle_reroll(&mut self, from: ConnectionId, command_id: CommandId) {
        let allow = self.state.settings.modifiers.allow_reroll;
        let outcome = match &mut self.phase {
            Phase::Turn(turn) if turn.drawer == from => {
                if !allow || turn.rerolled || !turn.guessed.is_empty() {
                    Err(GameError::StateConflict)
                } else {
                    let word = self.bag.draw(&mut self.rng);
                    turn.word = word;
                    turn.rerolled = true;
                    Ok(word)
                }
            }
            Phase::Turn(_) => Err(GameError::Authorization),
            _ => Err(GameError::StateConflict),
        };
        match outcome {
            Ok(word) => {
                self.reply_ok(
                    from,
                    command_id,
                    GameEvent::WordRerolled {
                        word: word.to_string(),
                    },
                )
                .await
            }
            Err(err) => self.reply_error(from, command_id, err).await,
        }
    }

    async fn handle_draw(&mut self, from: ConnectionId, command_id: CommandId, event: DrawingEvent) {
        let drawer = match &self.phase {
            Phase::Turn(turn) => turn.drawer,
            _ => {
                self.reply_error(from, command_id, GameError::StateConflict)
                    .await;
                return;
            }
        };
        if from != drawer {
            // anyone else injecting strokes is rejected outright
            log::warn!(
                "lobby {}: connection {} tried to draw out of turn",
                self.state.code,
                from
            );
            self.reply_error(from, command_id, GameError::Authorization)
                .await;
            return;
        }

        self.relay.observe(&event);
        // the stroke itself only goes to the other members; the drawer
        // gets a bare ack
        self.reply_ok(from, command_id, GameEvent::DrawAccepted).await;
        self.broadcast(Some(from), GameEvent::Draw { from, event })
            .await;
    }

    async fn start_turn(&mut self) {
        if self.state.players.len() < 2 {
            // one player cannot both draw and guess
            self.finish_short_handed().await;
            return;
        }
        let prev = self.state.clone();
        let drawer = match self.state.begin_turn() {
            Some(drawer) => drawer,
            None => {
                self.phase = Phase::Over;
                return;
            }
        };
        if !self.commit(prev).await {
            // nothing was announced; retry shortly
            self.phase = Phase::Intermission {
                until: Instant::now() + TICK,
            };
            return;
        }

        let word = self.bag.draw(&mut self.rng);
        self.relay.reset();
        let now = Instant::now();
        let round = self.state.current_round;
        let turn = self.state.current_turn;
        self.phase = Phase::Turn(TurnState {
            word,
            drawer,
            started: now,
            deadline: now + Duration::from_secs(self.state.settings.drawing_time as u64),
            next_tick: now + TICK,
            guessed: Vec::new(),
            rerolled: false,
            pending_end: None,
        });

        let players = self.state.players.clone();
        log::info!(
            "lobby {}: round {} turn {} started, drawer {}",
            self.state.code,
            round,
            turn,
            drawer
        );
        self.broadcast(
            None,
            GameEvent::TurnStarted {
                drawer,
                round,
                turn,
                players,
            },
        )
        .await;
        self.send_to(
            drawer,
            GameEvent::WordAssigned {
                word: word.to_string(),
            },
        )
        .await;
    }

    async fn end_turn(&mut self, cause: TurnEndCause) {
        let word = match &self.phase {
            Phase::Turn(turn) => turn.word,
            _ => return,
        };

        let prev = self.state.clone();
        let mut finished = match cause {
            TurnEndCause::DrawerLeft => {
                // leave() already moved the turn pointer past the seat
                self.state.clear_drawing();
                self.state.finish_if_rounds_exhausted()
            }
            TurnEndCause::TimeUp | TurnEndCause::AllGuessed => self.state.advance_turn(),
        };
        if !finished && self.state.players.len() < 2 {
            self.state.finish();
            finished = true;
        }

        if !self.commit(prev).await {
            // keep the turn open; the next tick retries the transition
            // with the same cause
            if let Phase::Turn(turn) = &mut self.phase {
                let retry = Instant::now() + TICK;
                turn.deadline = retry;
                turn.next_tick = retry;
                turn.pending_end = Some(cause);
            }
            return;
        }

        let players = self.state.players.clone();
        log::info!(
            "lobby {}: turn ended ({:?}), word was {:?}",
            self.state.code,
            cause,
            word
        );
        self.broadcast(
            None,
            GameEvent::TurnEnded {
                word: word.to_string(),
                players: players.clone(),
            },
        )
        .await;

        if finished {
            self.phase = Phase::Over;
            log::info!("lobby {}: game finished", self.state.code);
            self.broadcast(None, GameEvent::GameFinished { players })
                .await;
        } else {
            self.phase = Phase::Intermission {
                until: Instant::now() + INTERMISSION,
            };
        }
    }

    /// Ends a game that dropped below two players outside a turn.
    async fn finish_short_handed(&mut self) {
        let prev = self.state.clone();
        self.state.finish();
        if !self.commit(prev).await {
            self.phase = Phase::Intermission {
                until: Instant::now() + TICK,
            };
            return;
        }
        self.phase = Phase::Over;
        let players = self.state.players.clone();
        log::info!(
            "lobby {}: not enough players to continue, game finished",
            self.state.code
        );
        self.broadcast(None, GameEvent::GameFinished { players })
            .await;
    }

    fn all_guessed(&self) -> bool {
        match &self.phase {
            Phase::Turn(turn) => self
                .state
                .players
                .iter()
                .filter(|p| p.connection_id != turn.drawer)
                .all(|p| turn.guessed.contains(&p.connection_id)),
            _ => false,
        }
    }

    /// Write-through save; rolls the in-memory state back on failure so
    /// nothing undurable is ever broadcast.
    async fn commit(&mut self, prev: LobbyState) -> bool {
        self.state.touch();
        match self.store.save(&self.state.code, &self.state).await {
            Ok(()) => true,
            Err(err) => {
                log::error!(
                    "lobby {}: persistence failed, rolling back: {}",
                    self.state.code,
                    err
                );
                self.state = prev;
                false
            }
        }
    }

    async fn notify_join_denied(&mut self, connection_id: ConnectionId) {
        let _ = self
            .notice_tx
            .send(GatewayNotice::JoinDenied {
                code: self.state.code.clone(),
                connection_id,
            })
            .await;
    }

    async fn broadcast(&mut self, without: Option<ConnectionId>, event: GameEvent) {
        for (id, tx) in self.members.iter_mut() {
            if Some(*id) == without {
                continue;
            }
            let msg = wrap(IdentifiableEvent::BySystem {
                event: event.clone(),
            });
            if tx.send(msg).await.is_err() {
                log::warn!("egress to connection {} is closed", id);
            }
        }
    }

    async fn send_to(&mut self, to: ConnectionId, event: GameEvent) {
        if let Some((_, tx)) = self.members.iter_mut().find(|(id, _)| *id == to) {
            let _ = tx.send(wrap(IdentifiableEvent::BySystem { event })).await;
        }
    }

    async fn reply_ok(&mut self, to: ConnectionId, command_id: CommandId, event: GameEvent) {
        self.reply(to, command_id, CommandResult::Event(event)).await;
    }

    async fn reply_error(&mut self, to: ConnectionId, command_id: CommandId, err: GameError) {
        self.reply(to, command_id, CommandResult::Error(err)).await;
    }

    async fn reply(&mut self, to: ConnectionId, command_id: CommandId, result: CommandResult) {
        if let Some((_, tx)) = self.members.iter_mut().find(|(id, _)| *id == to) {
            let _ = tx
                .send(wrap(IdentifiableEvent::ByMyself { command_id, result }))
                .await;
        }
    }
}

fn wrap(event: IdentifiableEvent) -> ConnectionEvent {
    ConnectionEvent::IdentifiableEvent(event)
}

fn persistence_error() -> GameError {
    GameError::Persistence("write-through save failed".into())
}
