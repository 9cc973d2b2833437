use std::collections::HashMap;
use std::num::Wrapping;
use std::sync::Arc;

use tokio::sync::mpsc::{channel, Sender};

use scrawl_system::{
    validate_code, CommandId, CommandResult, ConnectionId, GameCommand, GameError, GameEvent,
    IdentifiableCommand, IdentifiableEvent, LobbyState,
};

use crate::connection::{ConnectionCommand, ConnectionEvent};
use crate::connection_tx_storage::ConnectionTxStorage;
use crate::session::{spawn_session, SessionMsg, SessionTx};
use crate::store::LobbyStore;

pub type GatewayTx = Sender<ConnectionCommand>;
pub type NoticeTx = Sender<GatewayNotice>;

/// Notices flowing back from session tasks so the gateway can keep the
/// connection→lobby reverse index and the live-lobby table consistent.
#[derive(Debug)]
pub enum GatewayNotice {
    JoinDenied {
        code: String,
        connection_id: ConnectionId,
    },
    MemberLeft {
        code: String,
        connection_id: ConnectionId,
    },
    SessionClosed {
        code: String,
    },
}

struct Gateway {
    connections: ConnectionTxStorage,
    connection_id_source: Wrapping<ConnectionId>,
    /// Reverse index: which lobby each connection is seated in. Keeps
    /// disconnect cleanup O(1) instead of scanning every room.
    memberships: HashMap<ConnectionId, String>,
    lobbies: HashMap<String, SessionTx>,
    store: Arc<dyn LobbyStore>,
    notice_tx: NoticeTx,
}

pub fn spawn_gateway(store: Arc<dyn LobbyStore>) -> GatewayTx {
    let (srv_tx, mut srv_rx) = channel::<ConnectionCommand>(64);
    let (notice_tx, mut notice_rx) = channel::<GatewayNotice>(64);

    tokio::spawn(async move {
        let mut gateway = Gateway {
            connections: ConnectionTxStorage::new(),
            connection_id_source: Wrapping(0),
            memberships: HashMap::new(),
            lobbies: HashMap::new(),
            store,
            notice_tx,
        };

        loop {
            tokio::select! {
                command = srv_rx.recv() => match command {
                    Some(command) => gateway.handle_connection_command(command).await,
                    None => break,
                },
                notice = notice_rx.recv() => if let Some(notice) = notice {
                    gateway.handle_notice(notice);
                },
            }
        }
    });

    srv_tx
}

impl Gateway {
    async fn handle_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { tx } => {
                let connection_id = self.new_connection_id();
                self.connections.insert(connection_id, tx);
                self.connections
                    .send(&connection_id, ConnectionEvent::Connected { connection_id })
                    .await;
                log::info!("connection {} established", connection_id);
            }
            ConnectionCommand::Disconnect { from } => {
                self.connections.remove(&from);
                if let Some(code) = self.memberships.remove(&from) {
                    let dead = match self.lobbies.get_mut(&code) {
                        Some(session) => session.send(SessionMsg::Depart { from }).await.is_err(),
                        None => false,
                    };
                    if dead {
                        self.lobbies.remove(&code);
                    }
                }
                log::info!("connection {} closed", from);
            }
            ConnectionCommand::IdentifiableCommand {
                from,
                command: IdentifiableCommand {
                    command_id,
                    command,
                },
            } => self.handle_command(from, command_id, command).await,
        }
    }

    async fn handle_command(
        &mut self,
        from: ConnectionId,
        command_id: CommandId,
        command: GameCommand,
    ) {
        match command {
            GameCommand::CreateLobby {
                code,
                username,
                settings,
            } => {
                self.create_lobby(from, command_id, code, username, settings)
                    .await
            }
            GameCommand::JoinLobby { code, username } => {
                self.join_lobby(from, command_id, code, username).await
            }
            GameCommand::VerifyLobby { code } => self.verify_lobby(from, command_id, code).await,
            other => self.route_to_session(from, command_id, other).await,
        }
    }

    async fn create_lobby(
        &mut self,
        from: ConnectionId,
        command_id: CommandId,
        code: String,
        username: String,
        settings: scrawl_system::GameSettings,
    ) {
        if self.memberships.contains_key(&from) {
            return self.reply_error(from, command_id, GameError::StateConflict).await;
        }
        if let Err(err) = validate_code(&code) {
            return self.reply_error(from, command_id, err).await;
        }
        if let Err(err) = settings.validate() {
            return self.reply_error(from, command_id, err).await;
        }
        if self.lobbies.contains_key(&code) {
            return self.reply_error(from, command_id, GameError::DuplicateCode).await;
        }
        match self.store.exists(&code).await {
            Ok(true) => {
                return self.reply_error(from, command_id, GameError::DuplicateCode).await
            }
            Err(err) => return self.reply_error(from, command_id, err.into()).await,
            Ok(false) => {}
        }

        let tx = match self.connections.get(&from) {
            Some(tx) => tx.clone(),
            None => return,
        };

        let mut state = LobbyState::new(code.clone(), from, username, settings);
        state.touch();
        if let Err(err) = self.store.save(&code, &state).await {
            return self.reply_error(from, command_id, err.into()).await;
        }

        let session_tx = spawn_session(
            state,
            vec![(from, tx)],
            self.store.clone(),
            self.notice_tx.clone(),
        );
        self.lobbies.insert(code.clone(), session_tx);
        self.memberships.insert(from, code.clone());
        log::info!("lobby {} created by connection {}", code, from);
        self.reply(
            from,
            command_id,
            CommandResult::Event(GameEvent::LobbyCreated { code }),
        )
        .await;
    }

    async fn join_lobby(
        &mut self,
        from: ConnectionId,
        command_id: CommandId,
        code: String,
        username: String,
    ) {
        if self.memberships.contains_key(&from) {
            return self.reply_error(from, command_id, GameError::StateConflict).await;
        }
        let tx = match self.connections.get(&from) {
            Some(tx) => tx.clone(),
            None => return,
        };
        // codes that fail validation cannot name a record, and must not
        // reach the file-backed store as a path fragment
        if validate_code(&code).is_err() {
            return self.reply_error(from, command_id, GameError::NotFound).await;
        }
        if !self.lobbies.contains_key(&code) {
            // a stored record without a live task is revived on demand;
            // membership and progress died with the process that wrote it
            match self.store.get(&code).await {
                Ok(Some(mut state)) => {
                    state.revive();
                    let session_tx = spawn_session(
                        state,
                        Vec::new(),
                        self.store.clone(),
                        self.notice_tx.clone(),
                    );
                    self.lobbies.insert(code.clone(), session_tx);
                    log::info!("lobby {} revived from storage", code);
                }
                Ok(None) => {
                    return self.reply_error(from, command_id, GameError::NotFound).await
                }
                Err(err) => return self.reply_error(from, command_id, err.into()).await,
            }
        }
        let msg = SessionMsg::Join {
            from,
            command_id,
            username,
            tx,
        };
        let delivered = match self.lobbies.get_mut(&code) {
            Some(session) => session.send(msg).await.is_ok(),
            None => false,
        };
        if delivered {
            // optimistic; a JoinDenied notice rolls this back
            self.memberships.insert(from, code);
        } else {
            self.lobbies.remove(&code);
            self.reply_error(from, command_id, GameError::NotFound).await;
        }
    }

    async fn verify_lobby(&mut self, from: ConnectionId, command_id: CommandId, code: String) {
        let exists = if validate_code(&code).is_err() {
            false
        } else if self.lobbies.contains_key(&code) {
            true
        } else {
            match self.store.exists(&code).await {
                Ok(exists) => exists,
                Err(err) => return self.reply_error(from, command_id, err.into()).await,
            }
        };
        self.reply(
            from,
            command_id,
            CommandResult::Event(GameEvent::LobbyVerified { exists }),
        )
        .await;
    }

    async fn route_to_session(
        &mut self,
        from: ConnectionId,
        command_id: CommandId,
        command: GameCommand,
    ) {
        let code = command.code().to_owned();
        let seated = self.memberships.get(&from).cloned();
        match seated {
            Some(ref s) if *s == code => {
                let delivered = match self.lobbies.get_mut(&code) {
                    Some(session) => {
                        let msg = SessionMsg::Command {
                            from,
                            command_id,
                            command,
                        };
                        session.send(msg).await.is_ok()
                    }
                    None => false,
                };
                if !delivered {
                    self.lobbies.remove(&code);
                    self.memberships.remove(&from);
                    self.reply_error(from, command_id, GameError::NotFound).await;
                }
            }
            Some(_) => {
                // seated, but addressing some other lobby
                self.reply_error(from, command_id, GameError::StateConflict)
                    .await
            }
            None => {
                let err = if self.lobbies.contains_key(&code) {
                    GameError::StateConflict
                } else {
                    GameError::NotFound
                };
                self.reply_error(from, command_id, err).await
            }
        }
    }

    fn handle_notice(&mut self, notice: GatewayNotice) {
        match notice {
            GatewayNotice::JoinDenied {
                code,
                connection_id,
            }
            | GatewayNotice::MemberLeft {
                code,
                connection_id,
            } => {
                if self.memberships.get(&connection_id) == Some(&code) {
                    self.memberships.remove(&connection_id);
                }
            }
            GatewayNotice::SessionClosed { code } => {
                self.lobbies.remove(&code);
            }
        }
    }

    async fn reply(&mut self, to: ConnectionId, command_id: CommandId, result: CommandResult) {
        self.connections
            .send(
                &to,
                ConnectionEvent::IdentifiableEvent(IdentifiableEvent::ByMyself {
                    command_id,
                    result,
                }),
            )
            .await;
    }

    async fn reply_error(&mut self, to: ConnectionId, command_id: CommandId, err: GameError) {
        self.reply(to, command_id, CommandResult::Error(err)).await;
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        self.connection_id_source += Wrapping(1);
        self.connection_id_source.0
    }
}
