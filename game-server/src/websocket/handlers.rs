use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::auth::AuthService;
use crate::game_manager::GameManager;
use crate::websocket::connection::{ConnectionId, ConnectionManager};
use game_core::GameAction;
use game_persistence::{SessionRepository, SnapshotOutcome};
use game_types::{ClientMessage, ConnectionError, GameError, ServerMessage, SessionCode, User};

#[derive(Default)]
struct HandlerState {
    user: Option<User>,
    code: Option<SessionCode>,
    forwarder: Option<JoinHandle<()>>,
}

impl HandlerState {
    fn detach(&mut self) -> Option<SessionCode> {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.code.take()
    }
}

/// Per-connection message dispatch. Errors from session operations are
/// reported to the client and never close the socket; a returned `Err`
/// means the outgoing channel is gone.
#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    game_manager: Arc<GameManager>,
    auth_service: Arc<AuthService>,
    state: Arc<Mutex<HandlerState>>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        game_manager: Arc<GameManager>,
        auth_service: Arc<AuthService>,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            game_manager,
            auth_service,
            state: Arc::new(Mutex::new(HandlerState::default())),
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), String> {
        self.connection_manager.update_activity(self.connection_id);

        let user = self.state.lock().await.user.clone();
        let user = match (user, message.requires_authentication()) {
            (Some(user), _) => Some(user),
            (None, false) => None,
            (None, true) => {
                return self.send_message(ServerMessage::ConnectionFailed {
                    error: ConnectionError::AuthenticationRequired,
                });
            }
        };

        match (message, user) {
            (ClientMessage::Authenticate { token }, _) => self.handle_authenticate(token).await,
            (ClientMessage::Heartbeat, _) => Ok(()),
            (ClientMessage::CreateGame, Some(user)) => self.handle_create_game(user).await,
            (ClientMessage::JoinGame { code }, Some(user)) => self.handle_join_game(user, code).await,
            (ClientMessage::Subscribe { code }, Some(user)) => self.handle_subscribe(user, code).await,
            (ClientMessage::LeaveGame { code }, Some(user)) => self.handle_leave_game(user, code).await,
            (ClientMessage::UpdateAvatar { avatar }, Some(user)) => {
                self.handle_update_avatar(user, avatar).await
            }
            (message, Some(user)) => match game_action(message) {
                Some(action) => self.handle_game_action(user, action).await,
                None => Ok(()),
            },
            (_, None) => Ok(()),
        }
    }

    /// Stops relaying snapshots. Session membership is kept so the client can
    /// re-subscribe after reconnecting.
    pub async fn handle_disconnect(&self) {
        let code = self.state.lock().await.detach();
        if let Some(code) = code {
            info!(
                "Connection {} disconnected while in game {}",
                self.connection_id, code
            );
        }
    }

    fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.connection_manager
            .send_to_connection(self.connection_id, message)
    }

    fn send_error(&self, error: GameError) -> Result<(), String> {
        self.send_message(ServerMessage::Error { error })
    }

    async fn handle_authenticate(&self, token: String) -> Result<(), String> {
        info!("Authenticating connection {}", self.connection_id);

        let identity = match self.auth_service.validate_token(&token) {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Authentication failed for connection {}: {}", self.connection_id, e);
                return self.send_message(ServerMessage::AuthenticationFailed { reason: e.into() });
            }
        };

        match self.game_manager.sign_in(&identity).await {
            Ok(user) => {
                {
                    let mut state = self.state.lock().await;
                    // Re-authenticating as someone else drops the old relay.
                    if state.user.as_ref().is_some_and(|current| current.id != user.id) {
                        state.detach();
                        self.connection_manager.set_session(self.connection_id, None);
                    }
                    state.user = Some(user.clone());
                }
                self.connection_manager
                    .set_user(self.connection_id, Some(user.id.clone()));
                self.send_message(ServerMessage::AuthenticationSuccess { user })
            }
            Err(e) => self.send_message(ServerMessage::ConnectionFailed {
                error: ConnectionError::InternalError {
                    message: e.to_string(),
                },
            }),
        }
    }

    async fn handle_create_game(&self, user: User) -> Result<(), String> {
        match self.game_manager.create_game(&user).await {
            Ok(session) => {
                self.attach(&user, session.id.clone()).await;
                let code = session.id.clone();
                self.send_message(ServerMessage::GameCreated {
                    code,
                    session: session.personalized_for_player(Some(&user.id)),
                })
            }
            Err(e) => self.send_error(e),
        }
    }

    async fn handle_join_game(&self, user: User, code: String) -> Result<(), String> {
        match self.game_manager.join_game(&code, &user).await {
            Ok(session) => {
                self.attach(&user, session.id.clone()).await;
                self.send_message(ServerMessage::GameJoined {
                    session: session.personalized_for_player(Some(&user.id)),
                })
            }
            Err(e) => self.send_error(e),
        }
    }

    async fn handle_subscribe(&self, user: User, code: String) -> Result<(), String> {
        let code = match game_core::normalize_game_code(&code) {
            Ok(code) => code,
            Err(e) => return self.send_error(e),
        };
        match self.game_manager.require_member(&code, &user.id).await {
            // The relay delivers the current snapshot first.
            Ok(_) => {
                self.attach(&user, code).await;
                Ok(())
            }
            Err(e) => self.send_error(e),
        }
    }

    async fn handle_leave_game(&self, user: User, requested: Option<String>) -> Result<(), String> {
        let requested = match requested.as_deref().map(game_core::normalize_game_code) {
            Some(Ok(code)) => Some(code),
            Some(Err(e)) => return self.send_error(e),
            None => None,
        };

        let (code, was_attached) = {
            let mut state = self.state.lock().await;
            let Some(code) = requested.or_else(|| state.code.clone()) else {
                drop(state);
                return self.send_error(GameError::NotInSession);
            };
            // Detach first so the relay does not report our own departure.
            let was_attached = state.code.as_deref() == Some(code.as_str());
            if was_attached {
                state.detach();
            }
            (code, was_attached)
        };
        if was_attached {
            self.connection_manager.set_session(self.connection_id, None);
        }

        match self.game_manager.perform(&code, &user.id, GameAction::Leave).await {
            Ok(_) => {
                info!("{} left game {}", user.id, code);
                self.send_message(ServerMessage::GameLeft)
            }
            Err(e) => {
                if was_attached {
                    self.attach(&user, code).await;
                }
                self.send_error(e)
            }
        }
    }

    async fn handle_update_avatar(&self, user: User, avatar: String) -> Result<(), String> {
        match self.game_manager.update_avatar(&user.id, &avatar).await {
            Ok(updated) => {
                self.state.lock().await.user = Some(updated.clone());
                self.send_message(ServerMessage::AvatarUpdated { user: updated })
            }
            Err(e) => self.send_error(e),
        }
    }

    /// Results reach the client through the snapshot relay, not as a reply.
    async fn handle_game_action(&self, user: User, action: GameAction) -> Result<(), String> {
        let Some(code) = self.state.lock().await.code.clone() else {
            return self.send_error(GameError::NotInSession);
        };

        match self.game_manager.perform(&code, &user.id, action).await {
            Ok(_) => Ok(()),
            Err(e) => self.send_error(e),
        }
    }

    async fn attach(&self, user: &User, code: SessionCode) {
        let subscription = match self.game_manager.sessions().subscribe(&code).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("Failed to subscribe {} to game {}: {}", self.connection_id, code, e);
                let _ = self.send_error(e);
                return;
            }
        };

        let mut state = self.state.lock().await;
        state.detach();
        state.code = Some(code.clone());
        state.forwarder = Some(tokio::spawn(forward_snapshots(
            self.clone(),
            user.id.clone(),
            code.clone(),
            subscription,
        )));
        self.connection_manager
            .set_session(self.connection_id, Some(code));
    }
}

/// Relays every snapshot of one session to one connection, redacted for the
/// viewing player, until the session ends or the player is removed.
async fn forward_snapshots(
    handler: MessageHandler,
    user_id: String,
    code: SessionCode,
    mut subscription: game_persistence::Subscription,
) {
    while let Some(snapshot) = subscription.next().await {
        let message = match SessionRepository::classify_snapshot(snapshot, &user_id) {
            SnapshotOutcome::Session(session) => ServerMessage::SessionSnapshot {
                session: session.personalized_for_player(Some(&user_id)),
            },
            SnapshotOutcome::Invalid(error) => {
                warn!("Unreadable snapshot of game {}: {}", code, error);
                ServerMessage::Error { error }
            }
            SnapshotOutcome::Ended => {
                let _ = handler.send_message(ServerMessage::SessionEnded { code: code.clone() });
                break;
            }
            SnapshotOutcome::Removed => {
                let _ = handler.send_message(ServerMessage::RemovedFromSession { code: code.clone() });
                break;
            }
        };
        if handler.send_message(message).is_err() {
            return;
        }
    }

    // Forget the session unless the connection has already moved on.
    let mut state = handler.state.lock().await;
    if state.code.as_deref() == Some(code.as_str()) {
        state.code = None;
        state.forwarder = None;
        handler
            .connection_manager
            .set_session(handler.connection_id, None);
    }
}

fn game_action(message: ClientMessage) -> Option<GameAction> {
    let action = match message {
        ClientMessage::StartGame => GameAction::StartGame,
        ClientMessage::SetSecretWord { category, word } => GameAction::SetSecretWord { category, word },
        ClientMessage::AskQuestion { text } => GameAction::AskQuestion { text },
        ClientMessage::AnswerQuestion {
            question_id,
            answer,
        } => GameAction::AnswerQuestion {
            question_id,
            answer,
        },
        ClientMessage::MakeGuess { guess } => GameAction::MakeGuess { guess },
        ClientMessage::SkipTurn => GameAction::SkipTurn,
        ClientMessage::AddReaction { emoji } => GameAction::AddReaction { emoji },
        ClientMessage::PlayAgain => GameAction::PlayAgain,
        ClientMessage::ResetToLobby => GameAction::ResetToLobby,
        ClientMessage::LeaveGame { .. } => GameAction::Leave,
        ClientMessage::Authenticate { .. }
        | ClientMessage::CreateGame
        | ClientMessage::JoinGame { .. }
        | ClientMessage::Subscribe { .. }
        | ClientMessage::UpdateAvatar { .. }
        | ClientMessage::Heartbeat => return None,
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_action_mapping() {
        assert_eq!(game_action(ClientMessage::SkipTurn), Some(GameAction::SkipTurn));
        assert_eq!(
            game_action(ClientMessage::MakeGuess { guess: "cat".into() }),
            Some(GameAction::MakeGuess { guess: "cat".into() })
        );
        assert_eq!(game_action(ClientMessage::CreateGame), None);
        assert_eq!(game_action(ClientMessage::Heartbeat), None);
    }
}
