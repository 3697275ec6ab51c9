use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{ConnectionError, GameError, Session, SessionCode, User};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ClientMessage {
    Authenticate { token: String },
    CreateGame,
    JoinGame { code: String },
    Subscribe { code: String },
    StartGame,
    SetSecretWord { category: String, word: String },
    AskQuestion { text: String },
    AnswerQuestion { question_id: String, answer: String },
    MakeGuess { guess: String },
    SkipTurn,
    AddReaction { emoji: String },
    /// Leaves the subscribed session, or `code` when given. A reconnected
    /// socket can leave without subscribing again.
    LeaveGame {
        #[serde(default)]
        code: Option<String>,
    },
    PlayAgain,
    ResetToLobby,
    UpdateAvatar { avatar: String },
    Heartbeat,
}

impl ClientMessage {
    /// Whether handling this message requires an authenticated connection.
    pub fn requires_authentication(&self) -> bool {
        !matches!(self, ClientMessage::Authenticate { .. } | ClientMessage::Heartbeat)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServerMessage {
    AuthenticationSuccess { user: User },
    AuthenticationFailed { reason: ConnectionError },
    GameCreated { code: SessionCode, session: Session },
    GameJoined { session: Session },
    SessionSnapshot { session: Session },
    SessionEnded { code: SessionCode },
    RemovedFromSession { code: SessionCode },
    GameLeft,
    AvatarUpdated { user: User },
    Error { error: GameError },
    ConnectionFailed { error: ConnectionError },
}
