use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

/// Every failure a session operation can report to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum GameError {
    #[error("game session {code} not found")]
    SessionNotFound { code: String },
    #[error("game session is full ({capacity} players)")]
    SessionFull { capacity: u32 },
    #[error("already in this game session")]
    AlreadyInSession,
    #[error("not a member of this game session")]
    NotInSession,
    #[error("game has already started")]
    GameAlreadyStarted,
    #[error("game has not started")]
    GameNotStarted,
    #[error("not allowed to {action}")]
    Unauthorized { action: String },
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("need at least {required} players, have {actual}")]
    InsufficientPlayers { required: u32, actual: u32 },
    #[error("invalid game code: {code}")]
    InvalidGameCode { code: String },
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
    #[error("network error: {message}")]
    NetworkError { message: String },
    #[error("invalid session data: {reason}")]
    InvalidSessionData { reason: String },
}

impl GameError {
    pub fn unauthorized(action: impl Into<String>) -> Self {
        GameError::Unauthorized { action: action.into() }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        GameError::InvalidInput { reason: reason.into() }
    }

    /// Transport failures may succeed on a manual retry; everything else is
    /// final for the given state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GameError::NetworkError { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ConnectionError {
    #[error("invalid token")]
    InvalidToken,
    #[error("session expired")]
    SessionExpired,
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("internal error: {message}")]
    InternalError { message: String },
}
