use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::user::GamePlayer;
use crate::wire;
use crate::{PlayerId, SessionCode};

pub const DEFAULT_TURN_TIME_LIMIT: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    Answerer, // Knows the secret word
    Guesser,  // Takes turns asking and guessing
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum GamePhase {
    Setup,       // Answerer choosing category and word
    Questioning, // Guessers taking turns
    GameOver,    // Round concluded
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Question {
    pub id: String,
    #[serde(rename = "askerID")]
    pub asker_id: PlayerId,
    #[serde(rename = "askerName")]
    pub asker_name: String,
    #[serde(rename = "question")]
    pub text: String,
    pub answer: String,
    #[serde(rename = "isAnswered")]
    pub is_answered: bool,
    #[serde(with = "wire::epoch_seconds")]
    #[ts(type = "number")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EmojiReaction {
    pub id: String,
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    #[serde(rename = "playerName")]
    pub player_name: String,
    pub emoji: String,
    #[serde(with = "wire::epoch_seconds")]
    #[ts(type = "number")]
    pub timestamp: DateTime<Utc>,
}

/// One round of play. Replaced wholesale on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameState {
    #[serde(rename = "answererID")]
    pub answerer_id: PlayerId,
    pub category: String,
    #[serde(rename = "secretWord")]
    pub secret_word: String,
    #[serde(rename = "currentTurnPlayerID")]
    pub current_turn_player_id: PlayerId,
    pub phase: GamePhase,
    #[serde(rename = "turnOrder", default)]
    pub turn_order: Vec<PlayerId>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub reactions: Vec<EmojiReaction>,
    #[serde(rename = "winnerID", default, with = "wire::empty_string_as_none")]
    #[ts(type = "string")]
    pub winner_id: Option<PlayerId>,
    #[serde(rename = "roundNumber")]
    pub round_number: u32,
    #[serde(rename = "turnStartTime", default, with = "wire::optional_epoch_seconds")]
    #[ts(type = "number")]
    pub turn_start_time: Option<DateTime<Utc>>,
    #[serde(rename = "turnTimeLimit", default = "default_turn_time_limit")]
    pub turn_time_limit: u32,
}

fn default_turn_time_limit() -> u32 {
    DEFAULT_TURN_TIME_LIMIT
}

impl GameState {
    pub fn is_guesser(&self, player_id: &str) -> bool {
        self.turn_order.iter().any(|id| id == player_id)
    }

    pub fn unanswered_questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|question| !question.is_answered)
    }

    pub fn latest_question(&self) -> Option<&Question> {
        self.questions.last()
    }

    pub fn latest_unanswered_question(&self) -> Option<&Question> {
        self.questions.iter().rev().find(|question| !question.is_answered)
    }
}

/// The shared lobby/game document stored at `sessions/{code}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionCode,
    pub host_id: PlayerId,
    pub players: HashMap<PlayerId, GamePlayer>,
    pub game_started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub game_state: Option<GameState>,
    #[serde(default)]
    pub player_roles: HashMap<PlayerId, PlayerRole>,
    #[serde(with = "wire::epoch_seconds")]
    #[ts(type = "number")]
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh lobby containing only its host.
    pub fn new(id: impl Into<SessionCode>, host: GamePlayer, created_at: DateTime<Utc>) -> Self {
        let host_id = host.id.clone();
        let mut players = HashMap::new();
        players.insert(host_id.clone(), host);

        Self {
            id: id.into(),
            host_id,
            players,
            game_started: false,
            game_state: None,
            player_roles: HashMap::new(),
            created_at,
        }
    }

    pub fn is_member(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.host_id == player_id
    }

    pub fn host(&self) -> Option<&GamePlayer> {
        self.players.get(&self.host_id)
    }

    pub fn role_of(&self, player_id: &str) -> Option<PlayerRole> {
        self.player_roles.get(player_id).copied()
    }

    /// Players ordered by join time, ties broken by id so the order is stable.
    pub fn players_sorted(&self) -> Vec<&GamePlayer> {
        let mut players: Vec<&GamePlayer> = self.players.values().collect();
        players.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
        players
    }

    /// Player ids in lexical order; the canonical input for any random draw.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Copy of the session safe to show `viewer_id`: the secret word is hidden
    /// from everyone but the answerer until the round is over.
    pub fn personalized_for_player(&self, viewer_id: Option<&str>) -> Self {
        let mut session = self.clone();
        if let Some(game_state) = session.game_state.as_mut() {
            let is_answerer = viewer_id == Some(game_state.answerer_id.as_str());
            if !is_answerer && game_state.phase != GamePhase::GameOver {
                game_state.secret_word.clear();
            }
        }
        session
    }
}
