use chrono::{DateTime, Utc};
use game_types::{EmojiReaction, GamePhase, GamePlayer, GameState, PlayerRole, Question, Session};

use crate::reactions::ReactionWindow;
use crate::turn_timer::{TurnCountdown, remaining_turn_seconds};

/// Read-only projection of a session from one member's point of view.
#[derive(Debug, Clone)]
pub struct PlayerView {
    session: Session,
    user_id: String,
}

impl PlayerView {
    pub fn new(session: Session, user_id: impl Into<String>) -> Self {
        Self {
            session,
            user_id: user_id.into(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn game_state(&self) -> Option<&GameState> {
        self.session.game_state.as_ref()
    }

    pub fn phase(&self) -> Option<GamePhase> {
        self.game_state().map(|state| state.phase)
    }

    pub fn role(&self) -> Option<PlayerRole> {
        self.session.role_of(&self.user_id)
    }

    pub fn is_host(&self) -> bool {
        self.session.is_host(&self.user_id)
    }

    pub fn is_answerer(&self) -> bool {
        self.game_state()
            .is_some_and(|state| state.answerer_id == self.user_id)
    }

    pub fn is_guesser(&self) -> bool {
        self.game_state()
            .is_some_and(|state| state.is_guesser(&self.user_id))
    }

    /// Whether the UI should prompt this player to act: the answerer picks the
    /// word during setup and answers pending questions, a guesser acts on
    /// their own turn.
    pub fn is_my_turn(&self) -> bool {
        let Some(state) = self.game_state() else {
            return false;
        };
        match state.phase {
            GamePhase::Setup => self.is_answerer(),
            GamePhase::Questioning => {
                if self.is_answerer() {
                    state.latest_unanswered_question().is_some()
                } else {
                    state.current_turn_player_id == self.user_id
                }
            }
            GamePhase::GameOver => false,
        }
    }

    pub fn current_turn_player(&self) -> Option<&GamePlayer> {
        let state = self.game_state()?;
        let id = match state.phase {
            GamePhase::Setup => &state.answerer_id,
            _ => &state.current_turn_player_id,
        };
        self.session.players.get(id)
    }

    pub fn answerer(&self) -> Option<&GamePlayer> {
        let state = self.game_state()?;
        self.session.players.get(&state.answerer_id)
    }

    pub fn winner(&self) -> Option<&GamePlayer> {
        let winner_id = self.game_state()?.winner_id.as_ref()?;
        self.session.players.get(winner_id)
    }

    pub fn players_sorted(&self) -> Vec<&GamePlayer> {
        self.session.players_sorted()
    }

    pub fn pending_question(&self) -> Option<&Question> {
        self.game_state()?.latest_unanswered_question()
    }

    pub fn questions(&self) -> &[Question] {
        self.game_state()
            .map(|state| state.questions.as_slice())
            .unwrap_or_default()
    }

    pub fn visible_reactions(&self, window: &ReactionWindow, now: DateTime<Utc>) -> Vec<&EmojiReaction> {
        self.game_state()
            .map(|state| window.visible(&state.reactions, now))
            .unwrap_or_default()
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<u32> {
        remaining_turn_seconds(self.game_state()?, now)
    }

    pub fn countdown(&self, now: DateTime<Utc>) -> Option<TurnCountdown> {
        TurnCountdown::of(self.game_state()?, now)
    }

    /// Secret word as this player may see it; empty for guessers mid-round.
    pub fn visible_secret_word(&self) -> Option<&str> {
        let state = self.game_state()?;
        if self.is_answerer() || state.phase == GamePhase::GameOver {
            Some(state.secret_word.as_str())
        } else {
            None
        }
    }
}
