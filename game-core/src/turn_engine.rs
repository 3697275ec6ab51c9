use chrono::{DateTime, Utc};
use game_types::{
    DEFAULT_TURN_TIME_LIMIT, EmojiReaction, GameError, GamePhase, GameState, PlayerId, PlayerRole,
    Question, Session,
};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;

use crate::game_events::{AdvanceReason, GameEvent};
use crate::word_validation::{
    is_correct_guess, validate_glyph, validate_guess, validate_question, validate_secret_word,
};

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub min_players: usize,
    pub max_players: usize,
    pub turn_time_limit: u32, // seconds
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_players: MIN_PLAYERS,
            max_players: MAX_PLAYERS,
            turn_time_limit: DEFAULT_TURN_TIME_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameAction {
    StartGame,
    SetSecretWord { category: String, word: String },
    AskQuestion { text: String },
    AnswerQuestion { question_id: String, answer: String },
    MakeGuess { guess: String },
    SkipTurn,
    AddReaction { emoji: String },
    PlayAgain,
    ResetToLobby,
    Leave,
}

impl GameAction {
    pub fn name(&self) -> &'static str {
        match self {
            GameAction::StartGame => "start_game",
            GameAction::SetSecretWord { .. } => "set_secret_word",
            GameAction::AskQuestion { .. } => "ask_question",
            GameAction::AnswerQuestion { .. } => "answer_question",
            GameAction::MakeGuess { .. } => "make_guess",
            GameAction::SkipTurn => "skip_turn",
            GameAction::AddReaction { .. } => "add_reaction",
            GameAction::PlayAgain => "play_again",
            GameAction::ResetToLobby => "reset_to_lobby",
            GameAction::Leave => "leave",
        }
    }
}

/// The store writes a transition needs, at the narrowest granularity the
/// document layout allows.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPatch {
    /// Replace `gameState` as a whole.
    GameState(GameState),
    /// New round: `gameState`, `playerRoles` and `gameStarted = true`.
    Round {
        game_state: GameState,
        roles: HashMap<PlayerId, PlayerRole>,
    },
    /// Clear `gameState` and `playerRoles`, `gameStarted = false`.
    Lobby,
    /// Append one reaction to `gameState/reactions`. `index` is its position
    /// in the snapshot the engine saw; the store appends at the live end.
    Reaction {
        index: usize,
        reaction: EmojiReaction,
    },
    /// Remove a member, optionally moving the host and rewriting `gameState`.
    Departure {
        player_id: PlayerId,
        new_host: Option<PlayerId>,
        game_state: Option<GameState>,
    },
    /// Delete the whole session.
    Dissolve,
}

#[derive(Debug, Clone)]
pub struct Transition {
    /// Resulting session, `None` once dissolved.
    pub session: Option<Session>,
    pub patch: SessionPatch,
    pub events: Vec<GameEvent>,
}

/// Phase and turn state machine. Every transition is a pure function of the
/// current session, the acting player, the action, the clock and an RNG.
#[derive(Debug, Clone, Default)]
pub struct TurnEngine {
    config: EngineConfig,
}

impl TurnEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn apply<R: Rng + ?Sized>(
        &self,
        session: &Session,
        actor: &str,
        action: GameAction,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Transition, GameError> {
        if !session.is_member(actor) {
            return Err(GameError::NotInSession);
        }

        match action {
            GameAction::StartGame => self.start_game(session, actor, rng),
            GameAction::SetSecretWord { category, word } => {
                self.set_secret_word(session, actor, &category, &word, now)
            }
            GameAction::AskQuestion { text } => self.ask_question(session, actor, &text, now, rng),
            GameAction::AnswerQuestion {
                question_id,
                answer,
            } => self.answer_question(session, actor, &question_id, &answer, now),
            GameAction::MakeGuess { guess } => self.make_guess(session, actor, &guess, now),
            GameAction::SkipTurn => self.skip_turn(session, actor, now),
            GameAction::AddReaction { emoji } => self.add_reaction(session, actor, &emoji, now, rng),
            GameAction::PlayAgain => self.play_again(session, actor, rng),
            GameAction::ResetToLobby => self.reset_to_lobby(session, actor),
            GameAction::Leave => self.leave(session, actor, now, rng),
        }
    }

    /// Checks a prospective member against the lobby rules.
    pub fn check_admission(&self, session: &Session, player_id: &str) -> Result<(), GameError> {
        if session.game_started {
            return Err(GameError::GameAlreadyStarted);
        }
        if session.is_member(player_id) {
            return Err(GameError::AlreadyInSession);
        }
        if session.players.len() >= self.config.max_players {
            return Err(GameError::SessionFull {
                capacity: self.config.max_players as u32,
            });
        }
        Ok(())
    }

    pub fn start_game<R: Rng + ?Sized>(
        &self,
        session: &Session,
        actor: &str,
        rng: &mut R,
    ) -> Result<Transition, GameError> {
        if !session.is_host(actor) {
            return Err(GameError::unauthorized("start the game"));
        }
        if session.game_started {
            return Err(GameError::GameAlreadyStarted);
        }
        self.begin_round(session, 1, rng)
    }

    pub fn play_again<R: Rng + ?Sized>(
        &self,
        session: &Session,
        actor: &str,
        rng: &mut R,
    ) -> Result<Transition, GameError> {
        if !session.is_host(actor) {
            return Err(GameError::unauthorized("start a new round"));
        }
        if !session.game_started {
            return Err(GameError::GameNotStarted);
        }
        let round_number = session
            .game_state
            .as_ref()
            .map(|state| state.round_number + 1)
            .unwrap_or(1);
        self.begin_round(session, round_number, rng)
    }

    fn begin_round<R: Rng + ?Sized>(
        &self,
        session: &Session,
        round_number: u32,
        rng: &mut R,
    ) -> Result<Transition, GameError> {
        let required = self.config.min_players.max(MIN_PLAYERS);
        if session.players.len() < required {
            return Err(GameError::InsufficientPlayers {
                required: required as u32,
                actual: session.players.len() as u32,
            });
        }

        let mut ids = session.player_ids();
        ids.shuffle(rng);
        let Some((answerer_id, guessers)) = ids.split_first() else {
            return Err(GameError::InsufficientPlayers {
                required: required as u32,
                actual: 0,
            });
        };

        let mut turn_order = guessers.to_vec();
        turn_order.shuffle(rng);
        let current_turn_player_id = turn_order.first().cloned().unwrap_or_default();

        let roles: HashMap<PlayerId, PlayerRole> = session
            .players
            .keys()
            .map(|id| {
                let role = if id == answerer_id {
                    PlayerRole::Answerer
                } else {
                    PlayerRole::Guesser
                };
                (id.clone(), role)
            })
            .collect();

        let game_state = GameState {
            answerer_id: answerer_id.clone(),
            category: String::new(),
            secret_word: String::new(),
            current_turn_player_id,
            phase: GamePhase::Setup,
            turn_order: turn_order.clone(),
            questions: Vec::new(),
            reactions: Vec::new(),
            winner_id: None,
            round_number,
            turn_start_time: None,
            turn_time_limit: self.config.turn_time_limit,
        };

        let mut next = session.clone();
        next.game_started = true;
        next.game_state = Some(game_state.clone());
        next.player_roles = roles.clone();

        Ok(Transition {
            session: Some(next),
            patch: SessionPatch::Round { game_state, roles },
            events: vec![GameEvent::RoundStarted {
                code: session.id.clone(),
                round_number,
                answerer_id: answerer_id.clone(),
                turn_order,
            }],
        })
    }

    pub fn set_secret_word(
        &self,
        session: &Session,
        actor: &str,
        category: &str,
        word: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, GameError> {
        let mut state = current_state(session)?;
        if state.answerer_id != actor || state.phase != GamePhase::Setup {
            return Err(GameError::unauthorized("set the secret word"));
        }
        let (category, word) = validate_secret_word(category, word)?;

        state.category = category.clone();
        state.secret_word = word;
        state.phase = GamePhase::Questioning;
        state.turn_start_time = Some(now);

        let event = GameEvent::SecretWordSet {
            code: session.id.clone(),
            category,
        };
        Ok(replace_state(session, state, vec![event]))
    }

    pub fn ask_question<R: Rng + ?Sized>(
        &self,
        session: &Session,
        actor: &str,
        text: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Transition, GameError> {
        let mut state = current_state(session)?;
        ensure_turn(&state, actor)?;
        let text = validate_question(text)?;

        let question = Question {
            id: new_id(rng),
            asker_id: actor.to_string(),
            asker_name: display_name(session, actor),
            text,
            answer: String::new(),
            is_answered: false,
            timestamp: now,
        };

        let event = GameEvent::QuestionAsked {
            code: session.id.clone(),
            question_id: question.id.clone(),
            asker_id: actor.to_string(),
        };
        // The turn stays with the asker until the answerer responds.
        state.questions.push(question);
        Ok(replace_state(session, state, vec![event]))
    }

    pub fn answer_question(
        &self,
        session: &Session,
        actor: &str,
        question_id: &str,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, GameError> {
        let mut state = current_state(session)?;
        if state.answerer_id != actor || state.phase != GamePhase::Questioning {
            return Err(GameError::unauthorized("answer questions"));
        }
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(GameError::invalid_input("answer must not be empty"));
        }

        let found = match state.questions.iter_mut().find(|q| q.id == question_id) {
            Some(question) => {
                question.answer = answer.to_string();
                question.is_answered = true;
                true
            }
            None => false,
        };

        let mut events = vec![GameEvent::QuestionAnswered {
            code: session.id.clone(),
            question_id: question_id.to_string(),
            found,
        }];
        events.extend(advance(&session.id, &mut state, AdvanceReason::Answered, now));
        Ok(replace_state(session, state, events))
    }

    pub fn make_guess(
        &self,
        session: &Session,
        actor: &str,
        guess: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, GameError> {
        let mut state = current_state(session)?;
        ensure_turn(&state, actor)?;
        validate_guess(guess)?;

        let correct = is_correct_guess(guess, &state.secret_word);
        let mut events = vec![GameEvent::GuessMade {
            code: session.id.clone(),
            player_id: actor.to_string(),
            correct,
        }];

        if correct {
            state.winner_id = Some(actor.to_string());
            state.phase = GamePhase::GameOver;
            events.push(GameEvent::RoundEnded {
                code: session.id.clone(),
                winner_id: state.winner_id.clone(),
            });
        } else {
            events.extend(advance(&session.id, &mut state, AdvanceReason::WrongGuess, now));
        }

        Ok(replace_state(session, state, events))
    }

    pub fn skip_turn(
        &self,
        session: &Session,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, GameError> {
        let mut state = current_state(session)?;
        ensure_turn(&state, actor)?;
        let events = advance(&session.id, &mut state, AdvanceReason::Skipped, now);
        Ok(replace_state(session, state, events.into_iter().collect()))
    }

    pub fn add_reaction<R: Rng + ?Sized>(
        &self,
        session: &Session,
        actor: &str,
        emoji: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Transition, GameError> {
        let mut state = current_state(session)?;
        validate_glyph(emoji)?;

        let reaction = EmojiReaction {
            id: new_id(rng),
            player_id: actor.to_string(),
            player_name: display_name(session, actor),
            emoji: emoji.trim().to_string(),
            timestamp: now,
        };
        let index = state.reactions.len();
        state.reactions.push(reaction.clone());

        let mut next = session.clone();
        next.game_state = Some(state);

        Ok(Transition {
            session: Some(next),
            patch: SessionPatch::Reaction {
                index,
                reaction: reaction.clone(),
            },
            events: vec![GameEvent::ReactionAdded {
                code: session.id.clone(),
                player_id: actor.to_string(),
                emoji: reaction.emoji,
            }],
        })
    }

    pub fn reset_to_lobby(&self, session: &Session, actor: &str) -> Result<Transition, GameError> {
        if !session.is_host(actor) {
            return Err(GameError::unauthorized("return to the lobby"));
        }

        let mut next = session.clone();
        next.game_state = None;
        next.game_started = false;
        next.player_roles.clear();

        Ok(Transition {
            session: Some(next),
            patch: SessionPatch::Lobby,
            events: vec![GameEvent::ReturnedToLobby {
                code: session.id.clone(),
            }],
        })
    }

    pub fn leave<R: Rng + ?Sized>(
        &self,
        session: &Session,
        actor: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Transition, GameError> {
        let code = session.id.clone();
        let mut next = session.clone();
        next.players.remove(actor);
        next.player_roles.remove(actor);

        let mut events = vec![GameEvent::PlayerLeft {
            code: code.clone(),
            player_id: actor.to_string(),
        }];

        if next.players.is_empty() {
            events.push(GameEvent::SessionDissolved { code });
            return Ok(Transition {
                session: None,
                patch: SessionPatch::Dissolve,
                events,
            });
        }

        let mut new_host = None;
        if session.is_host(actor) {
            let remaining = next.player_ids();
            if let Some(host_id) = remaining.choose(rng) {
                next.host_id = host_id.clone();
                new_host = Some(host_id.clone());
                events.push(GameEvent::HostTransferred {
                    code: code.clone(),
                    from: actor.to_string(),
                    to: host_id.clone(),
                });
            }
        }

        let mut game_state = None;
        if let Some(state) = next.game_state.as_mut() {
            if remove_from_round(&code, state, actor, now, &mut events) {
                game_state = Some(state.clone());
            }
        }

        Ok(Transition {
            session: Some(next),
            patch: SessionPatch::Departure {
                player_id: actor.to_string(),
                new_host,
                game_state,
            },
            events,
        })
    }
}

/// Moves the turn to the next guesser in `turn_order`, wrapping to the start.
/// A current player missing from the order restarts at index 0. Returns the
/// previous turn holder, or `None` when there is nobody to advance to.
pub fn advance_turn(state: &mut GameState) -> Option<PlayerId> {
    if state.turn_order.is_empty() {
        return None;
    }
    let next_index = state
        .turn_order
        .iter()
        .position(|id| *id == state.current_turn_player_id)
        .map(|index| (index + 1) % state.turn_order.len())
        .unwrap_or(0);
    let next = state.turn_order[next_index].clone();
    Some(std::mem::replace(&mut state.current_turn_player_id, next))
}

fn advance(
    code: &str,
    state: &mut GameState,
    reason: AdvanceReason,
    now: DateTime<Utc>,
) -> Option<GameEvent> {
    let from = advance_turn(state)?;
    state.turn_start_time = Some(now);
    Some(GameEvent::TurnAdvanced {
        code: code.to_string(),
        from,
        to: state.current_turn_player_id.clone(),
        reason,
    })
}

/// Applies a departure to the running round. Returns whether `state` changed.
fn remove_from_round(
    code: &str,
    state: &mut GameState,
    player_id: &str,
    now: DateTime<Utc>,
    events: &mut Vec<GameEvent>,
) -> bool {
    let active = state.phase != GamePhase::GameOver;

    if state.answerer_id == player_id {
        if !active {
            return false;
        }
        state.phase = GamePhase::GameOver;
        state.winner_id = None;
        events.push(GameEvent::RoundEnded {
            code: code.to_string(),
            winner_id: None,
        });
        return true;
    }

    let Some(position) = state.turn_order.iter().position(|id| id == player_id) else {
        return false;
    };
    state.turn_order.remove(position);

    if !active {
        return true;
    }

    if state.turn_order.is_empty() {
        state.phase = GamePhase::GameOver;
        state.winner_id = Some(state.answerer_id.clone());
        events.push(GameEvent::RoundEnded {
            code: code.to_string(),
            winner_id: state.winner_id.clone(),
        });
    } else if state.current_turn_player_id == player_id {
        state.current_turn_player_id = state.turn_order[0].clone();
        state.turn_start_time = Some(now);
        events.push(GameEvent::TurnAdvanced {
            code: code.to_string(),
            from: player_id.to_string(),
            to: state.current_turn_player_id.clone(),
            reason: AdvanceReason::PlayerLeft,
        });
    }
    true
}

fn current_state(session: &Session) -> Result<GameState, GameError> {
    session.game_state.clone().ok_or(GameError::GameNotStarted)
}

fn ensure_turn(state: &GameState, actor: &str) -> Result<(), GameError> {
    if state.phase != GamePhase::Questioning
        || state.current_turn_player_id != actor
        || !state.is_guesser(actor)
    {
        return Err(GameError::NotYourTurn);
    }
    Ok(())
}

fn replace_state(session: &Session, state: GameState, events: Vec<GameEvent>) -> Transition {
    let mut next = session.clone();
    next.game_state = Some(state.clone());
    Transition {
        session: Some(next),
        patch: SessionPatch::GameState(state),
        events,
    }
}

fn display_name(session: &Session, player_id: &str) -> String {
    session
        .players
        .get(player_id)
        .map(|player| player.display_name.clone())
        .unwrap_or_default()
}

fn new_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    uuid::Builder::from_random_bytes(rng.r#gen()).into_uuid().to_string()
}
