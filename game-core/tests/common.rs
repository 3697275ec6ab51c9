#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use game_core::{GameAction, GameEvent, GameEventHandler, Transition, TurnEngine};
use game_types::{GamePhase, GamePlayer, Session};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};

pub const TEST_CODE: &str = "ABC123";

/// Fixed clock origin, offset by `secs`.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn test_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Creates a test player whose id is the lowercased name
pub fn create_test_player(name: &str, joined_secs: i64) -> GamePlayer {
    GamePlayer {
        id: name.to_lowercase(),
        display_name: name.to_string(),
        avatar: "😀".to_string(),
        joined_at: at(joined_secs),
    }
}

/// Lobby hosted by the first name, everyone else joining one second apart
pub fn create_lobby(names: &[&str]) -> Session {
    let mut session = Session::new(TEST_CODE, create_test_player(names[0], 0), at(0));
    for (offset, name) in names.iter().enumerate().skip(1) {
        let player = create_test_player(name, offset as i64);
        session.players.insert(player.id.clone(), player);
    }
    session
}

/// Applies an action that is expected to succeed and returns the new session
pub fn apply_ok(
    engine: &TurnEngine,
    session: &Session,
    actor: &str,
    action: GameAction,
    now: DateTime<Utc>,
    rng: &mut StdRng,
) -> Session {
    let transition = engine
        .apply(session, actor, action.clone(), now, rng)
        .unwrap_or_else(|err| panic!("{} by {actor} failed: {err}", action.name()));
    transition.session.expect("session dissolved unexpectedly")
}

pub fn apply(
    engine: &TurnEngine,
    session: &Session,
    actor: &str,
    action: GameAction,
    now: DateTime<Utc>,
    rng: &mut StdRng,
) -> Transition {
    engine.apply(session, actor, action, now, rng).unwrap()
}

/// Started round with the secret word set; phase is `questioning` from `at(10)`
pub fn create_questioning_session(names: &[&str], rng: &mut StdRng) -> Session {
    let engine = TurnEngine::default();
    let lobby = create_lobby(names);
    let host = lobby.host_id.clone();
    let started = apply_ok(&engine, &lobby, &host, GameAction::StartGame, at(5), rng);
    let answerer = answerer_of(&started);
    apply_ok(
        &engine,
        &started,
        &answerer,
        GameAction::SetSecretWord {
            category: "Animals".to_string(),
            word: "Elephant".to_string(),
        },
        at(10),
        rng,
    )
}

pub fn answerer_of(session: &Session) -> String {
    session.game_state.as_ref().unwrap().answerer_id.clone()
}

pub fn current_turn_of(session: &Session) -> String {
    session.game_state.as_ref().unwrap().current_turn_player_id.clone()
}

/// Asserts the round is in the expected phase
pub fn assert_phase(session: &Session, expected: GamePhase) {
    let actual = session.game_state.as_ref().map(|state| state.phase);
    assert_eq!(actual, Some(expected), "Expected phase {expected:?}, got {actual:?}");
}

/// Event collector for testing event emissions
#[derive(Clone, Default)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_events(&self) -> Vec<GameEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn has_event_type(&self, check_fn: impl Fn(&GameEvent) -> bool) -> bool {
        self.events.lock().unwrap().iter().any(check_fn)
    }
}

impl GameEventHandler for EventCollector {
    fn handle_event(&mut self, event: &GameEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
