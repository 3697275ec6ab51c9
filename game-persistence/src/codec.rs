//! Conversion between store trees and domain types.
//!
//! Decoding is lenient about individual entries the way the mobile clients
//! were: an unreadable player, role, question or reaction is dropped with a
//! warning instead of failing the whole session. A session whose own fields
//! or `gameState` cannot be read fails with [`CodecError`].

use game_types::{EmojiReaction, GameError, GamePlayer, GameState, PlayerId, PlayerRole, Question, Session, User};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("expected an object for {0}")]
    NotAnObject(&'static str),
    #[error("malformed session: {0}")]
    Session(serde_json::Error),
    #[error("malformed game state: {0}")]
    GameState(serde_json::Error),
    #[error("malformed user: {0}")]
    User(serde_json::Error),
    #[error("failed to encode: {0}")]
    Encode(serde_json::Error),
}

impl From<CodecError> for GameError {
    fn from(err: CodecError) -> Self {
        GameError::InvalidSessionData {
            reason: err.to_string(),
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, CodecError> {
    serde_json::to_value(value).map_err(CodecError::Encode)
}

pub fn encode_session(session: &Session) -> Result<Value, CodecError> {
    encode(session)
}

pub fn encode_game_state(state: &GameState) -> Result<Value, CodecError> {
    encode(state)
}

pub fn encode_player(player: &GamePlayer) -> Result<Value, CodecError> {
    encode(player)
}

pub fn encode_question(question: &Question) -> Result<Value, CodecError> {
    encode(question)
}

pub fn encode_reaction(reaction: &EmojiReaction) -> Result<Value, CodecError> {
    encode(reaction)
}

pub fn encode_roles(roles: &HashMap<PlayerId, PlayerRole>) -> Result<Value, CodecError> {
    encode(roles)
}

pub fn encode_user(user: &User) -> Result<Value, CodecError> {
    encode(user)
}

pub fn decode_user(value: &Value) -> Result<User, CodecError> {
    serde_json::from_value(value.clone()).map_err(CodecError::User)
}

pub fn decode_session(value: &Value) -> Result<Session, CodecError> {
    let Value::Object(fields) = value else {
        return Err(CodecError::NotAnObject("session"));
    };
    let mut fields = fields.clone();

    let game_state = match fields.remove("gameState") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(decode_game_state(&raw)?),
    };

    let players = keep_valid_entries::<GamePlayer>(fields.remove("players"), "player");
    fields.insert("players".to_string(), Value::Object(players));
    let roles = keep_valid_entries::<PlayerRole>(fields.remove("playerRoles"), "player role");
    fields.insert("playerRoles".to_string(), Value::Object(roles));

    let mut session: Session =
        serde_json::from_value(Value::Object(fields)).map_err(CodecError::Session)?;
    session.game_state = game_state;

    if !session.is_member(&session.host_id) {
        warn!("Session {} has host {} outside its player list", session.id, session.host_id);
    }
    Ok(session)
}

pub fn decode_game_state(value: &Value) -> Result<GameState, CodecError> {
    let Value::Object(fields) = value else {
        return Err(CodecError::NotAnObject("gameState"));
    };
    let mut fields = fields.clone();

    let questions = keep_valid_items::<Question>(fields.remove("questions"), "question");
    fields.insert("questions".to_string(), Value::Array(questions));
    let reactions = keep_valid_items::<EmojiReaction>(fields.remove("reactions"), "reaction");
    fields.insert("reactions".to_string(), Value::Array(reactions));

    serde_json::from_value(Value::Object(fields)).map_err(CodecError::GameState)
}

/// Map entries that decode as `T`; anything else is dropped.
fn keep_valid_entries<T: DeserializeOwned>(raw: Option<Value>, what: &str) -> Map<String, Value> {
    let Some(Value::Object(entries)) = raw else {
        return Map::new();
    };
    entries
        .into_iter()
        .filter(|(key, entry)| {
            let valid = serde_json::from_value::<T>(entry.clone()).is_ok();
            if !valid {
                warn!("Dropping unreadable {} '{}'", what, key);
            }
            valid
        })
        .collect()
}

/// List items that decode as `T`. Index-keyed objects are read as lists in
/// index order, since sparse appends may leave them in that shape.
fn keep_valid_items<T: DeserializeOwned>(raw: Option<Value>, what: &str) -> Vec<Value> {
    let items = match raw {
        Some(Value::Array(items)) => items,
        Some(Value::Object(entries)) => {
            let mut indexed: Vec<(usize, Value)> = entries
                .into_iter()
                .filter_map(|(key, item)| key.parse::<usize>().ok().map(|index| (index, item)))
                .collect();
            indexed.sort_by_key(|(index, _)| *index);
            indexed.into_iter().map(|(_, item)| item).collect()
        }
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter(|item| {
            let valid = serde_json::from_value::<T>(item.clone()).is_ok();
            if !valid {
                warn!("Dropping unreadable {}", what);
            }
            valid
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use game_types::GamePhase;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn player(id: &str, joined: i64) -> GamePlayer {
        GamePlayer {
            id: id.into(),
            display_name: id.to_uppercase(),
            avatar: "😀".into(),
            joined_at: at(joined),
        }
    }

    fn minimal_session() -> Session {
        Session::new("ABC123", player("u1", 0), at(0))
    }

    fn maximal_session() -> Session {
        let mut session = minimal_session();
        session.players.insert("u2".into(), player("u2", 1));
        session.game_started = true;
        session.player_roles = HashMap::from([
            ("u1".into(), PlayerRole::Answerer),
            ("u2".into(), PlayerRole::Guesser),
        ]);
        session.game_state = Some(GameState {
            answerer_id: "u1".into(),
            category: "Animals".into(),
            secret_word: "Elephant".into(),
            current_turn_player_id: "u2".into(),
            phase: GamePhase::GameOver,
            turn_order: vec!["u2".into()],
            questions: vec![Question {
                id: "q1".into(),
                asker_id: "u2".into(),
                asker_name: "U2".into(),
                text: "Is it big?".into(),
                answer: "Yes".into(),
                is_answered: true,
                timestamp: at(3),
            }],
            reactions: vec![EmojiReaction {
                id: "r1".into(),
                player_id: "u1".into(),
                player_name: "U1".into(),
                emoji: "🔥".into(),
                timestamp: at(4),
            }],
            winner_id: Some("u2".into()),
            round_number: 2,
            turn_start_time: Some(at(2)),
            turn_time_limit: 45,
        });
        session
    }

    #[test]
    fn test_session_round_trip() {
        for session in [minimal_session(), maximal_session()] {
            let tree = encode_session(&session).unwrap();
            let decoded = decode_session(&tree).unwrap();
            assert_eq!(decoded, session);
            assert_eq!(encode_session(&decoded).unwrap(), tree);
        }
    }

    #[test]
    fn test_store_tree_round_trip() {
        let tree = json!({
            "id": "ABC123",
            "hostId": "u1",
            "players": {
                "u1": {"id": "u1", "displayName": "Ann", "avatar": "😀", "joinedAt": 1700000000}
            },
            "gameStarted": false,
            "playerRoles": {},
            "createdAt": 1700000000.5
        });
        let session = decode_session(&tree).unwrap();
        assert_eq!(encode_session(&session).unwrap(), tree);
    }

    #[test]
    fn test_legacy_sentinels() {
        let tree = json!({
            "answererID": "u1",
            "category": "",
            "secretWord": "",
            "currentTurnPlayerID": "u2",
            "phase": "setup",
            "turnOrder": ["u2"],
            "winnerID": "",
            "roundNumber": 1,
            "turnStartTime": 0
        });
        let state = decode_game_state(&tree).unwrap();
        assert_eq!(state.winner_id, None);
        assert_eq!(state.turn_start_time, None);
        assert_eq!(state.turn_time_limit, 30);
        assert!(state.questions.is_empty());
    }

    #[test]
    fn test_bad_entries_are_dropped() {
        let mut tree = encode_session(&maximal_session()).unwrap();
        tree["players"]["ghost"] = json!({"id": 5});
        tree["playerRoles"]["ghost"] = json!("spectator");
        tree["gameState"]["questions"]
            .as_array_mut()
            .unwrap()
            .push(json!({"id": "broken"}));

        let session = decode_session(&tree).unwrap();
        assert_eq!(session.players.len(), 2);
        assert_eq!(session.player_roles.len(), 2);
        assert_eq!(session.game_state.unwrap().questions.len(), 1);
    }

    #[test]
    fn test_index_keyed_reactions() {
        let mut tree = encode_session(&maximal_session()).unwrap();
        let reaction = tree["gameState"]["reactions"][0].clone();
        let mut second = reaction.clone();
        second["id"] = json!("r2");
        tree["gameState"]["reactions"] = json!({"1": second, "0": reaction});

        let state = decode_session(&tree).unwrap().game_state.unwrap();
        let ids: Vec<&str> = state.reactions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_malformed_game_state_fails() {
        let mut tree = encode_session(&maximal_session()).unwrap();
        tree["gameState"]["phase"] = json!("overtime");
        let err = decode_session(&tree).unwrap_err();
        assert!(matches!(err, CodecError::GameState(_)));
        assert!(matches!(GameError::from(err), GameError::InvalidSessionData { .. }));
    }

    #[test]
    fn test_missing_host_is_accepted() {
        let mut session = minimal_session();
        session.host_id = "gone".into();
        let decoded = decode_session(&encode_session(&session).unwrap()).unwrap();
        assert_eq!(decoded.host_id, "gone");
    }

    #[test]
    fn test_not_an_object() {
        assert!(matches!(decode_session(&json!("x")), Err(CodecError::NotAnObject(_))));
    }

    #[test]
    fn test_user_round_trip() {
        let mut user = User::new("u1", "Ann", None);
        user.created_at = at(0);
        let tree = encode_user(&user).unwrap();
        assert_eq!(tree["email"], json!(""));
        assert_eq!(decode_user(&tree).unwrap(), user);
    }

    #[test]
    fn test_user_round_trip_with_every_field() {
        let mut user = User::new("u1", "Ann Lee", Some("ann@example.com".into()));
        user.avatar = "🦊".into();
        user.created_at = at(42);

        let tree = encode_user(&user).unwrap();
        assert_eq!(
            tree,
            json!({
                "id": "u1",
                "displayName": "Ann Lee",
                "email": "ann@example.com",
                "avatar": "🦊",
                "createdAt": 1_700_000_042,
            })
        );
        assert_eq!(decode_user(&tree).unwrap(), user);
        assert_eq!(encode_user(&decode_user(&tree).unwrap()).unwrap(), tree);
    }
}
