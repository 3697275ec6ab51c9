mod common;

use chrono::Duration;
use common::*;
use game_core::{
    AdvanceReason, EngineConfig, GameAction, GameEvent, GameEventBus, SessionPatch, TurnEngine,
    remaining_turn_seconds, should_trigger_timeout,
};
use game_types::{GameError, GamePhase, PlayerRole};

fn skip() -> GameAction {
    GameAction::SkipTurn
}

fn guess(word: &str) -> GameAction {
    GameAction::MakeGuess {
        guess: word.to_string(),
    }
}

fn ask(text: &str) -> GameAction {
    GameAction::AskQuestion {
        text: text.to_string(),
    }
}

#[test]
fn test_start_game_assigns_roles() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(7);
    let lobby = create_lobby(&["Alice", "Bob", "Carol", "Dave"]);

    let transition = apply(&engine, &lobby, "alice", GameAction::StartGame, at(1), &mut rng);
    let session = transition.session.unwrap();
    let state = session.game_state.as_ref().unwrap();

    assert!(session.game_started);
    assert_eq!(state.phase, GamePhase::Setup);
    assert_eq!(state.round_number, 1);
    assert_eq!(state.turn_order.len(), 3);
    assert!(!state.turn_order.contains(&state.answerer_id));
    assert_eq!(state.current_turn_player_id, state.turn_order[0]);
    assert_eq!(state.turn_start_time, None);
    assert_eq!(state.turn_time_limit, 30);

    assert_eq!(session.player_roles.len(), 4);
    assert_eq!(session.role_of(&state.answerer_id), Some(PlayerRole::Answerer));
    for id in &state.turn_order {
        assert_eq!(session.role_of(id), Some(PlayerRole::Guesser));
    }

    match transition.patch {
        SessionPatch::Round { game_state, roles } => {
            assert_eq!(&game_state, state);
            assert_eq!(roles, session.player_roles);
        }
        other => panic!("unexpected patch {other:?}"),
    }
}

#[test]
fn test_start_game_requires_host_and_players() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(1);

    let solo = create_lobby(&["Alice"]);
    assert_eq!(
        engine.apply(&solo, "alice", GameAction::StartGame, at(1), &mut rng).unwrap_err(),
        GameError::InsufficientPlayers {
            required: 2,
            actual: 1
        }
    );

    let lobby = create_lobby(&["Alice", "Bob"]);
    assert!(matches!(
        engine.apply(&lobby, "bob", GameAction::StartGame, at(1), &mut rng),
        Err(GameError::Unauthorized { .. })
    ));

    let started = apply_ok(&engine, &lobby, "alice", GameAction::StartGame, at(1), &mut rng);
    assert_eq!(
        engine.apply(&started, "alice", GameAction::StartGame, at(2), &mut rng).unwrap_err(),
        GameError::GameAlreadyStarted
    );
}

#[test]
fn test_configured_minimum_players() {
    let engine = TurnEngine::new(EngineConfig {
        min_players: 3,
        ..EngineConfig::default()
    });
    let mut rng = test_rng(1);
    let lobby = create_lobby(&["Alice", "Bob"]);
    assert_eq!(
        engine.apply(&lobby, "alice", GameAction::StartGame, at(1), &mut rng).unwrap_err(),
        GameError::InsufficientPlayers {
            required: 3,
            actual: 2
        }
    );
}

#[test]
fn test_roles_are_randomized_across_seeds() {
    let engine = TurnEngine::default();
    let lobby = create_lobby(&["Alice", "Bob", "Carol", "Dave"]);
    let answerers: std::collections::HashSet<String> = (0..40)
        .map(|seed| {
            let mut rng = test_rng(seed);
            answerer_of(&apply_ok(&engine, &lobby, "alice", GameAction::StartGame, at(1), &mut rng))
        })
        .collect();
    assert!(answerers.len() > 1);
}

#[test]
fn test_full_round_two_players() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(42);
    let lobby = create_lobby(&["U1", "U2"]);

    let session = apply_ok(&engine, &lobby, "u1", GameAction::StartGame, at(1), &mut rng);
    assert_phase(&session, GamePhase::Setup);
    let answerer = answerer_of(&session);
    let guesser = if answerer == "u1" { "u2" } else { "u1" }.to_string();
    assert_eq!(session.role_of(&guesser), Some(PlayerRole::Guesser));

    let session = apply_ok(
        &engine,
        &session,
        &answerer,
        GameAction::SetSecretWord {
            category: "Animals".to_string(),
            word: "Elephant".to_string(),
        },
        at(2),
        &mut rng,
    );
    assert_phase(&session, GamePhase::Questioning);
    assert_eq!(current_turn_of(&session), guesser);
    assert_eq!(session.game_state.as_ref().unwrap().turn_start_time, Some(at(2)));

    let session = apply_ok(&engine, &session, &guesser, ask("Is it big?"), at(3), &mut rng);
    let question = session.game_state.as_ref().unwrap().questions[0].clone();
    assert_eq!(question.text, "Is it big?");
    assert_eq!(question.asker_id, guesser);
    assert_eq!(question.asker_name, guesser.to_uppercase());
    assert!(!question.is_answered);
    // Asking does not move the turn.
    assert_eq!(current_turn_of(&session), guesser);

    let session = apply_ok(
        &engine,
        &session,
        &answerer,
        GameAction::AnswerQuestion {
            question_id: question.id.clone(),
            answer: "Yes".to_string(),
        },
        at(4),
        &mut rng,
    );
    let state = session.game_state.as_ref().unwrap();
    assert!(state.questions[0].is_answered);
    assert_eq!(state.questions[0].answer, "Yes");
    assert_eq!(state.current_turn_player_id, guesser);
    assert_eq!(state.turn_start_time, Some(at(4)));

    let transition = apply(&engine, &session, &guesser, guess("elephant"), at(5), &mut rng);
    let session = transition.session.unwrap();
    let state = session.game_state.as_ref().unwrap();
    assert_eq!(state.phase, GamePhase::GameOver);
    assert_eq!(state.winner_id.as_deref(), Some(guesser.as_str()));
    assert!(transition
        .events
        .iter()
        .any(|event| matches!(event, GameEvent::RoundEnded { winner_id: Some(id), .. } if *id == guesser)));
}

#[test]
fn test_turn_cycling_returns_to_start() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(9);
    let mut session = create_questioning_session(&["A", "B", "C", "D", "E"], &mut rng);
    let order = session.game_state.as_ref().unwrap().turn_order.clone();

    // Start from every index in turn.
    for start in &order {
        session.game_state.as_mut().unwrap().current_turn_player_id = start.clone();
        let original = current_turn_of(&session);
        let mut cursor = session.clone();
        for step in 0..order.len() {
            let actor = current_turn_of(&cursor);
            cursor = apply_ok(&engine, &cursor, &actor, skip(), at(20 + step as i64), &mut rng);
        }
        assert_eq!(current_turn_of(&cursor), original);
    }
}

#[test]
fn test_wrong_guess_advances_turn() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(3);
    let session = create_questioning_session(&["A", "B", "C"], &mut rng);
    let state = session.game_state.as_ref().unwrap();
    let first = state.turn_order[0].clone();
    let second = state.turn_order[1].clone();

    let transition = apply(&engine, &session, &first, guess("ele phant"), at(15), &mut rng);
    let next = transition.session.unwrap();
    let state = next.game_state.as_ref().unwrap();
    assert_eq!(state.phase, GamePhase::Questioning);
    assert_eq!(state.winner_id, None);
    assert_eq!(state.current_turn_player_id, second);
    assert_eq!(state.turn_start_time, Some(at(15)));
    assert!(transition.events.contains(&GameEvent::TurnAdvanced {
        code: TEST_CODE.to_string(),
        from: first,
        to: second,
        reason: AdvanceReason::WrongGuess,
    }));
}

#[test]
fn test_guess_matching_trims_outer_whitespace_only() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(3);
    let session = create_questioning_session(&["A", "B"], &mut rng);
    let guesser = current_turn_of(&session);

    let won = apply_ok(&engine, &session, &guesser, guess("  eLePhAnT "), at(12), &mut rng);
    assert_phase(&won, GamePhase::GameOver);
}

#[test]
fn test_answer_with_unknown_question_still_advances() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(11);
    let session = create_questioning_session(&["A", "B", "C"], &mut rng);
    let answerer = answerer_of(&session);
    let order = session.game_state.as_ref().unwrap().turn_order.clone();

    let transition = apply(
        &engine,
        &session,
        &answerer,
        GameAction::AnswerQuestion {
            question_id: "missing".to_string(),
            answer: "No".to_string(),
        },
        at(20),
        &mut rng,
    );
    let next = transition.session.unwrap();
    assert_eq!(current_turn_of(&next), order[1]);
    assert!(next.game_state.as_ref().unwrap().questions.is_empty());
    assert!(transition.events.iter().any(|event| matches!(
        event,
        GameEvent::QuestionAnswered { found: false, .. }
    )));
}

#[test]
fn test_authorization_gating_leaves_session_untouched() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(5);

    // Setup phase: only the answerer may set the word.
    let lobby = create_lobby(&["A", "B", "C"]);
    let setup = apply_ok(&engine, &lobby, "a", GameAction::StartGame, at(1), &mut rng);
    let guesser = current_turn_of(&setup);
    let before = setup.clone();

    let cases = vec![
        (
            guesser.clone(),
            GameAction::SetSecretWord {
                category: "Animals".into(),
                word: "Cat".into(),
            },
        ),
        (guesser.clone(), ask("Too early?")),
        (guesser.clone(), guess("cat")),
        (guesser.clone(), skip()),
    ];
    for (actor, action) in cases {
        let result = engine.apply(&setup, &actor, action.clone(), at(2), &mut rng);
        assert!(
            matches!(result, Err(GameError::Unauthorized { .. }) | Err(GameError::NotYourTurn)),
            "{} by {actor} should be rejected, got {result:?}",
            action.name()
        );
    }
    assert_eq!(setup, before);

    // Questioning phase.
    let session = create_questioning_session(&["A", "B", "C"], &mut rng);
    let answerer_q = answerer_of(&session);
    let order = session.game_state.as_ref().unwrap().turn_order.clone();
    let not_current = order[1].clone();
    let before = session.clone();

    assert_eq!(
        engine.apply(&session, &not_current, ask("Me?"), at(11), &mut rng).unwrap_err(),
        GameError::NotYourTurn
    );
    assert_eq!(
        engine.apply(&session, &not_current, guess("elephant"), at(11), &mut rng).unwrap_err(),
        GameError::NotYourTurn
    );
    assert_eq!(
        engine.apply(&session, &not_current, skip(), at(11), &mut rng).unwrap_err(),
        GameError::NotYourTurn
    );
    assert_eq!(
        engine.apply(&session, &answerer_q, guess("elephant"), at(11), &mut rng).unwrap_err(),
        GameError::NotYourTurn
    );
    assert!(matches!(
        engine.apply(
            &session,
            &not_current,
            GameAction::AnswerQuestion {
                question_id: "q".into(),
                answer: "Yes".into()
            },
            at(11),
            &mut rng
        ),
        Err(GameError::Unauthorized { .. })
    ));
    assert!(matches!(
        engine.apply(
            &session,
            &answerer_q,
            GameAction::SetSecretWord {
                category: "Food".into(),
                word: "Pizza".into()
            },
            at(11),
            &mut rng
        ),
        Err(GameError::Unauthorized { .. })
    ));
    assert_eq!(session, before);
}

#[test]
fn test_actions_without_round_fail() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(5);
    let lobby = create_lobby(&["A", "B"]);

    assert_eq!(
        engine.apply(&lobby, "b", skip(), at(1), &mut rng).unwrap_err(),
        GameError::GameNotStarted
    );
    assert_eq!(
        engine
            .apply(&lobby, "a", GameAction::AddReaction { emoji: "🔥".into() }, at(1), &mut rng)
            .unwrap_err(),
        GameError::GameNotStarted
    );
    assert_eq!(
        engine.apply(&lobby, "a", GameAction::PlayAgain, at(1), &mut rng).unwrap_err(),
        GameError::GameNotStarted
    );
}

#[test]
fn test_invalid_text_is_rejected() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(6);
    let session = create_questioning_session(&["A", "B"], &mut rng);
    let guesser = current_turn_of(&session);

    assert!(matches!(
        engine.apply(&session, &guesser, ask("   "), at(11), &mut rng),
        Err(GameError::InvalidInput { .. })
    ));
    assert!(matches!(
        engine.apply(&session, &guesser, guess(""), at(11), &mut rng),
        Err(GameError::InvalidInput { .. })
    ));
}

#[test]
fn test_timeout_skip_resets_clock() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(8);
    let mut session = create_questioning_session(&["A", "B", "C"], &mut rng);
    let now = at(100);
    session.game_state.as_mut().unwrap().turn_start_time = Some(now - Duration::seconds(31));

    let state = session.game_state.as_ref().unwrap();
    assert_eq!(remaining_turn_seconds(state, now), Some(0));
    let current = current_turn_of(&session);
    assert!(should_trigger_timeout(&session, &current, now));
    assert!(!should_trigger_timeout(&session, &answerer_of(&session), now));

    let previous_start = state.turn_start_time.unwrap();
    let next = apply_ok(&engine, &session, &current, skip(), now, &mut rng);
    let state = next.game_state.as_ref().unwrap();
    assert_ne!(state.current_turn_player_id, current);
    assert!(state.turn_start_time.unwrap() >= previous_start);
    assert_eq!(remaining_turn_seconds(state, now), Some(30));
}

#[test]
fn test_play_again_starts_fresh_round() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(13);
    let mut session = create_questioning_session(&["A", "B", "C"], &mut rng);
    let guesser = current_turn_of(&session);
    session = apply_ok(&engine, &session, &guesser, ask("Is it grey?"), at(11), &mut rng);
    session = apply_ok(&engine, &session, &guesser, guess("elephant"), at(12), &mut rng);
    assert_phase(&session, GamePhase::GameOver);
    session.game_state.as_mut().unwrap().round_number = 2;

    let host = session.host_id.clone();
    let transition = apply(&engine, &session, &host, GameAction::PlayAgain, at(20), &mut rng);
    let next = transition.session.unwrap();
    let state = next.game_state.as_ref().unwrap();

    assert_eq!(state.round_number, 3);
    assert_eq!(state.phase, GamePhase::Setup);
    assert!(state.questions.is_empty());
    assert!(state.reactions.is_empty());
    assert_eq!(state.winner_id, None);
    assert!(state.secret_word.is_empty());
    assert_eq!(state.turn_order.len(), 2);
    assert!(matches!(transition.patch, SessionPatch::Round { .. }));
}

#[test]
fn test_reset_to_lobby() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(2);
    let session = create_questioning_session(&["A", "B"], &mut rng);

    assert!(matches!(
        engine.apply(&session, "b", GameAction::ResetToLobby, at(30), &mut rng),
        Err(GameError::Unauthorized { .. })
    ));

    let transition = apply(&engine, &session, "a", GameAction::ResetToLobby, at(30), &mut rng);
    assert_eq!(transition.patch, SessionPatch::Lobby);
    let lobby = transition.session.unwrap();
    assert!(!lobby.game_started);
    assert!(lobby.game_state.is_none());
    assert!(lobby.player_roles.is_empty());
    assert_eq!(lobby.players.len(), 2);

    // A new game can start from the lobby again.
    apply_ok(&engine, &lobby, "a", GameAction::StartGame, at(31), &mut rng);
}

#[test]
fn test_reactions_snapshot_display_name() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(4);
    let session = create_questioning_session(&["A", "B", "C"], &mut rng);

    let first = apply(&engine, &session, "c", GameAction::AddReaction { emoji: "🔥".into() }, at(11), &mut rng);
    match &first.patch {
        SessionPatch::Reaction { index, reaction } => {
            assert_eq!(*index, 0);
            assert_eq!(reaction.player_id, "c");
            assert_eq!(reaction.player_name, "C");
            assert_eq!(reaction.emoji, "🔥");
            assert_eq!(reaction.timestamp, at(11));
        }
        other => panic!("unexpected patch {other:?}"),
    }

    let session = first.session.unwrap();
    let second = apply(&engine, &session, "a", GameAction::AddReaction { emoji: "👍".into() }, at(12), &mut rng);
    assert!(matches!(second.patch, SessionPatch::Reaction { index: 1, .. }));
    assert_eq!(second.session.unwrap().game_state.unwrap().reactions.len(), 2);
}

#[test]
fn test_leave_answerer_mid_round_ends_without_winner() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(21);
    let session = create_questioning_session(&["A", "B", "C"], &mut rng);
    let answerer = answerer_of(&session);

    let transition = apply(&engine, &session, &answerer, GameAction::Leave, at(40), &mut rng);
    let next = transition.session.unwrap();
    let state = next.game_state.as_ref().unwrap();
    assert_eq!(state.phase, GamePhase::GameOver);
    assert_eq!(state.winner_id, None);
    assert!(!next.is_member(&answerer));
    assert!(next.role_of(&answerer).is_none());
    match transition.patch {
        SessionPatch::Departure { player_id, game_state, .. } => {
            assert_eq!(player_id, answerer);
            assert_eq!(game_state.as_ref(), Some(state));
        }
        other => panic!("unexpected patch {other:?}"),
    }
}

#[test]
fn test_leave_last_guesser_awards_answerer() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(22);
    let session = create_questioning_session(&["A", "B"], &mut rng);
    let answerer = answerer_of(&session);
    let guesser = current_turn_of(&session);

    let next = apply_ok(&engine, &session, &guesser, GameAction::Leave, at(40), &mut rng);
    let state = next.game_state.as_ref().unwrap();
    assert_eq!(state.phase, GamePhase::GameOver);
    assert_eq!(state.winner_id.as_deref(), Some(answerer.as_str()));
    assert!(state.turn_order.is_empty());
}

#[test]
fn test_leave_non_current_guesser_keeps_turn() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(23);
    let session = create_questioning_session(&["A", "B", "C", "D"], &mut rng);
    let state = session.game_state.as_ref().unwrap();
    let current = state.current_turn_player_id.clone();
    let leaver = state.turn_order[2].clone();

    let next = apply_ok(&engine, &session, &leaver, GameAction::Leave, at(40), &mut rng);
    let state = next.game_state.as_ref().unwrap();
    assert_eq!(state.current_turn_player_id, current);
    assert!(!state.turn_order.contains(&leaver));
    assert_eq!(state.turn_order.len(), 2);
    assert_eq!(state.turn_start_time, Some(at(10)));
    assert_eq!(state.phase, GamePhase::Questioning);
}

#[test]
fn test_leave_current_guesser_moves_turn_to_first() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(24);
    let mut session = create_questioning_session(&["A", "B", "C", "D"], &mut rng);
    let order = session.game_state.as_ref().unwrap().turn_order.clone();
    // Put the turn on the middle guesser so "first" differs from "next".
    session.game_state.as_mut().unwrap().current_turn_player_id = order[1].clone();

    let transition = apply(&engine, &session, &order[1], GameAction::Leave, at(40), &mut rng);
    let next = transition.session.unwrap();
    let state = next.game_state.as_ref().unwrap();
    assert_eq!(state.turn_order, vec![order[0].clone(), order[2].clone()]);
    assert_eq!(state.current_turn_player_id, order[0]);
    assert_eq!(state.turn_start_time, Some(at(40)));
    assert!(transition.events.iter().any(|event| matches!(
        event,
        GameEvent::TurnAdvanced { reason: AdvanceReason::PlayerLeft, .. }
    )));
}

#[test]
fn test_leave_after_game_over_keeps_result() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(25);
    let session = create_questioning_session(&["A", "B", "C"], &mut rng);
    let guesser = current_turn_of(&session);
    let over = apply_ok(&engine, &session, &guesser, guess("Elephant"), at(11), &mut rng);
    let answerer = answerer_of(&over);

    let next = apply_ok(&engine, &over, &answerer, GameAction::Leave, at(12), &mut rng);
    let state = next.game_state.as_ref().unwrap();
    assert_eq!(state.phase, GamePhase::GameOver);
    assert_eq!(state.winner_id.as_deref(), Some(guesser.as_str()));
}

#[test]
fn test_host_transfer_on_leave() {
    let engine = TurnEngine::default();
    for seed in 0..10 {
        let mut rng = test_rng(seed);
        let lobby = create_lobby(&["A", "B", "C"]);
        let transition = apply(&engine, &lobby, "a", GameAction::Leave, at(5), &mut rng);
        let next = transition.session.unwrap();

        assert!(next.is_member(&next.host_id));
        assert_ne!(next.host_id, "a");
        match transition.patch {
            SessionPatch::Departure { new_host, game_state, .. } => {
                assert_eq!(new_host.as_deref(), Some(next.host_id.as_str()));
                assert!(game_state.is_none());
            }
            other => panic!("unexpected patch {other:?}"),
        }
    }
}

#[test]
fn test_last_player_leaving_dissolves_session() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(1);
    let lobby = create_lobby(&["A"]);

    let transition = apply(&engine, &lobby, "a", GameAction::Leave, at(5), &mut rng);
    assert!(transition.session.is_none());
    assert_eq!(transition.patch, SessionPatch::Dissolve);
    assert!(transition
        .events
        .iter()
        .any(|event| matches!(event, GameEvent::SessionDissolved { .. })));
}

#[test]
fn test_non_member_cannot_leave() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(1);
    let lobby = create_lobby(&["A", "B"]);
    assert_eq!(
        engine.apply(&lobby, "z", GameAction::Leave, at(5), &mut rng).unwrap_err(),
        GameError::NotInSession
    );
}

#[test]
fn test_events_reach_handlers() {
    let engine = TurnEngine::default();
    let mut rng = test_rng(30);
    let collector = EventCollector::new();
    let mut bus = GameEventBus::new();
    bus.add_handler(Box::new(collector.clone()));

    let lobby = create_lobby(&["A", "B"]);
    let transition = apply(&engine, &lobby, "a", GameAction::StartGame, at(1), &mut rng);
    bus.publish_all(&transition.events);

    assert_eq!(collector.event_count(), 1);
    assert!(collector.has_event_type(|event| matches!(event, GameEvent::RoundStarted { round_number: 1, .. })));
    assert_eq!(collector.get_events()[0].code(), TEST_CODE);
}
