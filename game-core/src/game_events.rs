use game_types::{PlayerId, SessionCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceReason {
    Answered,
    WrongGuess,
    Skipped,
    PlayerLeft,
}

/// Facts produced by a committed transition, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    RoundStarted {
        code: SessionCode,
        round_number: u32,
        answerer_id: PlayerId,
        turn_order: Vec<PlayerId>,
    },
    SecretWordSet {
        code: SessionCode,
        category: String,
    },
    QuestionAsked {
        code: SessionCode,
        question_id: String,
        asker_id: PlayerId,
    },
    QuestionAnswered {
        code: SessionCode,
        question_id: String,
        found: bool,
    },
    TurnAdvanced {
        code: SessionCode,
        from: PlayerId,
        to: PlayerId,
        reason: AdvanceReason,
    },
    GuessMade {
        code: SessionCode,
        player_id: PlayerId,
        correct: bool,
    },
    RoundEnded {
        code: SessionCode,
        winner_id: Option<PlayerId>,
    },
    ReactionAdded {
        code: SessionCode,
        player_id: PlayerId,
        emoji: String,
    },
    ReturnedToLobby {
        code: SessionCode,
    },
    PlayerLeft {
        code: SessionCode,
        player_id: PlayerId,
    },
    HostTransferred {
        code: SessionCode,
        from: PlayerId,
        to: PlayerId,
    },
    SessionDissolved {
        code: SessionCode,
    },
}

impl GameEvent {
    pub fn code(&self) -> &SessionCode {
        match self {
            GameEvent::RoundStarted { code, .. }
            | GameEvent::SecretWordSet { code, .. }
            | GameEvent::QuestionAsked { code, .. }
            | GameEvent::QuestionAnswered { code, .. }
            | GameEvent::TurnAdvanced { code, .. }
            | GameEvent::GuessMade { code, .. }
            | GameEvent::RoundEnded { code, .. }
            | GameEvent::ReactionAdded { code, .. }
            | GameEvent::ReturnedToLobby { code }
            | GameEvent::PlayerLeft { code, .. }
            | GameEvent::HostTransferred { code, .. }
            | GameEvent::SessionDissolved { code } => code,
        }
    }
}

/// Event handler trait for processing game events
pub trait GameEventHandler: Send {
    fn handle_event(&mut self, event: &GameEvent);
}

/// Simple event bus for distributing game events
pub struct GameEventBus {
    handlers: Vec<Box<dyn GameEventHandler>>,
}

impl GameEventBus {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Box<dyn GameEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn publish(&mut self, event: &GameEvent) {
        for handler in &mut self.handlers {
            handler.handle_event(event);
        }
    }

    pub fn publish_all<'a>(&mut self, events: impl IntoIterator<Item = &'a GameEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}

impl Default for GameEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes events to the tracing log; round boundaries at info, the rest at debug.
pub struct TracingEventHandler;

impl GameEventHandler for TracingEventHandler {
    fn handle_event(&mut self, event: &GameEvent) {
        match event {
            GameEvent::RoundStarted { .. }
            | GameEvent::RoundEnded { .. }
            | GameEvent::SessionDissolved { .. } => {
                tracing::info!(code = %event.code(), "game event: {:?}", event)
            }
            _ => tracing::debug!(code = %event.code(), "game event: {:?}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct TestHandler {
        events: Arc<Mutex<Vec<GameEvent>>>,
    }

    impl GameEventHandler for TestHandler {
        fn handle_event(&mut self, event: &GameEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_event_bus_delivers_in_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut bus = GameEventBus::new();
        bus.add_handler(Box::new(TestHandler { events: events.clone() }));

        let published = vec![
            GameEvent::SecretWordSet { code: "ABC123".into(), category: "Animals".into() },
            GameEvent::ReturnedToLobby { code: "ABC123".into() },
        ];
        bus.publish_all(&published);

        assert_eq!(*events.lock().unwrap(), published);
    }

    #[test]
    fn test_event_code() {
        let event = GameEvent::SessionDissolved { code: "XYZ789".into() };
        assert_eq!(event.code(), "XYZ789");
    }
}
