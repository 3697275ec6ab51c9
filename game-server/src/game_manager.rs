use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::auth::Identity;
use crate::config::Config;
use game_core::{GameAction, GameEventBus, TracingEventHandler, TurnEngine};
use game_persistence::{DocumentStore, SessionRepository, UserRepository};
use game_types::{GameError, Session, User};

/// Server-side entry point for session operations: every action is validated
/// by the turn engine against the stored session, then committed.
pub struct GameManager {
    sessions: SessionRepository,
    users: UserRepository,
    engine: TurnEngine,
    rng: Mutex<StdRng>,
    events: Mutex<GameEventBus>,
}

impl GameManager {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self::with_parts(
            SessionRepository::with_config(store.clone(), config.repository_config()),
            UserRepository::new(store),
            TurnEngine::new(config.engine_config()),
        )
    }

    pub fn with_parts(sessions: SessionRepository, users: UserRepository, engine: TurnEngine) -> Self {
        let mut events = GameEventBus::new();
        events.add_handler(Box::new(TracingEventHandler));
        Self {
            sessions,
            users,
            engine,
            rng: Mutex::new(StdRng::from_entropy()),
            events: Mutex::new(events),
        }
    }

    pub fn sessions(&self) -> &SessionRepository {
        &self.sessions
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    /// Loads the caller's profile, creating it on first sign-in.
    pub async fn sign_in(&self, identity: &Identity) -> Result<User, GameError> {
        self.users
            .get_or_create(&identity.id, &identity.display_name, identity.email.clone())
            .await
    }

    pub async fn create_game(&self, host: &User) -> Result<Session, GameError> {
        self.sessions.create_game(host, Utc::now()).await
    }

    pub async fn join_game(&self, code: &str, user: &User) -> Result<Session, GameError> {
        self.sessions.join_game(code, user, Utc::now()).await
    }

    /// Applies `action` for `actor` and commits it. Returns the resulting
    /// session, or `None` once it has been dissolved.
    pub async fn perform(
        &self,
        code: &str,
        actor: &str,
        action: GameAction,
    ) -> Result<Option<Session>, GameError> {
        let session = self.sessions.require(code).await?;
        let name = action.name();
        let transition = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.engine.apply(&session, actor, action, Utc::now(), &mut *rng)?
        };

        self.sessions.commit(code, &transition.patch).await?;
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .publish_all(&transition.events);
        debug!("{} performed {} in game {}", actor, name, code);
        Ok(transition.session)
    }

    /// The session as `viewer` may see it.
    pub async fn session_for(&self, code: &str, viewer: Option<&str>) -> Result<Session, GameError> {
        let session = self.sessions.require(code).await?;
        Ok(session.personalized_for_player(viewer))
    }

    /// Membership check used when a client re-subscribes after reconnecting.
    pub async fn require_member(&self, code: &str, user_id: &str) -> Result<Session, GameError> {
        let session = self.sessions.require(code).await?;
        if !session.is_member(user_id) {
            return Err(GameError::NotInSession);
        }
        Ok(session)
    }

    pub async fn update_avatar(&self, user_id: &str, avatar: &str) -> Result<User, GameError> {
        self.users.update_avatar(user_id, avatar).await
    }

    pub async fn cleanup_stale_sessions(&self, max_age: chrono::Duration) -> Result<usize, GameError> {
        let removed = self.sessions.sweep_stale_sessions(max_age, Utc::now()).await?;
        Ok(removed.len())
    }
}
