use chrono::{DateTime, Duration, Utc};
use game_core::{EngineConfig, MAX_PLAYERS, SessionPatch, TurnEngine, generate_game_code, normalize_game_code};
use game_types::{GameError, Session, SessionCode, User};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::codec::{
    decode_session, encode_game_state, encode_player, encode_reaction, encode_roles, encode_session,
};
use crate::store::{Change, DocumentStore, Subscription, join_path};

pub const SESSIONS_ROOT: &str = "sessions";

#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub max_players: usize,
    /// Fresh codes tried before `create_game` gives up.
    pub code_generation_attempts: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_players: MAX_PLAYERS,
            code_generation_attempts: 5,
        }
    }
}

/// How a subscriber should treat one snapshot of `sessions/{code}`.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    /// The session no longer exists.
    Ended,
    /// The session exists but the viewer is not among its players.
    Removed,
    /// The tree could not be decoded; the subscription stays up.
    Invalid(GameError),
    Session(Session),
}

pub fn session_path(code: &str) -> String {
    join_path(SESSIONS_ROOT, code)
}

/// Reads and writes sessions in the document store, translating engine
/// patches into the narrowest writes the layout allows.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn DocumentStore>,
    engine: TurnEngine,
    config: RepositoryConfig,
    rng: Arc<Mutex<StdRng>>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, RepositoryConfig::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: RepositoryConfig) -> Self {
        let engine = TurnEngine::new(EngineConfig {
            max_players: config.max_players,
            ..EngineConfig::default()
        });
        Self {
            store,
            engine,
            config,
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Makes generated codes reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    fn candidate_codes(&self) -> Vec<SessionCode> {
        let attempts = self.config.code_generation_attempts.max(1);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (0..attempts).map(|_| generate_game_code(&mut *rng)).collect()
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Creates a lobby hosted by `host` under a fresh code. Codes already in
    /// use are skipped.
    pub async fn create_game(&self, host: &User, now: DateTime<Utc>) -> Result<Session, GameError> {
        let candidates = self.candidate_codes();
        let attempts = candidates.len();

        for code in candidates {
            let path = session_path(&code);
            if self.store.get(&path).await?.is_some() {
                warn!("Game code {} already in use, retrying", code);
                continue;
            }

            let session = Session::new(code.clone(), host.to_player(now), now);
            self.store.set(&path, encode_session(&session)?).await?;
            info!("Created game {} hosted by {}", code, host.id);
            return Ok(session);
        }

        Err(GameError::NetworkError {
            message: format!("no free game code after {attempts} attempts"),
        })
    }

    /// Adds `user` to the lobby at `code`, writing only their player entry.
    pub async fn join_game(&self, code: &str, user: &User, now: DateTime<Utc>) -> Result<Session, GameError> {
        let code = normalize_game_code(code)?;
        let mut session = self.require(&code).await?;
        self.engine.check_admission(&session, &user.id)?;

        let player = user.to_player(now);
        let path = join_path(&session_path(&code), &format!("players/{}", user.id));
        self.store.set(&path, encode_player(&player)?).await?;
        session.players.insert(player.id.clone(), player);

        info!("Player {} joined game {}", user.id, code);
        Ok(session)
    }

    pub async fn load(&self, code: &str) -> Result<Option<Session>, GameError> {
        match self.store.get(&session_path(code)).await? {
            Some(tree) => Ok(Some(decode_session(&tree)?)),
            None => Ok(None),
        }
    }

    pub async fn require(&self, code: &str) -> Result<Session, GameError> {
        self.load(code).await?.ok_or_else(|| GameError::SessionNotFound {
            code: code.to_string(),
        })
    }

    pub async fn subscribe(&self, code: &str) -> Result<Subscription, GameError> {
        Ok(self.store.subscribe(&session_path(code)).await?)
    }

    /// Persists one engine transition.
    pub async fn commit(&self, code: &str, patch: &SessionPatch) -> Result<(), GameError> {
        let base = session_path(code);
        match patch {
            SessionPatch::GameState(state) => {
                self.store
                    .set(&join_path(&base, "gameState"), encode_game_state(state)?)
                    .await?;
            }
            SessionPatch::Round { game_state, roles } => {
                let changes: Vec<Change> = vec![
                    ("gameState".into(), Some(encode_game_state(game_state)?)),
                    ("playerRoles".into(), Some(encode_roles(roles)?)),
                    ("gameStarted".into(), Some(json!(true))),
                ];
                self.store.update(&base, changes).await?;
            }
            SessionPatch::Lobby => {
                let changes: Vec<Change> = vec![
                    ("gameState".into(), None),
                    ("playerRoles".into(), None),
                    ("gameStarted".into(), Some(json!(false))),
                ];
                self.store.update(&base, changes).await?;
            }
            SessionPatch::Reaction { reaction, .. } => {
                // Appended at the live end of the list, and only while a round
                // exists, so a stale snapshot cannot recreate a partial gameState.
                let appended = self
                    .store
                    .append_if_present(
                        &join_path(&base, "gameState/answererID"),
                        &join_path(&base, "gameState/reactions"),
                        encode_reaction(reaction)?,
                    )
                    .await?;
                if appended.is_none() {
                    return Err(GameError::GameNotStarted);
                }
            }
            SessionPatch::Departure {
                player_id,
                new_host,
                game_state,
            } => {
                let mut changes: Vec<Change> = vec![
                    (format!("players/{player_id}"), None),
                    (format!("playerRoles/{player_id}"), None),
                ];
                if let Some(host_id) = new_host {
                    changes.push(("hostId".into(), Some(Value::String(host_id.clone()))));
                }
                if let Some(state) = game_state {
                    changes.push(("gameState".into(), Some(encode_game_state(state)?)));
                }
                self.store.update(&base, changes).await?;
            }
            SessionPatch::Dissolve => {
                self.store.delete(&base).await?;
                info!("Game {} dissolved", code);
            }
        }
        debug!("Committed {} to game {}", patch_name(patch), code);
        Ok(())
    }

    /// Deletes sessions created more than `max_age` before `now`.
    /// Returns the codes removed.
    pub async fn sweep_stale_sessions(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionCode>, GameError> {
        let mut removed = Vec::new();
        for code in self.store.child_keys(SESSIONS_ROOT).await? {
            let stale = match self.load(&code).await {
                Ok(Some(session)) => now - session.created_at > max_age,
                Ok(None) => false,
                Err(GameError::InvalidSessionData { reason }) => {
                    warn!("Removing unreadable game {}: {}", code, reason);
                    true
                }
                Err(err) => return Err(err),
            };
            if stale {
                self.store.delete(&session_path(&code)).await?;
                removed.push(code);
            }
        }
        if !removed.is_empty() {
            info!("Swept {} stale games", removed.len());
        }
        Ok(removed)
    }

    /// Interprets one subscription delivery for `user_id`.
    pub fn classify_snapshot(snapshot: Option<Value>, user_id: &str) -> SnapshotOutcome {
        let Some(tree) = snapshot else {
            return SnapshotOutcome::Ended;
        };
        match decode_session(&tree) {
            Ok(session) if !session.is_member(user_id) => SnapshotOutcome::Removed,
            Ok(session) => SnapshotOutcome::Session(session),
            Err(err) => SnapshotOutcome::Invalid(err.into()),
        }
    }
}

fn patch_name(patch: &SessionPatch) -> &'static str {
    match patch {
        SessionPatch::GameState(_) => "game state",
        SessionPatch::Round { .. } => "round start",
        SessionPatch::Lobby => "lobby reset",
        SessionPatch::Reaction { .. } => "reaction",
        SessionPatch::Departure { .. } => "departure",
        SessionPatch::Dissolve => "dissolve",
    }
}
