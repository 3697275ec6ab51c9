//! Client-side owner of one session membership: keeps a live subscription,
//! mirrors the remote session locally, runs the turn countdown and turns user
//! intents into engine transitions committed through the repository.

use chrono::Utc;
use game_core::{
    EngineConfig, GameAction, PlayerView, TurnCountdown, TurnEngine, TurnKey,
    should_trigger_timeout,
};
use game_persistence::{SessionRepository, SnapshotOutcome, Subscription};
use game_types::{GameError, PlayerId, Session, SessionCode, User};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityMonitor;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Refuse mutating intents while the connectivity monitor reports offline.
    pub block_when_offline: bool,
    /// Countdown refresh cadence.
    pub tick: Duration,
    pub engine: EngineConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            block_when_offline: true,
            tick: Duration::from_secs(1),
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    SessionUpdated { code: SessionCode },
    SessionEnded { code: SessionCode },
    RemovedFromSession { code: SessionCode },
    /// A snapshot could not be decoded. The subscription stays up.
    DecodeFailed { code: SessionCode, error: GameError },
    /// A background action (such as a timeout skip) failed.
    Error(GameError),
    TurnTimedOut { player_id: PlayerId },
}

#[derive(Default)]
struct Tasks {
    code: Option<SessionCode>,
    subscription: Option<JoinHandle<()>>,
    timer: Option<(TurnKey, JoinHandle<()>)>,
}

struct Inner {
    user: User,
    repository: SessionRepository,
    connectivity: ConnectivityMonitor,
    engine: TurnEngine,
    config: ControllerConfig,
    session_tx: watch::Sender<Option<Session>>,
    timer_tx: watch::Sender<Option<TurnCountdown>>,
    events: broadcast::Sender<ControllerEvent>,
    tasks: Mutex<Tasks>,
    rng: Mutex<StdRng>,
}

pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        user: User,
        repository: SessionRepository,
        connectivity: ConnectivityMonitor,
        config: ControllerConfig,
    ) -> Self {
        let (session_tx, _) = watch::channel(None);
        let (timer_tx, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let engine = TurnEngine::new(config.engine.clone());

        Self {
            inner: Arc::new(Inner {
                user,
                repository,
                connectivity,
                engine,
                config,
                session_tx,
                timer_tx,
                events,
                tasks: Mutex::new(Tasks::default()),
                rng: Mutex::new(StdRng::from_entropy()),
            }),
        }
    }

    pub fn user(&self) -> &User {
        &self.inner.user
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.session_tx.borrow().clone()
    }

    pub fn current_code(&self) -> Option<SessionCode> {
        self.inner.tasks().code.clone()
    }

    pub fn view(&self) -> Option<PlayerView> {
        self.session()
            .map(|session| PlayerView::new(session, self.inner.user.id.clone()))
    }

    pub fn watch_session(&self) -> watch::Receiver<Option<Session>> {
        self.inner.session_tx.subscribe()
    }

    pub fn turn_timer(&self) -> watch::Receiver<Option<TurnCountdown>> {
        self.inner.timer_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.events.subscribe()
    }

    /// Whether mutating intents are currently offered.
    pub fn can_act(&self) -> bool {
        !self.inner.config.block_when_offline || self.inner.connectivity.is_online()
    }

    pub async fn create_game(&self) -> Result<Session, GameError> {
        self.inner.ensure_online()?;
        let session = self
            .inner
            .repository
            .create_game(&self.inner.user, Utc::now())
            .await?;
        Inner::attach(&self.inner, session.clone()).await?;
        Ok(session)
    }

    pub async fn join_game(&self, code: &str) -> Result<Session, GameError> {
        self.inner.ensure_online()?;
        let session = self
            .inner
            .repository
            .join_game(code, &self.inner.user, Utc::now())
            .await?;
        Inner::attach(&self.inner, session.clone()).await?;
        Ok(session)
    }

    pub async fn start_game(&self) -> Result<(), GameError> {
        self.inner.perform(GameAction::StartGame).await
    }

    pub async fn set_secret_word(&self, category: &str, word: &str) -> Result<(), GameError> {
        self.inner
            .perform(GameAction::SetSecretWord {
                category: category.to_string(),
                word: word.to_string(),
            })
            .await
    }

    pub async fn ask_question(&self, text: &str) -> Result<(), GameError> {
        self.inner
            .perform(GameAction::AskQuestion {
                text: text.to_string(),
            })
            .await
    }

    pub async fn answer_question(&self, question_id: &str, answer: &str) -> Result<(), GameError> {
        self.inner
            .perform(GameAction::AnswerQuestion {
                question_id: question_id.to_string(),
                answer: answer.to_string(),
            })
            .await
    }

    pub async fn make_guess(&self, guess: &str) -> Result<(), GameError> {
        self.inner
            .perform(GameAction::MakeGuess {
                guess: guess.to_string(),
            })
            .await
    }

    pub async fn skip_turn(&self) -> Result<(), GameError> {
        self.inner.perform(GameAction::SkipTurn).await
    }

    pub async fn add_reaction(&self, emoji: &str) -> Result<(), GameError> {
        self.inner
            .perform(GameAction::AddReaction {
                emoji: emoji.to_string(),
            })
            .await
    }

    pub async fn play_again(&self) -> Result<(), GameError> {
        self.inner.perform(GameAction::PlayAgain).await
    }

    pub async fn reset_to_lobby(&self) -> Result<(), GameError> {
        self.inner.perform(GameAction::ResetToLobby).await
    }

    /// Leaves the session and stops observing it, even if the write fails.
    pub async fn leave_game(&self) -> Result<(), GameError> {
        let result = self.inner.perform(GameAction::Leave).await;
        self.inner.teardown();
        result
    }

    /// Stops every background task without touching the session.
    pub fn dispose(&self) {
        self.inner.teardown();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl Inner {
    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ControllerEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn ensure_online(&self) -> Result<(), GameError> {
        if self.config.block_when_offline && !self.connectivity.is_online() {
            return Err(GameError::NetworkError {
                message: "no network connection".to_string(),
            });
        }
        Ok(())
    }

    /// Validates `action` against the local snapshot and commits the
    /// resulting patch. The local session only changes when the store echoes
    /// the write back.
    async fn perform(&self, action: GameAction) -> Result<(), GameError> {
        self.ensure_online()?;
        let code = self.tasks().code.clone().ok_or(GameError::NotInSession)?;
        let session = self
            .session_tx
            .borrow()
            .clone()
            .ok_or(GameError::NotInSession)?;

        let name = action.name();
        let transition = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.engine
                .apply(&session, &self.user.id, action, Utc::now(), &mut *rng)?
        };
        self.repository.commit(&code, &transition.patch).await?;
        debug!("{} committed {} to game {}", self.user.id, name, code);
        Ok(())
    }

    async fn attach(this: &Arc<Self>, session: Session) -> Result<(), GameError> {
        this.teardown();
        let code = session.id.clone();
        let subscription = this.repository.subscribe(&code).await?;

        {
            let mut tasks = this.tasks();
            tasks.code = Some(code.clone());
            tasks.subscription = Some(Self::spawn_subscription(this, code.clone(), subscription));
        }
        Self::sync_timer(this, &session);
        this.session_tx.send_replace(Some(session));
        info!("{} attached to game {}", this.user.id, code);
        Ok(())
    }

    fn spawn_subscription(this: &Arc<Self>, code: SessionCode, mut subscription: Subscription) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(this);
        tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !Self::handle_snapshot(&inner, &code, snapshot) {
                    break;
                }
            }
            debug!("Subscription to game {} closed", code);
        })
    }

    /// Returns whether the subscription should stay up.
    fn handle_snapshot(this: &Arc<Self>, code: &str, snapshot: Option<Value>) -> bool {
        match SessionRepository::classify_snapshot(snapshot, &this.user.id) {
            SnapshotOutcome::Ended => {
                info!("Game {} ended", code);
                this.teardown();
                this.emit(ControllerEvent::SessionEnded { code: code.to_string() });
                false
            }
            SnapshotOutcome::Removed => {
                info!("{} is no longer in game {}", this.user.id, code);
                this.teardown();
                this.emit(ControllerEvent::RemovedFromSession { code: code.to_string() });
                false
            }
            SnapshotOutcome::Invalid(error) => {
                warn!("Unreadable snapshot for game {}: {}", code, error);
                this.emit(ControllerEvent::DecodeFailed {
                    code: code.to_string(),
                    error,
                });
                true
            }
            SnapshotOutcome::Session(session) => {
                Self::sync_timer(this, &session);
                this.session_tx.send_replace(Some(session));
                this.emit(ControllerEvent::SessionUpdated { code: code.to_string() });
                true
            }
        }
    }

    /// Keeps exactly one countdown running for the current turn.
    fn sync_timer(this: &Arc<Self>, session: &Session) {
        let key = TurnKey::of(session);
        let now = Utc::now();
        let countdown = session
            .game_state
            .as_ref()
            .and_then(|state| TurnCountdown::of(state, now));

        let mut tasks = this.tasks();
        let running = tasks.timer.as_ref().map(|(current, _)| current);
        if running.is_some() && running == key.as_ref() {
            this.timer_tx.send_replace(countdown);
            return;
        }

        if let Some((_, handle)) = tasks.timer.take() {
            handle.abort();
        }
        this.timer_tx.send_replace(countdown);
        if let Some(key) = key {
            let handle = Self::spawn_timer(this, key.clone());
            tasks.timer = Some((key, handle));
        }
    }

    fn spawn_timer(this: &Arc<Self>, key: TurnKey) -> JoinHandle<()> {
        let weak = Arc::downgrade(this);
        let tick = this.config.tick;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let snapshot = inner.session_tx.borrow().clone();
                let Some(session) = snapshot else {
                    break;
                };
                if TurnKey::of(&session).as_ref() != Some(&key) {
                    break;
                }

                let now = Utc::now();
                let countdown = session
                    .game_state
                    .as_ref()
                    .and_then(|state| TurnCountdown::of(state, now));
                inner.timer_tx.send_replace(countdown);

                if should_trigger_timeout(&session, &inner.user.id, now) {
                    info!("Turn of {} timed out in game {}", inner.user.id, session.id);
                    inner.emit(ControllerEvent::TurnTimedOut {
                        player_id: inner.user.id.clone(),
                    });
                    // Detached so a new turn aborting this timer cannot cut the write short.
                    tokio::spawn(async move {
                        if let Err(err) = inner.perform(GameAction::SkipTurn).await {
                            warn!("Timeout skip failed: {}", err);
                            inner.emit(ControllerEvent::Error(err));
                        }
                    });
                    break;
                }
            }
        })
    }

    fn teardown(&self) {
        let mut tasks = self.tasks();
        if let Some(handle) = tasks.subscription.take() {
            handle.abort();
        }
        if let Some((_, handle)) = tasks.timer.take() {
            handle.abort();
        }
        let code = tasks.code.take();
        drop(tasks);

        self.session_tx.send_replace(None);
        self.timer_tx.send_replace(None);
        if let Some(code) = code {
            debug!("{} detached from game {}", self.user.id, code);
        }
    }
}
