use chrono::{DateTime, Utc};
use game_types::{GamePhase, GameState, PlayerId, Session};

/// Seconds left in the current turn, or `None` when no countdown is running
/// (outside `questioning`, or before the turn clock was started).
pub fn remaining_turn_seconds(state: &GameState, now: DateTime<Utc>) -> Option<u32> {
    if state.phase != GamePhase::Questioning {
        return None;
    }
    let started = state.turn_start_time?;
    let elapsed = (now - started).num_seconds().max(0);
    let remaining = i64::from(state.turn_time_limit) - elapsed;
    Some(remaining.max(0) as u32)
}

pub fn is_turn_expired(state: &GameState, now: DateTime<Utc>) -> bool {
    remaining_turn_seconds(state, now) == Some(0)
}

/// A guesser whose own turn ran out skips it. Every client decides this for
/// itself; nothing coordinates duplicate triggers.
pub fn should_trigger_timeout(session: &Session, user_id: &str, now: DateTime<Utc>) -> bool {
    let Some(state) = session.game_state.as_ref() else {
        return false;
    };
    state.current_turn_player_id == user_id
        && state.is_guesser(user_id)
        && is_turn_expired(state, now)
}

/// Identifies one running countdown. A change means the turn or phase moved
/// and any timer tied to the previous key must stop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TurnKey {
    pub round_number: u32,
    pub player_id: PlayerId,
    pub started_at: DateTime<Utc>,
}

impl TurnKey {
    pub fn of(session: &Session) -> Option<Self> {
        let state = session.game_state.as_ref()?;
        if state.phase != GamePhase::Questioning {
            return None;
        }
        Some(Self {
            round_number: state.round_number,
            player_id: state.current_turn_player_id.clone(),
            started_at: state.turn_start_time?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnCountdown {
    pub remaining_seconds: u32,
    pub limit_seconds: u32,
}

impl TurnCountdown {
    pub fn of(state: &GameState, now: DateTime<Utc>) -> Option<Self> {
        remaining_turn_seconds(state, now).map(|remaining_seconds| Self {
            remaining_seconds,
            limit_seconds: state.turn_time_limit,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_seconds == 0
    }

    /// Fraction of the turn still left, for progress displays.
    pub fn fraction_remaining(&self) -> f64 {
        if self.limit_seconds == 0 {
            return 0.0;
        }
        f64::from(self.remaining_seconds) / f64::from(self.limit_seconds)
    }
}
