use std::env;
use std::str::FromStr;
use std::time::Duration;

use game_core::EngineConfig;
use game_persistence::RepositoryConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub max_players_per_session: usize,
    pub min_players_per_session: usize,
    pub turn_time_limit_seconds: u32,
    pub code_generation_attempts: usize,
    pub connection_timeout_seconds: u64,
    pub session_max_age_hours: i64,
    pub rate_limit_max_messages: u32,
    pub rate_limit_refill_ms: u64,
    pub auth_dev_mode: bool,
    pub jwt_secret: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("JWT_SECRET is required unless AUTH_DEV_MODE=true")]
    MissingJwtSecret,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from any variable source. Unset variables take their
    /// defaults; set but malformed ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse(&lookup, "PORT", 8080)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            max_players_per_session: parse(&lookup, "MAX_PLAYERS_PER_SESSION", 8)?,
            min_players_per_session: parse(&lookup, "MIN_PLAYERS_PER_SESSION", 2)?,
            turn_time_limit_seconds: parse(&lookup, "TURN_TIME_LIMIT_SECONDS", 30)?,
            code_generation_attempts: parse(&lookup, "CODE_GENERATION_ATTEMPTS", 5)?,
            connection_timeout_seconds: parse(&lookup, "CONNECTION_TIMEOUT_SECONDS", 300)?,
            session_max_age_hours: parse(&lookup, "SESSION_MAX_AGE_HOURS", 24)?,
            rate_limit_max_messages: parse(&lookup, "RATE_LIMIT_MAX_MESSAGES", 30)?,
            rate_limit_refill_ms: parse(&lookup, "RATE_LIMIT_REFILL_MS", 500)?,
            auth_dev_mode: parse(&lookup, "AUTH_DEV_MODE", false)?,
            jwt_secret: lookup("JWT_SECRET").filter(|secret| !secret.is_empty()),
        };

        if config.min_players_per_session < 2
            || config.max_players_per_session < config.min_players_per_session
        {
            return Err(ConfigError::InvalidValue {
                name: "MIN_PLAYERS_PER_SESSION",
                value: config.min_players_per_session.to_string(),
            });
        }
        if !config.auth_dev_mode && config.jwt_secret.is_none() {
            return Err(ConfigError::MissingJwtSecret);
        }
        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            min_players: self.min_players_per_session,
            max_players: self.max_players_per_session,
            turn_time_limit: self.turn_time_limit_seconds,
        }
    }

    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            max_players: self.max_players_per_session,
            code_generation_attempts: self.code_generation_attempts,
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    pub fn session_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_max_age_hours)
    }
}

fn parse<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
