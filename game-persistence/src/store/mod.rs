//! Key-path document store: a JSON tree addressed by `/`-separated paths,
//! with last-writer-wins writes and live subscriptions.

pub mod fanout;
pub mod memory;
pub mod sql;
pub mod tree;

use async_trait::async_trait;
use game_types::GameError;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store is unavailable")]
    Unavailable,
    #[error("invalid store path '{0}'")]
    InvalidPath(String),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        GameError::NetworkError {
            message: err.to_string(),
        }
    }
}

/// One set (`Some`) or delete (`None`) relative to an update's base path.
pub type Change = (String, Option<Value>);

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the subtree at `path`. Writing `null` deletes it.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Applies every change under `base` atomically, notifying subscribers once.
    async fn update(&self, base: &str, changes: Vec<Change>) -> Result<(), StoreError>;

    /// Appends `value` to the array at `path` in one atomic step, provided
    /// `guard` exists at that moment. Returns the index written, or `None`
    /// when the guard is absent and nothing was changed.
    async fn append_if_present(
        &self,
        guard: &str,
        path: &str,
        value: Value,
    ) -> Result<Option<usize>, StoreError>;

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Names of the direct children of `path`, sorted.
    async fn child_keys(&self, path: &str) -> Result<Vec<String>, StoreError>;
}

/// Splits a path into its segments, rejecting empty ones.
pub fn parse_path(path: &str) -> Result<Vec<String>, StoreError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split('/')
        .map(|segment| {
            if segment.is_empty() {
                Err(StoreError::InvalidPath(path.to_string()))
            } else {
                Ok(segment.to_string())
            }
        })
        .collect()
}

pub fn join_path(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    match (base.is_empty(), relative.is_empty()) {
        (true, _) => relative.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}/{relative}"),
    }
}

/// Live view of one path. The first `next()` yields the value at subscribe
/// time; later calls wait for the latest value after an overlapping write.
/// Intermediate values may be skipped and unchanged values may repeat.
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    receiver: watch::Receiver<Option<Value>>,
    primed: bool,
}

impl Subscription {
    pub(crate) fn new(path: impl Into<String>, receiver: watch::Receiver<Option<Value>>) -> Self {
        Self {
            path: path.into(),
            receiver,
            primed: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<Option<Value>> {
        if !self.primed {
            self.primed = true;
            return Some(self.receiver.borrow_and_update().clone());
        }
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn current(&self) -> Option<Value> {
        self.receiver.borrow().clone()
    }
}
