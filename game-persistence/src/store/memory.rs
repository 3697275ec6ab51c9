use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::fanout::Fanout;
use super::tree::{append_at, child_keys_of, delete_at, get_at, set_at};
use super::{Change, DocumentStore, StoreError, Subscription, join_path, parse_path};

/// Single in-process JSON tree. Used by tests, local play and the server when
/// no database is configured.
pub struct MemoryDocumentStore {
    root: RwLock<Value>,
    fanout: Fanout,
    online: AtomicBool,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
            fanout: Fanout::default(),
            online: AtomicBool::new(true),
        }
    }

    /// While offline every operation fails with [`StoreError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.fanout.active()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    async fn write(&self, segments: Vec<String>, value: Option<Value>) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut root = self.root.write().await;
        match value {
            Some(value) => set_at(&mut root, &segments, value)?,
            None => {
                delete_at(&mut root, &segments);
            }
        }
        self.fanout
            .notify(std::slice::from_ref(&segments), |path| get_at(&root, path).cloned());
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_online()?;
        let segments = parse_path(path)?;
        let root = self.root.read().await;
        Ok(get_at(&root, &segments).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        debug!("set {}", path);
        self.write(parse_path(path)?, Some(value)).await
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        debug!("delete {}", path);
        self.write(parse_path(path)?, None).await
    }

    async fn update(&self, base: &str, changes: Vec<Change>) -> Result<(), StoreError> {
        self.ensure_online()?;
        let parsed = changes
            .into_iter()
            .map(|(relative, value)| Ok((parse_path(&join_path(base, &relative))?, value)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        debug!("update {} ({} paths)", base, parsed.len());

        let mut root = self.root.write().await;
        // Stage on a copy so a failing change leaves the tree untouched.
        let mut staged = root.clone();
        for (segments, value) in &parsed {
            match value {
                Some(value) => set_at(&mut staged, segments, value.clone())?,
                None => {
                    delete_at(&mut staged, segments);
                }
            }
        }
        *root = staged;

        let changed: Vec<Vec<String>> = parsed.into_iter().map(|(segments, _)| segments).collect();
        self.fanout.notify(&changed, |path| get_at(&root, path).cloned());
        Ok(())
    }

    async fn append_if_present(
        &self,
        guard: &str,
        path: &str,
        value: Value,
    ) -> Result<Option<usize>, StoreError> {
        self.ensure_online()?;
        let guard = parse_path(guard)?;
        let segments = parse_path(path)?;

        let mut root = self.root.write().await;
        if get_at(&root, &guard).is_none() {
            debug!("append {} skipped, guard absent", path);
            return Ok(None);
        }
        let index = append_at(&mut root, &segments, value)?;
        debug!("append {} at {}", path, index);

        self.fanout
            .notify(std::slice::from_ref(&segments), |path| get_at(&root, path).cloned());
        Ok(Some(index))
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        self.ensure_online()?;
        let segments = parse_path(path)?;
        // Registered under the read lock so no write can slip in between.
        let root = self.root.read().await;
        let current = get_at(&root, &segments).cloned();
        Ok(self.fanout.subscribe(path, segments, current))
    }

    async fn child_keys(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_online()?;
        let segments = parse_path(path)?;
        let root = self.root.read().await;
        Ok(child_keys_of(get_at(&root, &segments)))
    }
}
