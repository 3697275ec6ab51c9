use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

use super::Subscription;

struct Watcher {
    segments: Vec<String>,
    sender: watch::Sender<Option<Value>>,
}

/// Registry of live subscriptions. Every write notifies each watcher whose
/// path is a prefix of, or is prefixed by, a changed path.
#[derive(Default)]
pub struct Fanout {
    watchers: Mutex<Vec<Watcher>>,
}

pub fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

impl Fanout {
    pub fn subscribe(&self, path: &str, segments: Vec<String>, current: Option<Value>) -> Subscription {
        let (sender, receiver) = watch::channel(current);
        self.lock().push(Watcher { segments, sender });
        Subscription::new(path, receiver)
    }

    /// Sends every watcher overlapping `changed` its fresh value from `read`.
    pub fn notify<F>(&self, changed: &[Vec<String>], read: F)
    where
        F: Fn(&[String]) -> Option<Value>,
    {
        let mut watchers = self.lock();
        watchers.retain(|watcher| watcher.sender.receiver_count() > 0);
        for watcher in watchers.iter() {
            if changed.iter().any(|path| overlaps(path, &watcher.segments)) {
                watcher.sender.send_replace(read(&watcher.segments));
            }
        }
    }

    pub fn active(&self) -> usize {
        let mut watchers = self.lock();
        watchers.retain(|watcher| watcher.sender.receiver_count() > 0);
        watchers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Watcher>> {
        self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
