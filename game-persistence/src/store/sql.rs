use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use super::fanout::Fanout;
use super::tree::{append_at, child_keys_of, delete_at, get_at, is_empty, set_at};
use super::{Change, DocumentStore, StoreError, Subscription, join_path, parse_path};
use crate::entities::{documents, prelude::*};

/// Number of leading path segments naming one stored document.
pub const DOCUMENT_DEPTH: usize = 2;

/// Document store persisted through sea-orm, one row per top-level document.
/// Nested writes are read-modify-write inside a transaction; subscribers are
/// notified in-process after commit.
pub struct SqlDocumentStore {
    db: DatabaseConnection,
    fanout: Fanout,
    write_lock: Mutex<()>,
}

struct DocumentPath {
    key: String,
    inner: Vec<String>,
    full: Vec<String>,
}

fn document_path(path: &str) -> Result<DocumentPath, StoreError> {
    let full = parse_path(path)?;
    if full.len() < DOCUMENT_DEPTH {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(DocumentPath {
        key: full[..DOCUMENT_DEPTH].join("/"),
        inner: full[DOCUMENT_DEPTH..].to_vec(),
        full,
    })
}

async fn load_document<C: ConnectionTrait>(conn: &C, key: &str) -> Result<Option<Value>, StoreError> {
    let Some(row) = Documents::find_by_id(key.to_string()).one(conn).await? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&row.body)?))
}

impl SqlDocumentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            fanout: Fanout::default(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn active_subscriptions(&self) -> usize {
        self.fanout.active()
    }

    async fn write(&self, key: &str, changes: Vec<(Vec<String>, Vec<String>, Option<Value>)>) -> Result<(), StoreError> {
        let mut changed = Vec::with_capacity(changes.len());
        let mut edits = Vec::with_capacity(changes.len());
        for (full, inner, value) in changes {
            changed.push(full);
            edits.push((inner, value));
        }
        self.modify(key, changed, move |document| {
            for (inner, value) in edits {
                match value {
                    Some(value) => set_at(document, &inner, value)?,
                    None => {
                        delete_at(document, &inner);
                    }
                }
            }
            Ok(Some(()))
        })
        .await
        .map(|_| ())
    }

    /// Runs `edit` on the document under `key` inside one transaction.
    /// `edit` returning `None` leaves the row untouched and notifies nobody.
    async fn modify<T, F>(&self, key: &str, changed: Vec<Vec<String>>, edit: F) -> Result<Option<T>, StoreError>
    where
        T: Send,
        F: FnOnce(&mut Value) -> Result<Option<T>, StoreError> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let txn = self.db.begin().await?;

        let mut document = load_document(&txn, key)
            .await?
            .unwrap_or_else(|| Value::Object(Map::new()));
        let Some(outcome) = edit(&mut document)? else {
            txn.rollback().await?;
            return Ok(None);
        };

        if is_empty(&document) {
            Documents::delete_by_id(key.to_string()).exec(&txn).await?;
        } else {
            let row = documents::ActiveModel {
                key: ActiveValue::Set(key.to_string()),
                body: ActiveValue::Set(serde_json::to_string(&document)?),
                updated_at: ActiveValue::Set(chrono::Utc::now().into()),
            };
            Documents::insert(row)
                .on_conflict(
                    OnConflict::column(documents::Column::Key)
                        .update_columns([documents::Column::Body, documents::Column::UpdatedAt])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;

        self.fanout
            .notify(&changed, |path| get_at(&document, &path[DOCUMENT_DEPTH..]).cloned());
        Ok(Some(outcome))
    }
}

#[async_trait]
impl DocumentStore for SqlDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let target = document_path(path)?;
        let document = load_document(&self.db, &target.key).await?;
        Ok(document.and_then(|document| get_at(&document, &target.inner).cloned()))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        debug!("set {}", path);
        let target = document_path(path)?;
        self.write(&target.key, vec![(target.full, target.inner, Some(value))])
            .await
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        debug!("delete {}", path);
        let target = document_path(path)?;
        self.write(&target.key, vec![(target.full, target.inner, None)])
            .await
    }

    async fn update(&self, base: &str, changes: Vec<Change>) -> Result<(), StoreError> {
        let base_path = document_path(base)?;
        let mut parsed = Vec::with_capacity(changes.len());
        for (relative, value) in changes {
            let target = document_path(&join_path(base, &relative))?;
            if target.key != base_path.key {
                return Err(StoreError::InvalidPath(relative));
            }
            parsed.push((target.full, target.inner, value));
        }
        debug!("update {} ({} paths)", base, parsed.len());
        self.write(&base_path.key, parsed).await
    }

    async fn append_if_present(
        &self,
        guard: &str,
        path: &str,
        value: Value,
    ) -> Result<Option<usize>, StoreError> {
        let guard = document_path(guard)?;
        let target = document_path(path)?;
        if guard.key != target.key {
            return Err(StoreError::InvalidPath(guard.full.join("/")));
        }
        debug!("append {}", path);
        let inner = target.inner;
        self.modify(&target.key, vec![target.full], move |document| {
            if get_at(document, &guard.inner).is_none() {
                return Ok(None);
            }
            append_at(document, &inner, value).map(Some)
        })
        .await
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let target = document_path(path)?;
        // Holding the write lock keeps the initial value and registration consistent.
        let _guard = self.write_lock.lock().await;
        let current = load_document(&self.db, &target.key)
            .await?
            .and_then(|document| get_at(&document, &target.inner).cloned());
        Ok(self.fanout.subscribe(path, target.full, current))
    }

    async fn child_keys(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let segments = parse_path(path)?;
        if segments.len() >= DOCUMENT_DEPTH {
            let target = document_path(path)?;
            let document = load_document(&self.db, &target.key).await?;
            return Ok(child_keys_of(
                document.as_ref().and_then(|document| get_at(document, &target.inner)),
            ));
        }

        // Above document level the children are row key segments.
        let prefix = if segments.is_empty() {
            String::new()
        } else {
            format!("{}/", segments.join("/"))
        };
        let rows = Documents::find()
            .filter(documents::Column::Key.starts_with(prefix.as_str()))
            .all(&self.db)
            .await?;
        let mut keys: Vec<String> = rows
            .iter()
            .filter_map(|row| row.key.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.split('/').next().map(str::to_string))
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};
    use serde_json::json;
    use std::time::Duration;

    async fn setup_test_store() -> SqlDocumentStore {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        SqlDocumentStore::new(db)
    }

    #[tokio::test]
    async fn test_document_round_trip() {
        let store = setup_test_store().await;
        store
            .set("sessions/ABC123", json!({"hostId": "u1", "gameStarted": false}))
            .await
            .unwrap();
        store.set("sessions/ABC123/players/u1", json!({"id": "u1"})).await.unwrap();

        assert_eq!(store.get("sessions/ABC123/hostId").await.unwrap(), Some(json!("u1")));
        assert_eq!(
            store.get("sessions/ABC123/players").await.unwrap(),
            Some(json!({"u1": {"id": "u1"}}))
        );
        assert_eq!(store.get("sessions/OTHER1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_paths_above_documents() {
        let store = setup_test_store().await;
        assert!(matches!(store.get("sessions").await, Err(StoreError::InvalidPath(_))));
        assert!(matches!(
            store.update("sessions", vec![("A/hostId".to_string(), None)]).await,
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_child_keys_across_rows() {
        let store = setup_test_store().await;
        store.set("sessions/BBB222", json!({"hostId": "u1"})).await.unwrap();
        store.set("sessions/AAA111", json!({"hostId": "u2"})).await.unwrap();
        store.set("users/u1", json!({"id": "u1"})).await.unwrap();

        assert_eq!(store.child_keys("sessions").await.unwrap(), vec!["AAA111", "BBB222"]);
        assert_eq!(store.child_keys("").await.unwrap(), vec!["sessions", "users"]);
        assert_eq!(store.child_keys("users/u1").await.unwrap(), vec!["id"]);
    }

    #[tokio::test]
    async fn test_deleting_last_field_removes_row() {
        let store = setup_test_store().await;
        store.set("users/u1/avatar", json!("😀")).await.unwrap();
        store.delete("users/u1/avatar").await.unwrap();
        assert_eq!(store.get("users/u1").await.unwrap(), None);
        let rows = Documents::find().all(store.connection()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_append_if_present() {
        let store = setup_test_store().await;
        let skipped = store
            .append_if_present("sessions/A/gameState/answererID", "sessions/A/gameState/reactions", json!({"emoji": "🔥"}))
            .await
            .unwrap();
        assert_eq!(skipped, None);
        assert!(Documents::find().all(store.connection()).await.unwrap().is_empty());

        store
            .set("sessions/A", json!({"gameState": {"answererID": "u1", "reactions": [{"emoji": "👍"}]}}))
            .await
            .unwrap();
        let index = store
            .append_if_present("sessions/A/gameState/answererID", "sessions/A/gameState/reactions", json!({"emoji": "🔥"}))
            .await
            .unwrap();
        assert_eq!(index, Some(1));
        assert_eq!(
            store.get("sessions/A/gameState/reactions/1/emoji").await.unwrap(),
            Some(json!("🔥"))
        );

        assert!(matches!(
            store.append_if_present("sessions/B/x", "sessions/A/gameState/reactions", json!(1)).await,
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_subscribe() {
        let store = setup_test_store().await;
        store.set("sessions/A", json!({"hostId": "u1", "players": {"u1": {}, "u2": {}}})).await.unwrap();

        let mut subscription = store.subscribe("sessions/A").await.unwrap();
        subscription.next().await;

        store
            .update(
                "sessions/A",
                vec![
                    ("players/u1".to_string(), None),
                    ("hostId".to_string(), Some(json!("u2"))),
                ],
            )
            .await
            .unwrap();

        let next = tokio::time::timeout(Duration::from_secs(1), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next, Some(json!({"hostId": "u2", "players": {"u2": {}}})));
    }
}
