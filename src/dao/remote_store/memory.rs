//! In-process [`RemoteStore`] used offline and by tests.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;

use super::{RemoteCollection, RemoteRecord, RemoteStore};
use crate::dao::storage::{StorageError, StorageResult};

/// Document store kept in memory, with optional failure injection.
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    collections: DashMap<RemoteCollection, IndexMap<String, Value>>,
    next_id: AtomicU64,
    writes: AtomicUsize,
    failing_writes: AtomicUsize,
    offline: AtomicBool,
}

impl MemoryRemoteStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` write calls fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.inner.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Make every call fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful create/update/delete calls so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Documents currently stored in `collection`, in insertion order.
    pub fn documents(&self, collection: RemoteCollection) -> Vec<RemoteRecord> {
        self.inner
            .collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, body)| RemoteRecord {
                        id: id.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Seed a document directly, bypassing failure injection.
    pub fn insert(&self, collection: RemoteCollection, id: impl Into<String>, body: Value) {
        self.inner
            .collections
            .entry(collection)
            .or_default()
            .insert(id.into(), body);
    }
}

impl MemoryInner {
    fn check_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store is offline".into(),
                io::Error::from(io::ErrorKind::NotConnected),
            ));
        }
        Ok(())
    }

    fn begin_write(&self) -> StorageResult<()> {
        self.check_online()?;
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if injected {
            return Err(StorageError::unavailable(
                "injected write failure".into(),
                io::Error::other("injected write failure"),
            ));
        }
        Ok(())
    }

    fn create(&self, collection: RemoteCollection, record: Value) -> StorageResult<String> {
        self.begin_write()?;
        let id = format!(
            "{}-{}",
            collection.name(),
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        );
        self.collections
            .entry(collection)
            .or_default()
            .insert(id.clone(), record);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn update(&self, collection: RemoteCollection, id: String, changes: Value) -> StorageResult<()> {
        self.begin_write()?;
        let mut docs = self.collections.entry(collection).or_default();
        let Some(document) = docs.get_mut(&id) else {
            return Err(StorageError::NotFound { collection, id });
        };
        merge(document, changes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, collection: RemoteCollection, id: &str) -> StorageResult<()> {
        self.begin_write()?;
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            docs.shift_remove(id);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn query(
        &self,
        collection: RemoteCollection,
        field: &str,
        value: &Value,
    ) -> StorageResult<Vec<RemoteRecord>> {
        self.check_online()?;
        Ok(self
            .collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, body)| body.get(field) == Some(value))
                    .map(|(id, body)| RemoteRecord {
                        id: id.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn merge(document: &mut Value, changes: Value) {
    match (document, changes) {
        (Value::Object(target), Value::Object(changes)) => {
            for (key, value) in changes {
                target.insert(key, value);
            }
        }
        (document, changes) => *document = changes,
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn create(
        &self,
        collection: RemoteCollection,
        record: Value,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.create(collection, record) })
    }

    fn update(
        &self,
        collection: RemoteCollection,
        id: String,
        changes: Value,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.update(collection, id, changes) })
    }

    fn query_by_field(
        &self,
        collection: RemoteCollection,
        field: &'static str,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<Vec<RemoteRecord>>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.query(collection, field, &value) })
    }

    fn delete(
        &self,
        collection: RemoteCollection,
        id: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.delete(collection, &id) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.check_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn created_documents_can_be_queried_and_updated() {
        let store = MemoryRemoteStore::new();
        let id = store
            .create(RemoteCollection::Shots, json!({"game_id": "g1", "x": 0.5}))
            .await
            .unwrap();
        store
            .create(RemoteCollection::Shots, json!({"game_id": "g2"}))
            .await
            .unwrap();

        store
            .update(RemoteCollection::Shots, id.clone(), json!({"x": 0.7}))
            .await
            .unwrap();

        let found = store
            .query_by_field(RemoteCollection::Shots, "game_id", json!("g1"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        assert_eq!(found[0].body["x"], 0.7);
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_one_write_at_a_time() {
        let store = MemoryRemoteStore::new();
        store.fail_next_writes(1);

        assert!(store.create(RemoteCollection::GameEvents, json!({})).await.is_err());
        assert!(store.create(RemoteCollection::GameEvents, json!({})).await.is_ok());
        assert_eq!(store.documents(RemoteCollection::GameEvents).len(), 1);
    }

    #[tokio::test]
    async fn updating_a_missing_document_is_not_found() {
        let store = MemoryRemoteStore::new();
        let err = store
            .update(RemoteCollection::Games, "nope".into(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn offline_store_fails_health_checks() {
        let store = MemoryRemoteStore::new();
        store.set_offline(true);
        assert!(store.health_check().await.is_err());
        store.set_offline(false);
        assert!(store.try_reconnect().await.is_ok());
    }
}
