//! Remote document store interface and its backends.

#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::storage::StorageResult;

/// Collections mirrored by the remote document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteCollection {
    /// Game documents.
    Games,
    /// Shot records.
    Shots,
    /// Goal-against records.
    GoalsAgainst,
    /// Game event records.
    GameEvents,
}

impl RemoteCollection {
    /// Every collection the tracker writes to.
    pub const ALL: [RemoteCollection; 4] = [
        RemoteCollection::Games,
        RemoteCollection::Shots,
        RemoteCollection::GoalsAgainst,
        RemoteCollection::GameEvents,
    ];

    /// Collection name as stored remotely.
    pub fn name(self) -> &'static str {
        match self {
            RemoteCollection::Games => "games",
            RemoteCollection::Shots => "shots",
            RemoteCollection::GoalsAgainst => "goals_against",
            RemoteCollection::GameEvents => "game_events",
        }
    }
}

impl fmt::Display for RemoteCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A document returned by the remote store together with its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    /// Identifier assigned by the store.
    pub id: String,
    /// Document body, without store bookkeeping fields.
    pub body: Value,
}

/// Small CRUD interface over the remote document store.
pub trait RemoteStore: Send + Sync {
    /// Insert `record` and return the identifier the store assigned to it.
    fn create(
        &self,
        collection: RemoteCollection,
        record: Value,
    ) -> BoxFuture<'static, StorageResult<String>>;
    /// Merge `changes` into the document `id`.
    fn update(
        &self,
        collection: RemoteCollection,
        id: String,
        changes: Value,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Every document of `collection` whose `field` equals `value`.
    fn query_by_field(
        &self,
        collection: RemoteCollection,
        field: &'static str,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<Vec<RemoteRecord>>>;
    /// Remove the document `id`. Deleting a missing document succeeds.
    fn delete(
        &self,
        collection: RemoteCollection,
        id: String,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Check the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
