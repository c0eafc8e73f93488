use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Document, doc, oid::ObjectId},
    options::IndexOptions,
};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{into_record, json_to_bson, record_document},
};
use crate::dao::{
    remote_store::{RemoteCollection, RemoteRecord, RemoteStore},
    storage::{StorageError, StorageResult},
};

#[derive(Clone)]
pub struct MongoRemoteStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

/// Records created here carry ObjectIds; game documents may use plain string ids.
fn id_filter(id: &str) -> Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "_id": oid },
        Err(_) => doc! { "_id": id },
    }
}

impl MongoRemoteStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Per-game lookups are the only queries the tracker issues.
    async fn ensure_indexes(&self) -> MongoResult<()> {
        for collection in [
            RemoteCollection::Shots,
            RemoteCollection::GoalsAgainst,
            RemoteCollection::GameEvents,
        ] {
            let index = mongodb::IndexModel::builder()
                .keys(doc! {"game_id": 1})
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{}_game_idx", collection.name())))
                        .build(),
                )
                .build();

            self.collection(collection)
                .await
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: "game_id",
                    source,
                })?;
        }
        Ok(())
    }

    async fn collection(&self, collection: RemoteCollection) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<Document>(collection.name())
    }

    async fn create(&self, collection: RemoteCollection, record: Value) -> MongoResult<String> {
        let document = record_document(record)?;
        let result = self
            .collection(collection)
            .await
            .insert_one(document)
            .await
            .map_err(|source| MongoDaoError::Insert { collection, source })?;

        result
            .inserted_id
            .as_object_id()
            .map(|id| id.to_hex())
            .ok_or(MongoDaoError::MissingInsertedId)
    }

    async fn update(
        &self,
        collection: RemoteCollection,
        id: String,
        changes: Value,
    ) -> StorageResult<()> {
        let changes = record_document(changes)?;
        let result = self
            .collection(collection)
            .await
            .update_one(id_filter(&id), doc! { "$set": changes })
            .await
            .map_err(|source| MongoDaoError::Update {
                collection,
                id: id.clone(),
                source,
            })?;

        if result.matched_count == 0 {
            return Err(StorageError::NotFound { collection, id });
        }
        Ok(())
    }

    async fn query_by_field(
        &self,
        collection: RemoteCollection,
        field: &str,
        value: Value,
    ) -> MongoResult<Vec<RemoteRecord>> {
        let mut filter = Document::new();
        filter.insert(field, json_to_bson(value));
        let documents: Vec<Document> = self
            .collection(collection)
            .await
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::Query { collection, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query { collection, source })?;

        Ok(documents.into_iter().filter_map(into_record).collect())
    }

    async fn delete(&self, collection: RemoteCollection, id: String) -> MongoResult<()> {
        self.collection(collection)
            .await
            .delete_one(id_filter(&id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection,
                id,
                source,
            })?;
        Ok(())
    }
}

impl RemoteStore for MongoRemoteStore {
    fn create(
        &self,
        collection: RemoteCollection,
        record: Value,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let store = self.clone();
        Box::pin(async move { store.create(collection, record).await.map_err(Into::into) })
    }

    fn update(
        &self,
        collection: RemoteCollection,
        id: String,
        changes: Value,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.update(collection, id, changes).await })
    }

    fn query_by_field(
        &self,
        collection: RemoteCollection,
        field: &'static str,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<Vec<RemoteRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .query_by_field(collection, field, value)
                .await
                .map_err(Into::into)
        })
    }

    fn delete(
        &self,
        collection: RemoteCollection,
        id: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete(collection, id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
