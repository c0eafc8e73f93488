use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::info;

use crate::dao::{
    remote_store::{RemoteCollection, RemoteRecord, RemoteStore},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchOp, CouchResult},
    models::{
        COLLECTION_FIELD, FIND_LIMIT, FindRequest, FindResponse, RevisionOnly, WriteResponse,
        into_record, tagged_document,
    },
};

/// Remote store keeping every collection in one CouchDB database, tagged per document.
#[derive(Clone)]
pub struct CouchRemoteStore {
    client: Client,
    config: Arc<CouchConfig>,
}

impl CouchRemoteStore {
    /// Connect and make sure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder().build().map_err(CouchDaoError::Client)?;
        let store = Self {
            client,
            config: Arc::new(config),
        };
        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let base = self.config.database_url();
        let url = if path.is_empty() {
            base
        } else {
            format!("{base}/{path}")
        };
        let builder = self.client.request(method, url);
        match self.config.credentials() {
            Some((username, password)) => builder.basic_auth(username, Some(password)),
            None => builder,
        }
    }

    fn target(&self, path: &str) -> String {
        if path.is_empty() {
            self.config.database().to_owned()
        } else {
            path.to_owned()
        }
    }

    async fn exchange(
        &self,
        op: CouchOp,
        path: &str,
        request: RequestBuilder,
    ) -> CouchResult<Response> {
        request
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                op,
                target: self.target(path),
                source,
            })
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        op: CouchOp,
        path: &str,
        response: Response,
    ) -> CouchResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::Decode {
                op,
                target: self.target(path),
                source,
            })
    }

    /// Send `request` and decode a successful answer.
    async fn call<T: DeserializeOwned>(
        &self,
        op: CouchOp,
        path: &str,
        request: RequestBuilder,
    ) -> CouchResult<T> {
        let response = self.exchange(op, path, request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.unexpected(op, path, status));
        }
        self.decode(op, path, response).await
    }

    fn unexpected(&self, op: CouchOp, path: &str, status: StatusCode) -> CouchDaoError {
        CouchDaoError::Status {
            op,
            target: self.target(path),
            status,
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let opened = self
            .exchange(CouchOp::OpenDatabase, "", self.request(Method::GET, ""))
            .await?
            .status();
        if opened.is_success() {
            return Ok(());
        }
        if opened != StatusCode::NOT_FOUND {
            return Err(self.unexpected(CouchOp::OpenDatabase, "", opened));
        }

        info!(database = %self.config.database(), "creating CouchDB database");
        let created = self
            .exchange(CouchOp::CreateDatabase, "", self.request(Method::PUT, ""))
            .await?
            .status();
        // 412: another instance created it first
        if created.is_success() || created == StatusCode::PRECONDITION_FAILED {
            Ok(())
        } else {
            Err(self.unexpected(CouchOp::CreateDatabase, "", created))
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, id: &str) -> CouchResult<Option<T>> {
        let response = self
            .exchange(CouchOp::Read, id, self.request(Method::GET, id))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => self.decode(CouchOp::Read, id, response).await.map(Some),
            status => Err(self.unexpected(CouchOp::Read, id, status)),
        }
    }

    async fn create(&self, collection: RemoteCollection, record: Value) -> CouchResult<String> {
        let document = tagged_document(collection, record)?;
        let written: WriteResponse = self
            .call(CouchOp::Write, "", self.request(Method::POST, "").json(&document))
            .await?;
        Ok(written.id)
    }

    async fn update(
        &self,
        collection: RemoteCollection,
        id: String,
        changes: Value,
    ) -> StorageResult<()> {
        let Some(mut document) = self.fetch::<Map<String, Value>>(&id).await? else {
            return Err(StorageError::NotFound { collection, id });
        };
        document.extend(tagged_document(collection, changes)?);
        let _: WriteResponse = self
            .call(CouchOp::Write, &id, self.request(Method::PUT, &id).json(&document))
            .await?;
        Ok(())
    }

    async fn query_by_field(
        &self,
        collection: RemoteCollection,
        field: &str,
        value: Value,
    ) -> CouchResult<Vec<RemoteRecord>> {
        let mut selector = Map::new();
        selector.insert(COLLECTION_FIELD.into(), Value::from(collection.name()));
        selector.insert(field.into(), value);
        let find = FindRequest {
            selector: Value::Object(selector),
            limit: FIND_LIMIT,
        };

        let found: FindResponse = self
            .call(CouchOp::Find, "_find", self.request(Method::POST, "_find").json(&find))
            .await?;
        Ok(found.docs.into_iter().filter_map(into_record).collect())
    }

    async fn delete(&self, id: &str) -> CouchResult<()> {
        let Some(current) = self.fetch::<RevisionOnly>(id).await? else {
            return Ok(());
        };

        let request = self
            .request(Method::DELETE, id)
            .query(&[("rev", current.rev)]);
        let status = self.exchange(CouchOp::Delete, id, request).await?.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(self.unexpected(CouchOp::Delete, id, status))
        }
    }

    async fn ping(&self) -> CouchResult<()> {
        let status = self
            .exchange(CouchOp::Ping, "", self.request(Method::GET, ""))
            .await?
            .status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.unexpected(CouchOp::Ping, "", status))
        }
    }
}

impl RemoteStore for CouchRemoteStore {
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
        _collection: RemoteCollection,
        id: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete(&id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
