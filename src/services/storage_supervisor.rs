use std::{env, future::Future, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{
        remote_store::{RemoteStore, memory::MemoryRemoteStore},
        storage::StorageError,
    },
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Environment variable selecting the remote store.
pub const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

/// Remote store implementations the binary can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// CouchDB over HTTP.
    Couch,
    /// MongoDB.
    Mongo,
    /// Process-local store, lost on exit.
    Memory,
}

impl StorageBackend {
    /// Parse a backend name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "couch" | "couchdb" => Some(Self::Couch),
            "mongo" | "mongodb" => Some(Self::Mongo),
            "memory" | "mem" => Some(Self::Memory),
            _ => None,
        }
    }

    /// Backend named by [`STORAGE_BACKEND_ENV`], defaulting to CouchDB.
    pub fn from_env() -> Self {
        match env::var(STORAGE_BACKEND_ENV) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                warn!(value = %value, "unknown storage backend; falling back to couchdb");
                Self::Couch
            }),
            Err(_) => Self::Couch,
        }
    }
}

/// Factory producing a connected store for `backend`.
pub fn connector(
    backend: StorageBackend,
) -> impl FnMut() -> BoxFuture<'static, Result<Arc<dyn RemoteStore>, StorageError>> + Send + 'static
{
    move || -> BoxFuture<'static, Result<Arc<dyn RemoteStore>, StorageError>> {
        match backend {
            StorageBackend::Memory => Box::pin(async {
                Ok(Arc::new(MemoryRemoteStore::new()) as Arc<dyn RemoteStore>)
            }),
            StorageBackend::Couch => Box::pin(connect_couch()),
            StorageBackend::Mongo => Box::pin(connect_mongo()),
        }
    }
}

#[cfg(feature = "couch-store")]
async fn connect_couch() -> Result<Arc<dyn RemoteStore>, StorageError> {
    use crate::dao::remote_store::couchdb::{CouchConfig, CouchRemoteStore};

    let config = CouchConfig::from_env()?;
    let store = CouchRemoteStore::connect(config).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "couch-store"))]
async fn connect_couch() -> Result<Arc<dyn RemoteStore>, StorageError> {
    Err(StorageError::unavailable(
        "built without the couch-store feature".into(),
        std::io::Error::other("couch-store disabled"),
    ))
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> Result<Arc<dyn RemoteStore>, StorageError> {
    use crate::dao::remote_store::mongodb::{MongoConfig, MongoRemoteStore};

    let config = MongoConfig::from_env().await?;
    let store = MongoRemoteStore::connect(config).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "mongo-store"))]
async fn connect_mongo() -> Result<Arc<dyn RemoteStore>, StorageError> {
    Err(StorageError::unavailable(
        "built without the mongo-store feature".into(),
        std::io::Error::other("mongo-store disabled"),
    ))
}

/// Reconnect to the remote store and keep the shared state in degraded mode when it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RemoteStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_remote_store(store.clone());
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise(&state, store.as_ref()).await;

                state.clear_remote_store();
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll `store` until it is lost for good.
async fn supervise(state: &SharedState, store: &dyn RemoteStore) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded() {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false);
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut reconnected = false;
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!("storage reconnection succeeded after health check failure");
                    reconnected = true;
                    break;
                }
                Err(reconnect_err) => {
                    if attempt == 0 {
                        warn!(
                            attempt, error = %reconnect_err,
                            "storage reconnect first attempt failed; entering degraded mode"
                        );
                        state.update_degraded(true);
                    } else {
                        warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !reconnected {
            warn!("exhausted storage reconnect attempts; dropping the connection");
            return;
        }
        state.update_degraded(false);
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}
