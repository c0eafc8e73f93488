//! Failures of the MongoDB backend.

use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::dao::{remote_store::RemoteCollection, storage::StorageError};

/// Result alias for MongoDB calls.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Everything that can go wrong between the store and the server.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// A required setting is absent.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// The connection string does not parse. Credentials are redacted from `uri`.
    #[error("invalid MongoDB connection string `{uri}`")]
    InvalidUri {
        /// Redacted connection string.
        uri: String,
        /// Driver parse error.
        #[source]
        source: MongoError,
    },
    /// The database name is not accepted by MongoDB.
    #[error("`{name}` is not a valid MongoDB database name")]
    InvalidDatabaseName {
        /// Rejected name.
        name: String,
    },
    /// The driver refused the options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered during startup.
    #[error("MongoDB did not answer a ping after {attempts} attempt(s)")]
    InitialPing {
        /// Pings sent before giving up.
        attempts: u32,
        /// Error of the last ping.
        #[source]
        source: MongoError,
    },
    /// A later health probe failed.
    #[error("MongoDB health ping failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The `game_id` lookup index could not be created.
    #[error("failed to ensure index `{index}` on `{collection}`")]
    EnsureIndex {
        /// Collection the index belongs to.
        collection: RemoteCollection,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A record could not be inserted.
    #[error("failed to insert into `{collection}`")]
    Insert {
        /// Target collection.
        collection: RemoteCollection,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A document could not be updated.
    #[error("failed to update `{id}` in `{collection}`")]
    Update {
        /// Target collection.
        collection: RemoteCollection,
        /// Document id.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A field lookup failed.
    #[error("failed to query `{collection}`")]
    Query {
        /// Queried collection.
        collection: RemoteCollection,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A document could not be deleted.
    #[error("failed to delete `{id}` from `{collection}`")]
    Delete {
        /// Target collection.
        collection: RemoteCollection,
        /// Document id.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The insert succeeded but returned something other than an ObjectId.
    #[error("MongoDB did not return an object id for the inserted document")]
    MissingInsertedId,
    /// Records must be JSON objects to become BSON documents.
    #[error("records written to MongoDB must be JSON objects")]
    NotAnObject,
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
