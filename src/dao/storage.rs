//! Backend-neutral storage errors.

use std::error::Error;
use thiserror::Error;

use super::remote_store::RemoteCollection;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the call.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Backend description of the failure.
        message: String,
        /// Backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The addressed document does not exist.
    #[error("record `{id}` not found in `{collection}`")]
    NotFound {
        /// Collection searched.
        collection: RemoteCollection,
        /// Missing document id.
        id: String,
    },
    /// A record could not be serialized for the backend.
    #[error("failed to encode record for `{collection}`")]
    Encode {
        /// Target collection.
        collection: RemoteCollection,
        /// Serialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
