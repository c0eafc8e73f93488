//! Failures of the CouchDB backend, labelled by the exchange that produced them.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Result alias for CouchDB calls.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Kind of HTTP exchange made with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouchOp {
    /// Checking that the database exists.
    OpenDatabase,
    /// Creating the database on first use.
    CreateDatabase,
    /// Reading one document.
    Read,
    /// Creating or replacing a document.
    Write,
    /// Mango `_find` query.
    Find,
    /// Deleting a document revision.
    Delete,
    /// Health probe.
    Ping,
}

impl fmt::Display for CouchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CouchOp::OpenDatabase => "open-database",
            CouchOp::CreateDatabase => "create-database",
            CouchOp::Read => "read",
            CouchOp::Write => "write",
            CouchOp::Find => "find",
            CouchOp::Delete => "delete",
            CouchOp::Ping => "ping",
        })
    }
}

/// Failures that can occur while talking to CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// A connection setting is missing or malformed.
    #[error("CouchDB setting `{var}` {problem}")]
    Config {
        /// Environment variable holding the setting.
        var: &'static str,
        /// What is wrong with it.
        problem: &'static str,
    },
    /// The HTTP client could not be built.
    #[error("failed to build the CouchDB HTTP client")]
    Client(#[source] reqwest::Error),
    /// The request never got an answer.
    #[error("CouchDB {op} request on `{target}` failed")]
    Transport {
        /// Exchange that was attempted.
        op: CouchOp,
        /// Database or document addressed.
        target: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with an unexpected status.
    #[error("CouchDB {op} on `{target}` answered {status}")]
    Status {
        /// Exchange that was attempted.
        op: CouchOp,
        /// Database or document addressed.
        target: String,
        /// Status the server answered with.
        status: StatusCode,
    },
    /// The answer body was not the expected JSON.
    #[error("CouchDB {op} on `{target}` returned an unreadable body")]
    Decode {
        /// Exchange that was attempted.
        op: CouchOp,
        /// Database or document addressed.
        target: String,
        /// Body decoding error.
        #[source]
        source: reqwest::Error,
    },
    /// The record to write is not a JSON object.
    #[error("CouchDB documents must be JSON objects")]
    NotAnObject,
}

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
