//! Local JSON mirror of the live session, reloaded after a restart.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Namespace of the live-game snapshot.
pub const LIVE_GAME_NAMESPACE: &str = "hockey-live-game-storage";

/// Failure reading or writing the local cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The file or its directory could not be read, written or removed.
    #[error("failed to access cache file `{path}`")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// The file exists but holds something else than the expected document.
    #[error("cache file `{path}` is not valid JSON")]
    Decode {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// The value could not be turned into JSON.
    #[error("failed to encode cache entry")]
    Encode(#[source] serde_json::Error),
}

/// One namespaced JSON document on disk.
#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    /// Cache stored at `<dir>/<namespace>.json`.
    pub fn new(dir: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{namespace}.json")),
        }
    }

    /// File backing the cache.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached value, `None` when nothing was stored yet.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, CacheError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CacheError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    /// Replace the cached value. The previous file stays intact until the new one is complete.
    pub fn store<T: Serialize>(&self, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(CacheError::Encode)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, bytes).map_err(|source| self.io_error(source))?;
        fs::rename(&staging, &self.path).map_err(|source| self.io_error(source))
    }

    /// Remove the cached value.
    pub fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn values_round_trip_through_the_namespace_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path(), LIVE_GAME_NAMESPACE);
        assert!(cache.load::<Value>().unwrap().is_none());

        cache.store(&json!({"game_time": 42})).unwrap();
        assert!(cache.path().ends_with("hockey-live-game-storage.json"));
        assert_eq!(cache.load::<Value>().unwrap(), Some(json!({"game_time": 42})));

        cache.clear().unwrap();
        cache.clear().unwrap();
        assert!(cache.load::<Value>().unwrap().is_none());
    }

    #[test]
    fn corrupt_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path(), "broken");
        fs::write(cache.path(), b"{not json").unwrap();
        assert!(matches!(
            cache.load::<Value>(),
            Err(CacheError::Decode { .. })
        ));
    }
}
