//! Shared application state handed to every handler.

mod sse;

use std::sync::Arc;

use tokio::sync::watch;

use crate::{dao::remote_store::RemoteStore, engine::LiveGameEngine, error::ServiceError};

pub use self::sse::SseHub;

/// Handle to the application state cloned into every handler.
pub type SharedState = Arc<AppState>;

/// Default capacity of the live SSE channel.
pub const DEFAULT_SSE_CAPACITY: usize = 64;

/// Central application state: the tracking engine, the SSE hub and the storage health flag.
pub struct AppState {
    engine: Arc<LiveGameEngine>,
    sse: SseHub,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(engine: Arc<LiveGameEngine>, sse_capacity: usize) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            engine,
            sse: SseHub::new(sse_capacity.max(1)),
            degraded: degraded_tx,
        })
    }

    /// The live game tracking engine.
    pub fn engine(&self) -> &Arc<LiveGameEngine> {
        &self.engine
    }

    /// Obtain a handle to the current remote store, if one is installed.
    pub fn remote_store(&self) -> Option<Arc<dyn RemoteStore>> {
        self.engine.store()
    }

    /// Return the remote store or fail when running degraded.
    pub fn require_remote_store(&self) -> Result<Arc<dyn RemoteStore>, ServiceError> {
        self.remote_store().ok_or(ServiceError::Degraded)
    }

    /// Install a new remote store implementation and leave degraded mode.
    pub fn install_remote_store(&self, store: Arc<dyn RemoteStore>) {
        self.engine.install_store(store);
        self.update_degraded(false);
    }

    /// Remove the current remote store and enter degraded mode.
    pub fn clear_remote_store(&self) {
        self.engine.clear_store();
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub used for the live SSE stream.
    pub fn live_sse(&self) -> &SseHub {
        &self.sse
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dao::remote_store::memory::MemoryRemoteStore, engine::TrackingSettings};

    #[test]
    fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new(LiveGameEngine::new(TrackingSettings::default()), 4);
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(state.require_remote_store().is_err());

        state.install_remote_store(Arc::new(MemoryRemoteStore::new()));
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(state.engine().store().is_some());

        watcher.mark_unchanged();
        state.update_degraded(false);
        assert!(!watcher.has_changed().unwrap());

        state.clear_remote_store();
        assert!(state.is_degraded());
        assert!(state.remote_store().is_none());
    }
}
