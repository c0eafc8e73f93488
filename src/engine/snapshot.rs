//! Serializable copy of the live session kept in the local cache.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::session::LiveSession;

const SNAPSHOT_FORMAT: u32 = 1;

/// Serializable copy of the live session, mirrored to the local cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Layout version of the snapshot.
    pub format: u32,
    /// When the snapshot was taken.
    pub saved_at: SystemTime,
    /// Session state.
    pub session: LiveSession,
}

impl EngineSnapshot {
    /// Capture `session` at `now`.
    pub fn capture(session: &LiveSession, now: SystemTime) -> Self {
        Self {
            format: SNAPSHOT_FORMAT,
            saved_at: now,
            session: session.clone(),
        }
    }

    /// Whether this build understands the snapshot layout.
    pub fn is_supported(&self) -> bool {
        self.format == SNAPSHOT_FORMAT
    }

    /// Session to resume from. The clock always comes back stopped.
    pub fn into_session(self) -> LiveSession {
        let mut session = self.session;
        session.clock.stop();
        session
    }
}
