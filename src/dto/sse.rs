use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::live::SyncStatusView;

/// First frame of every live connection.
pub const EVENT_HANDSHAKE: &str = "handshake";
/// Storage backend entered or left degraded mode.
pub const EVENT_SYSTEM_STATUS: &str = "system.status";
/// The sync indicator changed.
pub const EVENT_SYNC_STATUS: &str = "sync.status";

#[derive(Clone, Debug, PartialEq, Eq)]
/// One frame of the live stream.
pub struct ServerEvent {
    /// SSE event name.
    pub name: &'static str,
    /// JSON payload.
    pub data: String,
    /// Position in the hub's broadcast order; unset on per-connection frames.
    pub sequence: Option<u64>,
}

impl ServerEvent {
    /// Serialise `payload` into an unsequenced frame.
    pub fn json<T: Serialize>(name: &'static str, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            name,
            data: serde_json::to_string(payload)?,
            sequence: None,
        })
    }

    pub(crate) fn with_sequence(self, sequence: u64) -> Self {
        Self {
            sequence: Some(sequence),
            ..self
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
    /// Identifier of the game being tracked, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    /// Sequence of the last frame broadcast before this connection; later frames count up from it.
    pub last_sequence: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the sync indicator changes.
pub struct SyncStatusEvent(pub SyncStatusView);
