use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Identifier of the game being tracked, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_game: Option<String>,
    /// Whether local changes are waiting for the next sync.
    pub sync_pending: bool,
}

impl HealthResponse {
    /// Build the response for the given storage health.
    pub fn new(degraded: bool, live_game: Option<String>, sync_pending: bool) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            live_game,
            sync_pending,
        }
    }
}
