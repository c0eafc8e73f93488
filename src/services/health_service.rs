use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the remote store and summarise the tracker's health.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_remote_store() {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let engine = state.engine();
    let live_game = engine.session().map(|session| session.game().id.clone());
    let sync_pending = engine.sync_status().borrow().has_pending();
    HealthResponse::new(state.is_degraded(), live_game, sync_pending)
}
