use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the rinkside tracker.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::live_stream,
        crate::routes::live::live_state,
        crate::routes::live::initialize_game,
        crate::routes::live::clear_game,
        crate::routes::live::update_status,
        crate::routes::live::end_game,
        crate::routes::live::load_game,
        crate::routes::live::start_clock,
        crate::routes::live::pause_clock,
        crate::routes::live::resume_clock,
        crate::routes::live::adjust_time,
        crate::routes::live::set_time,
        crate::routes::live::start_period,
        crate::routes::live::end_period,
        crate::routes::live::list_shots,
        crate::routes::live::add_shot,
        crate::routes::live::list_goals_against,
        crate::routes::live::add_goal_against,
        crate::routes::live::add_home_goal,
        crate::routes::live::add_away_goal,
        crate::routes::live::add_faceoff_win,
        crate::routes::live::add_faceoff_loss,
        crate::routes::live::use_timeout,
        crate::routes::live::list_events,
        crate::routes::live::record_event,
        crate::routes::live::can_undo,
        crate::routes::live::undo,
        crate::routes::live::sync_status,
        crate::routes::live::sync,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::SyncStatusEvent,
            crate::engine::EngineNotification,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "live", description = "Live game lifecycle and undo"),
        (name = "clock", description = "Game clock and periods"),
        (name = "ledger", description = "Shots and goals against"),
        (name = "events", description = "Game event log"),
        (name = "sync", description = "Remote store synchronisation"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_live_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in ["/live/game", "/live/undo", "/live/sync", "/sse/live"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
