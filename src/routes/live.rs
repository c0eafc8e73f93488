//! Live game endpoints: lifecycle, clock, periods, ledgers, undo and sync.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::live::{
        ActionResponse, AdjustTimeRequest, CanUndoResponse, EventRequest, EventView, GameRequest,
        GoalAgainstRequest, GoalAgainstView, LiveStateResponse, LoadResponse, PeriodResponse,
        SetTimeRequest, ShotRequest, ShotView, StartPeriodRequest, StatusRequest, SyncResponse,
        SyncStatusView, TimeAdjustmentResponse, UndoResponse,
    },
    engine::TeamSide,
    error::AppError,
    services::tracking_service,
    state::SharedState,
};

/// Live game tracking endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/live/game",
            get(live_state).post(initialize_game).delete(clear_game),
        )
        .route("/live/game/status", put(update_status))
        .route("/live/game/end", post(end_game))
        .route("/live/game/load", post(load_game))
        .route("/live/clock/start", post(start_clock))
        .route("/live/clock/pause", post(pause_clock))
        .route("/live/clock/resume", post(resume_clock))
        .route("/live/clock/adjust", post(adjust_time))
        .route("/live/clock/time", put(set_time))
        .route("/live/periods/start", post(start_period))
        .route("/live/periods/end", post(end_period))
        .route("/live/shots", get(list_shots).post(add_shot))
        .route(
            "/live/goals-against",
            get(list_goals_against).post(add_goal_against),
        )
        .route("/live/goals/home", post(add_home_goal))
        .route("/live/goals/away", post(add_away_goal))
        .route("/live/faceoffs/win", post(add_faceoff_win))
        .route("/live/faceoffs/loss", post(add_faceoff_loss))
        .route("/live/timeout", post(use_timeout))
        .route("/live/events", get(list_events).post(record_event))
        .route("/live/undo", get(can_undo).post(undo))
        .route("/live/sync", get(sync_status).post(sync))
}

/// Readout of the live game.
#[utoipa::path(
    get,
    path = "/live/game",
    tag = "live",
    responses(
        (status = 200, description = "Live game state", body = LiveStateResponse),
        (status = 404, description = "No live game")
    )
)]
pub async fn live_state(
    State(state): State<SharedState>,
) -> Result<Json<LiveStateResponse>, AppError> {
    Ok(Json(tracking_service::live_state(&state)?))
}

/// Begin tracking a game.
#[utoipa::path(
    post,
    path = "/live/game",
    tag = "live",
    request_body = GameRequest,
    responses(
        (status = 200, description = "Game is live", body = LiveStateResponse),
        (status = 409, description = "Another game still has unsynced changes")
    )
)]
pub async fn initialize_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<GameRequest>>,
) -> Result<Json<LiveStateResponse>, AppError> {
    Ok(Json(tracking_service::initialize_game(
        &state,
        payload.into(),
    )?))
}

/// Discard the live game and its local copy.
#[utoipa::path(
    delete,
    path = "/live/game",
    tag = "live",
    responses((status = 200, description = "Live game discarded", body = ActionResponse))
)]
pub async fn clear_game(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(tracking_service::clear_game(&state)?))
}

/// Move the game status forward.
#[utoipa::path(
    put,
    path = "/live/game/status",
    tag = "live",
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status updated", body = LiveStateResponse),
        (status = 409, description = "Status cannot move backwards")
    )
)]
pub async fn update_status(
    State(state): State<SharedState>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<LiveStateResponse>, AppError> {
    Ok(Json(tracking_service::update_status(&state, payload.status)?))
}

/// Archive the game, flush it and close the session.
#[utoipa::path(
    post,
    path = "/live/game/end",
    tag = "live",
    responses((status = 200, description = "Game archived", body = ActionResponse))
)]
pub async fn end_game(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(tracking_service::end_game(&state).await?))
}

/// Replace local data with the records stored for a game.
#[utoipa::path(
    post,
    path = "/live/game/load",
    tag = "live",
    request_body = GameRequest,
    responses(
        (status = 200, description = "Records loaded", body = LoadResponse),
        (status = 409, description = "Local changes are not synced"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn load_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<GameRequest>>,
) -> Result<Json<LoadResponse>, AppError> {
    Ok(Json(
        tracking_service::load_game(&state, payload.into()).await?,
    ))
}

/// Start the clock.
#[utoipa::path(
    post,
    path = "/live/clock/start",
    tag = "clock",
    responses((status = 200, description = "Clock running", body = LiveStateResponse))
)]
pub async fn start_clock(
    State(state): State<SharedState>,
) -> Result<Json<LiveStateResponse>, AppError> {
    Ok(Json(tracking_service::start_clock(&state)?))
}

/// Pause the clock.
#[utoipa::path(
    post,
    path = "/live/clock/pause",
    tag = "clock",
    responses((status = 200, description = "Clock paused", body = LiveStateResponse))
)]
pub async fn pause_clock(
    State(state): State<SharedState>,
) -> Result<Json<LiveStateResponse>, AppError> {
    Ok(Json(tracking_service::pause_clock(&state)?))
}

/// Resume the clock.
#[utoipa::path(
    post,
    path = "/live/clock/resume",
    tag = "clock",
    responses((status = 200, description = "Clock running", body = LiveStateResponse))
)]
pub async fn resume_clock(
    State(state): State<SharedState>,
) -> Result<Json<LiveStateResponse>, AppError> {
    Ok(Json(tracking_service::resume_clock(&state)?))
}

/// Shift game time by a number of seconds.
#[utoipa::path(
    post,
    path = "/live/clock/adjust",
    tag = "clock",
    request_body = AdjustTimeRequest,
    responses((status = 200, description = "Clock adjusted", body = TimeAdjustmentResponse))
)]
pub async fn adjust_time(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<AdjustTimeRequest>>,
) -> Result<Json<TimeAdjustmentResponse>, AppError> {
    Ok(Json(tracking_service::adjust_time(&state, payload.delta)?))
}

/// Set game time.
#[utoipa::path(
    put,
    path = "/live/clock/time",
    tag = "clock",
    request_body = SetTimeRequest,
    responses((status = 200, description = "Clock set", body = TimeAdjustmentResponse))
)]
pub async fn set_time(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SetTimeRequest>>,
) -> Result<Json<TimeAdjustmentResponse>, AppError> {
    Ok(Json(tracking_service::set_time(&state, payload.seconds)?))
}

/// Begin a period.
#[utoipa::path(
    post,
    path = "/live/periods/start",
    tag = "clock",
    request_body = StartPeriodRequest,
    responses(
        (status = 200, description = "Period started", body = PeriodResponse),
        (status = 409, description = "Period out of range or clock running")
    )
)]
pub async fn start_period(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<StartPeriodRequest>>,
) -> Result<Json<PeriodResponse>, AppError> {
    Ok(Json(tracking_service::start_period(&state, payload.period)?))
}

/// End the period in play.
#[utoipa::path(
    post,
    path = "/live/periods/end",
    tag = "clock",
    responses((status = 200, description = "Period ended", body = PeriodResponse))
)]
pub async fn end_period(
    State(state): State<SharedState>,
) -> Result<Json<PeriodResponse>, AppError> {
    Ok(Json(tracking_service::end_period(&state).await?))
}

/// Shots of the live game.
#[utoipa::path(
    get,
    path = "/live/shots",
    tag = "ledger",
    responses((status = 200, description = "Recorded shots", body = [ShotView]))
)]
pub async fn list_shots(State(state): State<SharedState>) -> Result<Json<Vec<ShotView>>, AppError> {
    Ok(Json(tracking_service::list_shots(&state)?))
}

/// Record a shot.
#[utoipa::path(
    post,
    path = "/live/shots",
    tag = "ledger",
    request_body = ShotRequest,
    responses((status = 200, description = "Shot recorded", body = ShotView))
)]
pub async fn add_shot(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ShotRequest>>,
) -> Result<Json<ShotView>, AppError> {
    Ok(Json(tracking_service::add_shot(&state, payload)?))
}

/// Goals against of the live game.
#[utoipa::path(
    get,
    path = "/live/goals-against",
    tag = "ledger",
    responses((status = 200, description = "Recorded goals against", body = [GoalAgainstView]))
)]
pub async fn list_goals_against(
    State(state): State<SharedState>,
) -> Result<Json<Vec<GoalAgainstView>>, AppError> {
    Ok(Json(tracking_service::list_goals_against(&state)?))
}

/// Record a goal against.
#[utoipa::path(
    post,
    path = "/live/goals-against",
    tag = "ledger",
    request_body = GoalAgainstRequest,
    responses((status = 200, description = "Goal against recorded", body = GoalAgainstView))
)]
pub async fn add_goal_against(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<GoalAgainstRequest>>,
) -> Result<Json<GoalAgainstView>, AppError> {
    Ok(Json(tracking_service::add_goal_against(&state, payload)?))
}

/// Score a home goal.
#[utoipa::path(
    post,
    path = "/live/goals/home",
    tag = "events",
    responses((status = 200, description = "Goal logged", body = EventView))
)]
pub async fn add_home_goal(State(state): State<SharedState>) -> Result<Json<EventView>, AppError> {
    Ok(Json(tracking_service::add_goal(&state, TeamSide::Home)?))
}

/// Score an away goal.
#[utoipa::path(
    post,
    path = "/live/goals/away",
    tag = "events",
    responses((status = 200, description = "Goal logged", body = EventView))
)]
pub async fn add_away_goal(State(state): State<SharedState>) -> Result<Json<EventView>, AppError> {
    Ok(Json(tracking_service::add_goal(&state, TeamSide::Away)?))
}

/// Log a won faceoff.
#[utoipa::path(
    post,
    path = "/live/faceoffs/win",
    tag = "events",
    responses((status = 200, description = "Faceoff logged", body = EventView))
)]
pub async fn add_faceoff_win(
    State(state): State<SharedState>,
) -> Result<Json<EventView>, AppError> {
    Ok(Json(tracking_service::add_faceoff(&state, true)?))
}

/// Log a lost faceoff.
#[utoipa::path(
    post,
    path = "/live/faceoffs/loss",
    tag = "events",
    responses((status = 200, description = "Faceoff logged", body = EventView))
)]
pub async fn add_faceoff_loss(
    State(state): State<SharedState>,
) -> Result<Json<EventView>, AppError> {
    Ok(Json(tracking_service::add_faceoff(&state, false)?))
}

/// Call the team timeout.
#[utoipa::path(
    post,
    path = "/live/timeout",
    tag = "events",
    responses(
        (status = 200, description = "Timeout logged", body = EventView),
        (status = 409, description = "Timeout already used")
    )
)]
pub async fn use_timeout(State(state): State<SharedState>) -> Result<Json<EventView>, AppError> {
    Ok(Json(tracking_service::use_timeout(&state)?))
}

/// Event log of the live game.
#[utoipa::path(
    get,
    path = "/live/events",
    tag = "events",
    responses((status = 200, description = "Logged events", body = [EventView]))
)]
pub async fn list_events(
    State(state): State<SharedState>,
) -> Result<Json<Vec<EventView>>, AppError> {
    Ok(Json(tracking_service::list_events(&state)?))
}

/// Log a penalty or a tactical drawing.
#[utoipa::path(
    post,
    path = "/live/events",
    tag = "events",
    request_body = EventRequest,
    responses((status = 200, description = "Event logged", body = EventView))
)]
pub async fn record_event(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<EventRequest>>,
) -> Result<Json<EventView>, AppError> {
    Ok(Json(tracking_service::record_event(&state, payload)?))
}

/// Whether the last action can still be undone.
#[utoipa::path(
    get,
    path = "/live/undo",
    tag = "live",
    responses((status = 200, description = "Undo availability", body = CanUndoResponse))
)]
pub async fn can_undo(State(state): State<SharedState>) -> Json<CanUndoResponse> {
    Json(tracking_service::can_undo(&state))
}

/// Reverse the last action.
#[utoipa::path(
    post,
    path = "/live/undo",
    tag = "live",
    responses(
        (status = 200, description = "Action reversed", body = UndoResponse),
        (status = 409, description = "Nothing to undo")
    )
)]
pub async fn undo(State(state): State<SharedState>) -> Result<Json<UndoResponse>, AppError> {
    Ok(Json(tracking_service::undo(&state)?))
}

/// Current sync indicator.
#[utoipa::path(
    get,
    path = "/live/sync",
    tag = "sync",
    responses((status = 200, description = "Sync indicator", body = SyncStatusView))
)]
pub async fn sync_status(State(state): State<SharedState>) -> Json<SyncStatusView> {
    Json(tracking_service::sync_status(&state))
}

/// Flush pending changes to the remote store.
#[utoipa::path(
    post,
    path = "/live/sync",
    tag = "sync",
    responses(
        (status = 200, description = "Sync finished", body = SyncResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn sync(State(state): State<SharedState>) -> Result<Json<SyncResponse>, AppError> {
    Ok(Json(tracking_service::sync(&state).await?))
}
