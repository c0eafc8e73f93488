use tracing::info;

use crate::{
    dto::live::{
        ActionResponse, CanUndoResponse, EventRequest, EventView, GoalAgainstRequest,
        GoalAgainstView, LiveStateResponse, LoadResponse, PeriodResponse, ShotRequest, ShotView,
        SyncResponse, SyncStatusView, TimeAdjustmentResponse, UndoResponse,
    },
    engine::{Game, GameStatus, LiveSession, Rejection, TeamSide},
    error::ServiceError,
    state::SharedState,
};

fn require_session(state: &SharedState) -> Result<LiveSession, ServiceError> {
    state
        .engine()
        .session()
        .ok_or(ServiceError::Rejected(Rejection::NoActiveGame))
}

/// Readout of the live game.
pub fn live_state(state: &SharedState) -> Result<LiveStateResponse, ServiceError> {
    let engine = state.engine();
    let session = engine
        .session()
        .ok_or_else(|| ServiceError::NotFound("no live game is active".into()))?;
    let sync = engine.sync_status().borrow().clone();
    Ok(LiveStateResponse::new(&session, engine.can_undo(), &sync))
}

/// Begin tracking `game`.
pub fn initialize_game(state: &SharedState, game: Game) -> Result<LiveStateResponse, ServiceError> {
    let game_id = game.id.clone();
    state.engine().initialize_live_game(game)?;
    info!(%game_id, "live tracking requested");
    live_state(state)
}

/// Move the game status forward.
pub fn update_status(
    state: &SharedState,
    status: GameStatus,
) -> Result<LiveStateResponse, ServiceError> {
    state.engine().update_game_status(status)?;
    live_state(state)
}

/// Archive the game, flush it and close the session.
pub async fn end_game(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    state.engine().end_game().await?;
    Ok(ActionResponse::new("game ended"))
}

/// Discard the live session.
pub fn clear_game(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    if !state.engine().clear_game_data() {
        return Err(Rejection::NoActiveGame.into());
    }
    Ok(ActionResponse::new("live game cleared"))
}

/// Replace local data with the stored records of `game`.
pub async fn load_game(state: &SharedState, game: Game) -> Result<LoadResponse, ServiceError> {
    let records = state.engine().load_game_data(game).await?;
    Ok(LoadResponse { records })
}

/// Start the clock.
pub fn start_clock(state: &SharedState) -> Result<LiveStateResponse, ServiceError> {
    clock_control(state, state.engine().start_tracking(), "clock cannot be started")
}

/// Pause the clock.
pub fn pause_clock(state: &SharedState) -> Result<LiveStateResponse, ServiceError> {
    clock_control(state, state.engine().pause_tracking(), "clock is not running")
}

/// Resume the clock.
pub fn resume_clock(state: &SharedState) -> Result<LiveStateResponse, ServiceError> {
    clock_control(state, state.engine().resume_tracking(), "clock is not paused")
}

fn clock_control(
    state: &SharedState,
    applied: bool,
    refusal: &str,
) -> Result<LiveStateResponse, ServiceError> {
    if !applied {
        require_session(state)?;
        return Err(ServiceError::InvalidState(refusal.into()));
    }
    live_state(state)
}

/// Shift game time.
pub fn adjust_time(
    state: &SharedState,
    delta: i64,
) -> Result<TimeAdjustmentResponse, ServiceError> {
    Ok(state.engine().adjust_time(delta)?.into())
}

/// Set game time.
pub fn set_time(state: &SharedState, seconds: i64) -> Result<TimeAdjustmentResponse, ServiceError> {
    Ok(state.engine().set_game_time(seconds)?.into())
}

/// Begin a period.
pub fn start_period(state: &SharedState, period: u8) -> Result<PeriodResponse, ServiceError> {
    Ok(state.engine().start_period(period)?.into())
}

/// End the period in play.
pub async fn end_period(state: &SharedState) -> Result<PeriodResponse, ServiceError> {
    Ok(state.engine().end_period().await?.into())
}

/// Record a shot.
pub fn add_shot(state: &SharedState, request: ShotRequest) -> Result<ShotView, ServiceError> {
    let shot = state.engine().add_shot(request.into())?;
    Ok(ShotView::from(&shot))
}

/// Shots of the live game.
pub fn list_shots(state: &SharedState) -> Result<Vec<ShotView>, ServiceError> {
    let session = require_session(state)?;
    Ok(session.shots().entries().iter().map(ShotView::from).collect())
}

/// Record a goal against.
pub fn add_goal_against(
    state: &SharedState,
    request: GoalAgainstRequest,
) -> Result<GoalAgainstView, ServiceError> {
    let goal = state.engine().add_goal_against(request.into())?;
    Ok(GoalAgainstView::from(&goal))
}

/// Goals against of the live game.
pub fn list_goals_against(state: &SharedState) -> Result<Vec<GoalAgainstView>, ServiceError> {
    let session = require_session(state)?;
    Ok(session
        .goals_against()
        .entries()
        .iter()
        .map(GoalAgainstView::from)
        .collect())
}

/// Score a goal for `side`.
pub fn add_goal(state: &SharedState, side: TeamSide) -> Result<EventView, ServiceError> {
    let event = match side {
        TeamSide::Home => state.engine().add_home_goal()?,
        TeamSide::Away => state.engine().add_away_goal()?,
    };
    Ok(EventView::from(&event))
}

/// Log a faceoff.
pub fn add_faceoff(state: &SharedState, won: bool) -> Result<EventView, ServiceError> {
    let event = if won {
        state.engine().add_faceoff_win()?
    } else {
        state.engine().add_faceoff_loss()?
    };
    Ok(EventView::from(&event))
}

/// Call the team timeout.
pub fn use_timeout(state: &SharedState) -> Result<EventView, ServiceError> {
    let event = state.engine().use_timeout()?;
    Ok(EventView::from(&event))
}

/// Log a penalty or tactical drawing.
pub fn record_event(state: &SharedState, request: EventRequest) -> Result<EventView, ServiceError> {
    let event =
        state
            .engine()
            .record_event(request.event_type, request.description, request.payload)?;
    Ok(EventView::from(&event))
}

/// Event log of the live game.
pub fn list_events(state: &SharedState) -> Result<Vec<EventView>, ServiceError> {
    let session = require_session(state)?;
    Ok(session.events().events().iter().map(EventView::from).collect())
}

/// Whether an undo is possible right now.
pub fn can_undo(state: &SharedState) -> CanUndoResponse {
    CanUndoResponse {
        can_undo: state.engine().can_undo(),
    }
}

/// Reverse the last action.
pub fn undo(state: &SharedState) -> Result<UndoResponse, ServiceError> {
    match state.engine().undo() {
        Some(report) => Ok(report.into()),
        None => {
            require_session(state)?;
            Err(ServiceError::InvalidState("nothing to undo".into()))
        }
    }
}

/// Flush pending changes now.
pub async fn sync(state: &SharedState) -> Result<SyncResponse, ServiceError> {
    Ok(state.engine().sync().await?.into())
}

/// Current sync indicator.
pub fn sync_status(state: &SharedState) -> SyncStatusView {
    SyncStatusView::from(&*state.engine().sync_status().borrow())
}
