//! Request and response types of the `/live` API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    dto::format_system_time,
    engine::{
        ClockPhase, EventType, Game, GameEvent, GameSchedule, GameStatus, GoalAgainst,
        LiveSession, NewGoalAgainst, NewShot, PeriodPlan, RinkPosition, Shot, ShotResult,
        SubStore, SyncReport, SyncStatus, TeamSide, TimeAdjustment, UndoReport,
        undo::UndoableKind,
    },
};

/// Game to start tracking, or whose stored data should be loaded.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GameRequest {
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub home_team: String,
    #[validate(length(min = 1, max = 64))]
    pub away_team: String,
    /// Number of regulation periods.
    #[validate(range(min = 1, max = 5))]
    pub periods: u8,
    /// Length of one period in minutes.
    #[validate(range(min = 1, max = 60))]
    pub period_minutes: u32,
    #[serde(default)]
    pub has_overtime: bool,
    /// Side the tracked team plays on.
    #[serde(default)]
    pub team_side: Option<TeamSide>,
    #[serde(default)]
    pub status: Option<GameStatus>,
    #[serde(default)]
    pub current_period: Option<u8>,
    #[serde(default)]
    pub home_score: u32,
    #[serde(default)]
    pub away_score: u32,
    #[serde(default)]
    pub timeout_used: bool,
}

impl From<GameRequest> for Game {
    fn from(value: GameRequest) -> Self {
        let schedule = GameSchedule {
            periods: value.periods,
            period_minutes: value.period_minutes,
            has_overtime: value.has_overtime,
        };
        let mut game = Game::new(value.id, value.home_team, value.away_team, schedule);
        game.team_side = value.team_side;
        game.status = value.status.unwrap_or_default();
        game.current_period = value
            .current_period
            .filter(|period| schedule.contains(*period))
            .unwrap_or(1);
        game.home_score = value.home_score;
        game.away_score = value.away_score;
        game.timeout_used = value.timeout_used;
        game
    }
}

/// Requested game status.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: GameStatus,
}

/// Relative clock correction.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AdjustTimeRequest {
    /// Seconds to add; negative values rewind.
    #[validate(range(min = -36_000, max = 36_000))]
    pub delta: i64,
}

/// Absolute clock correction.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetTimeRequest {
    #[validate(range(min = 0, max = 36_000))]
    pub seconds: i64,
}

/// Period to begin.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartPeriodRequest {
    #[validate(range(min = 1))]
    pub period: u8,
}

/// Shot placed on the rink diagram.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ShotRequest {
    #[validate(range(min = 0.0, max = 1.0))]
    pub x: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub y: f64,
    pub result: ShotResult,
    /// Defaults to the tracked team's side.
    #[serde(default)]
    pub team_side: Option<TeamSide>,
}

impl From<ShotRequest> for NewShot {
    fn from(value: ShotRequest) -> Self {
        Self {
            position: RinkPosition::new(value.x, value.y),
            result: value.result,
            team_side: value.team_side,
        }
    }
}

/// Goal conceded, placed on the rink diagram.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GoalAgainstRequest {
    #[validate(range(min = 0.0, max = 1.0))]
    pub x: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub y: f64,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub reason: Option<String>,
}

impl From<GoalAgainstRequest> for NewGoalAgainst {
    fn from(value: GoalAgainstRequest) -> Self {
        Self {
            position: RinkPosition::new(value.x, value.y),
            reason: value.reason,
        }
    }
}

/// Free-form log entry such as a penalty or a tactical drawing.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct EventRequest {
    #[validate(custom(function = "validate_manual_event"))]
    pub event_type: EventType,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub payload: Option<Value>,
}

/// Events with dedicated operations cannot be logged by hand.
fn validate_manual_event(event_type: &EventType) -> Result<(), ValidationError> {
    match event_type {
        EventType::Penalty | EventType::TacticalDrawing => Ok(()),
        _ => {
            let mut err = ValidationError::new("event_type_reserved");
            err.message = Some(
                format!(
                    "`{}` events are recorded by their own operation",
                    event_type.as_str()
                )
                .into(),
            );
            Err(err)
        }
    }
}

/// Game header as exposed to the UI.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameView {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub periods: u8,
    pub period_minutes: u32,
    pub has_overtime: bool,
    pub team_side: Option<TeamSide>,
    pub status: GameStatus,
    pub current_period: u8,
    pub home_score: u32,
    pub away_score: u32,
    pub timeout_used: bool,
}

impl From<&Game> for GameView {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id.clone(),
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            periods: game.schedule.periods,
            period_minutes: game.schedule.period_minutes,
            has_overtime: game.schedule.has_overtime,
            team_side: game.team_side,
            status: game.status,
            current_period: game.current_period,
            home_score: game.home_score,
            away_score: game.away_score,
            timeout_used: game.timeout_used,
        }
    }
}

/// Clock readout.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClockView {
    pub phase: ClockPhase,
    /// Seconds since game start.
    pub game_time: u32,
    /// Seconds elapsed in the current period.
    pub period_elapsed: i64,
    /// Length of a period in seconds.
    pub period_length: u32,
}

/// Sync indicator.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncStatusView {
    /// Sub-stores with unsynced changes.
    pub pending: Vec<SubStore>,
    pub syncing: bool,
    pub last_error: Option<String>,
    /// RFC 3339 completion time of the last successful sync.
    pub last_synced_at: Option<String>,
}

impl From<&SyncStatus> for SyncStatusView {
    fn from(status: &SyncStatus) -> Self {
        Self {
            pending: status.pending.dirty().collect(),
            syncing: status.syncing,
            last_error: status.last_error.clone(),
            last_synced_at: status.last_synced_at.map(format_system_time),
        }
    }
}

/// Complete readout of the live game.
#[derive(Debug, Serialize, ToSchema)]
pub struct LiveStateResponse {
    pub game: GameView,
    pub clock: ClockView,
    pub shots: usize,
    pub goals_against: usize,
    pub events: usize,
    /// Kind of the action an undo would reverse, while still allowed.
    pub undoable: Option<UndoableKind>,
    pub sync: SyncStatusView,
}

impl LiveStateResponse {
    /// Build the readout from a session copy.
    pub fn new(session: &LiveSession, can_undo: bool, sync: &SyncStatus) -> Self {
        let game = session.game();
        let clock = session.clock();
        Self {
            game: GameView::from(game),
            clock: ClockView {
                phase: clock.phase(),
                game_time: clock.game_time,
                period_elapsed: clock.period_elapsed(&game.schedule, game.current_period),
                period_length: game.schedule.period_length_secs(),
            },
            shots: session.shots().len(),
            goals_against: session.goals_against().len(),
            events: session.events().len(),
            undoable: session
                .last_action()
                .filter(|_| can_undo)
                .map(|action| action.kind),
            sync: SyncStatusView::from(sync),
        }
    }
}

/// Recorded shot.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShotView {
    pub id: Uuid,
    pub period: u8,
    pub timestamp: String,
    pub x: f64,
    pub y: f64,
    pub result: ShotResult,
    pub team_side: TeamSide,
    pub synced: bool,
}

impl From<&Shot> for ShotView {
    fn from(shot: &Shot) -> Self {
        Self {
            id: shot.id,
            period: shot.period,
            timestamp: format_system_time(shot.timestamp),
            x: shot.position.x,
            y: shot.position.y,
            result: shot.result,
            team_side: shot.team_side,
            synced: shot.synced,
        }
    }
}

/// Recorded goal against.
#[derive(Debug, Serialize, ToSchema)]
pub struct GoalAgainstView {
    pub id: Uuid,
    pub period: u8,
    pub timestamp: String,
    pub x: f64,
    pub y: f64,
    pub reason: Option<String>,
    pub synced: bool,
}

impl From<&GoalAgainst> for GoalAgainstView {
    fn from(goal: &GoalAgainst) -> Self {
        Self {
            id: goal.id,
            period: goal.period,
            timestamp: format_system_time(goal.timestamp),
            x: goal.position.x,
            y: goal.position.y,
            reason: goal.reason.clone(),
            synced: goal.synced,
        }
    }
}

/// Logged game event.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventView {
    pub id: Uuid,
    pub event_type: EventType,
    pub period: u8,
    pub game_time: u32,
    pub timestamp: String,
    pub description: String,
    #[schema(value_type = Option<Object>)]
    pub payload: Option<Value>,
    pub synced: bool,
}

impl From<&GameEvent> for EventView {
    fn from(event: &GameEvent) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            period: event.period,
            game_time: event.game_time,
            timestamp: format_system_time(event.timestamp),
            description: event.description.clone(),
            payload: event.payload.clone(),
            synced: event.synced,
        }
    }
}

/// Clock after a manual correction.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimeAdjustmentResponse {
    pub game_time: u32,
    /// Logged events now ahead of the clock.
    pub events_ahead: usize,
}

impl From<TimeAdjustment> for TimeAdjustmentResponse {
    fn from(value: TimeAdjustment) -> Self {
        Self {
            game_time: value.game_time,
            events_ahead: value.events_ahead,
        }
    }
}

/// Applied period transition.
#[derive(Debug, Serialize, ToSchema)]
pub struct PeriodResponse {
    pub from: u8,
    pub to: u8,
    /// Whether pending changes were flushed.
    pub checkpoint: bool,
}

impl From<PeriodPlan> for PeriodResponse {
    fn from(plan: PeriodPlan) -> Self {
        Self {
            from: plan.from,
            to: plan.to,
            checkpoint: plan.sync_checkpoint,
        }
    }
}

/// Whether the last action can be undone.
#[derive(Debug, Serialize, ToSchema)]
pub struct CanUndoResponse {
    pub can_undo: bool,
}

/// Result of an undo.
#[derive(Debug, Serialize, ToSchema)]
pub struct UndoResponse {
    pub kind: UndoableKind,
    pub removed_entry: Option<Uuid>,
    pub removed_event: Option<Uuid>,
    pub score_reverted: bool,
}

impl From<UndoReport> for UndoResponse {
    fn from(report: UndoReport) -> Self {
        Self {
            kind: report.kind,
            removed_entry: report.removed_entry,
            removed_event: report.removed_event,
            score_reverted: report.score_reverted,
        }
    }
}

/// Result of a sync pass.
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    /// Another pass was already running.
    pub skipped: bool,
    pub created: usize,
    pub deleted: usize,
    pub game_state_pushed: bool,
    pub cleared: Vec<SubStore>,
}

impl From<SyncReport> for SyncResponse {
    fn from(report: SyncReport) -> Self {
        Self {
            skipped: report.skipped,
            created: report.created,
            deleted: report.deleted,
            game_state_pushed: report.game_state_pushed,
            cleared: report.cleared,
        }
    }
}

/// Records loaded from the remote store.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoadResponse {
    pub records: usize,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GameRequest {
        serde_json::from_value(serde_json::json!({
            "id": "g-42",
            "home_team": "Hawks",
            "away_team": "Owls",
            "periods": 3,
            "period_minutes": 20,
            "team_side": "away",
            "current_period": 9,
        }))
        .unwrap()
    }

    #[test]
    fn game_requests_fill_a_planned_game() {
        let request = request();
        assert!(request.validate().is_ok());
        let game = Game::from(request);
        assert_eq!(game.status, GameStatus::Planned);
        assert_eq!(game.team_side, Some(TeamSide::Away));
        assert_eq!(game.current_period, 1);
        assert_eq!(game.schedule.period_length_secs(), 1_200);
    }

    #[test]
    fn out_of_range_requests_are_rejected() {
        let mut request = request();
        request.periods = 0;
        assert!(request.validate().is_err());

        let shot = ShotRequest {
            x: 1.5,
            y: 0.5,
            result: ShotResult::Miss,
            team_side: None,
        };
        assert!(shot.validate().is_err());
    }

    #[test]
    fn reserved_event_types_cannot_be_logged_by_hand() {
        let event = EventRequest {
            event_type: EventType::GoalHome,
            description: "sneaky".into(),
            payload: None,
        };
        assert!(event.validate().is_err());

        let penalty = EventRequest {
            event_type: EventType::Penalty,
            description: "Hooking, #12".into(),
            payload: None,
        };
        assert!(penalty.validate().is_ok());
    }
}
