//! Game, ledger entry and event types shared by the engine and the DTOs.

use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a game as seen by the tracker.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Scheduled but not yet tracked.
    #[default]
    Planned,
    /// Currently being tracked.
    Live,
    /// Finished and closed.
    Archived,
}

impl GameStatus {
    /// Status only ever moves forward: `planned → live → archived`.
    pub fn can_advance_to(self, next: GameStatus) -> bool {
        next > self
    }

    /// Wire representation of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Planned => "planned",
            GameStatus::Live => "live",
            GameStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of the scoreboard a team or record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    /// Home team.
    Home,
    /// Visiting team.
    Away,
}

/// Period layout of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSchedule {
    /// Number of regulation periods.
    pub periods: u8,
    /// Length of each period in minutes.
    pub period_minutes: u32,
    /// Whether a single overtime period may follow regulation.
    pub has_overtime: bool,
}

impl GameSchedule {
    /// Length of one period in clock seconds.
    pub fn period_length_secs(&self) -> u32 {
        self.period_minutes.saturating_mul(60)
    }

    /// Highest period number the game can reach, overtime included.
    pub fn last_period(&self) -> u8 {
        self.periods.saturating_add(u8::from(self.has_overtime))
    }

    /// Whether `period` exists in this schedule.
    pub fn contains(&self, period: u8) -> bool {
        (1..=self.last_period()).contains(&period)
    }

    /// Whether `period` is the overtime period.
    pub fn is_overtime(&self, period: u8) -> bool {
        self.has_overtime && period == self.last_period() && period > self.periods
    }

    /// Game time (seconds) at which `period` starts.
    pub fn period_start_secs(&self, period: u8) -> u32 {
        self.period_length_secs()
            .saturating_mul(u32::from(period.saturating_sub(1)))
    }
}

/// A game owned by the engine for the duration of a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Identifier of the game document in the remote store.
    pub id: String,
    /// Reference to the home team.
    pub home_team: String,
    /// Reference to the away team.
    pub away_team: String,
    /// Period layout.
    pub schedule: GameSchedule,
    /// Which side the coached team plays on, when known.
    #[serde(default)]
    pub team_side: Option<TeamSide>,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Period currently in play (1-based).
    pub current_period: u8,
    /// Goals scored by the home team.
    pub home_score: u32,
    /// Goals scored by the away team.
    pub away_score: u32,
    /// Whether the single team timeout has been consumed.
    pub timeout_used: bool,
}

impl Game {
    /// Build a planned game with an empty scoreboard.
    pub fn new(
        id: impl Into<String>,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        schedule: GameSchedule,
    ) -> Self {
        Self {
            id: id.into(),
            home_team: home_team.into(),
            away_team: away_team.into(),
            schedule,
            team_side: None,
            status: GameStatus::Planned,
            current_period: 1,
            home_score: 0,
            away_score: 0,
            timeout_used: false,
        }
    }
}

/// Closed set of events the log accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A period began.
    PeriodStart,
    /// A period ended.
    PeriodEnd,
    /// Home team scored.
    GoalHome,
    /// Away team scored.
    GoalAway,
    /// The team timeout was called.
    Timeout,
    /// A penalty was assessed.
    Penalty,
    /// Tracking of the game began.
    GameStart,
    /// The game ended.
    GameEnd,
    /// Faceoff won by the coached team.
    FaceoffWon,
    /// Faceoff lost by the coached team.
    FaceoffLost,
    /// A tactical drawing was attached to the game.
    TacticalDrawing,
}

impl EventType {
    /// Wire representation of the event type.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::PeriodStart => "period_start",
            EventType::PeriodEnd => "period_end",
            EventType::GoalHome => "goal_home",
            EventType::GoalAway => "goal_away",
            EventType::Timeout => "timeout",
            EventType::Penalty => "penalty",
            EventType::GameStart => "game_start",
            EventType::GameEnd => "game_end",
            EventType::FaceoffWon => "faceoff_won",
            EventType::FaceoffLost => "faceoff_lost",
            EventType::TacticalDrawing => "tactical_drawing",
        }
    }
}

/// Entry of the append-only event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Local identifier.
    pub id: Uuid,
    /// Game the event belongs to.
    pub game_id: String,
    /// Kind of event.
    pub event_type: EventType,
    /// Period in play when the event happened.
    pub period: u8,
    /// Engine clock value (seconds) at occurrence.
    pub game_time: u32,
    /// Wall-clock time at occurrence.
    pub timestamp: SystemTime,
    /// Free-text description.
    pub description: String,
    /// Optional structured payload.
    #[serde(default)]
    pub payload: Option<Value>,
    /// Whether the event reached the remote store.
    pub synced: bool,
    /// Identifier assigned by the remote store.
    #[serde(default)]
    pub remote_id: Option<String>,
}

/// Outcome of a shot on goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShotResult {
    /// The shot went in.
    Goal,
    /// The goalie stopped it.
    Save,
    /// The shot missed the net.
    Miss,
    /// A skater blocked it.
    Blocked,
}

/// Normalized rink coordinates, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RinkPosition {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl RinkPosition {
    /// Build a position, clamping both axes into the unit square.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Shot ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    /// Local identifier.
    pub id: Uuid,
    /// Game the shot belongs to.
    pub game_id: String,
    /// Period in play.
    pub period: u8,
    /// Wall-clock time of the shot.
    pub timestamp: SystemTime,
    /// Where the shot was taken from.
    pub position: RinkPosition,
    /// What happened.
    pub result: ShotResult,
    /// Team that took the shot.
    pub team_side: TeamSide,
    /// Whether the shot reached the remote store.
    pub synced: bool,
    /// Identifier assigned by the remote store.
    #[serde(default)]
    pub remote_id: Option<String>,
}

/// Goal-against ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalAgainst {
    /// Local identifier.
    pub id: Uuid,
    /// Game the goal belongs to.
    pub game_id: String,
    /// Period in play.
    pub period: u8,
    /// Wall-clock time of the goal.
    pub timestamp: SystemTime,
    /// Where the goal was scored from.
    pub position: RinkPosition,
    /// Optional explanation recorded by the coach.
    #[serde(default)]
    pub reason: Option<String>,
    /// Whether the entry reached the remote store.
    pub synced: bool,
    /// Identifier assigned by the remote store.
    #[serde(default)]
    pub remote_id: Option<String>,
}

/// Input for [`crate::engine::LiveGameEngine::add_shot`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewShot {
    /// Where the shot was taken from.
    pub position: RinkPosition,
    /// What happened.
    pub result: ShotResult,
    /// Shooting side; defaults to the game's team side, then home.
    pub team_side: Option<TeamSide>,
}

/// Input for [`crate::engine::LiveGameEngine::add_goal_against`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewGoalAgainst {
    /// Where the goal was scored from.
    pub position: RinkPosition,
    /// Optional explanation.
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(periods: u8, has_overtime: bool) -> GameSchedule {
        GameSchedule {
            periods,
            period_minutes: 20,
            has_overtime,
        }
    }

    #[test]
    fn status_only_moves_forward() {
        assert!(GameStatus::Planned.can_advance_to(GameStatus::Live));
        assert!(GameStatus::Live.can_advance_to(GameStatus::Archived));
        assert!(!GameStatus::Live.can_advance_to(GameStatus::Planned));
        assert!(!GameStatus::Archived.can_advance_to(GameStatus::Live));
        assert!(!GameStatus::Live.can_advance_to(GameStatus::Live));
    }

    #[test]
    fn overtime_extends_the_schedule_by_one_period() {
        let regulation = schedule(3, false);
        assert_eq!(regulation.last_period(), 3);
        assert!(!regulation.contains(4));

        let with_ot = schedule(3, true);
        assert_eq!(with_ot.last_period(), 4);
        assert!(with_ot.contains(4));
        assert!(with_ot.is_overtime(4));
        assert!(!with_ot.is_overtime(3));
        assert!(!with_ot.contains(0));
    }

    #[test]
    fn period_start_offsets_follow_period_length() {
        let s = schedule(3, false);
        assert_eq!(s.period_start_secs(1), 0);
        assert_eq!(s.period_start_secs(2), 1200);
        assert_eq!(s.period_start_secs(3), 2400);
    }

    #[test]
    fn positions_are_clamped_into_the_unit_square() {
        assert_eq!(RinkPosition::new(-0.5, 1.7), RinkPosition { x: 0.0, y: 1.0 });
        assert_eq!(RinkPosition::new(f64::NAN, 0.25).x, 0.0);
    }
}
