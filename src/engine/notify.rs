//! Notifications broadcast to engine subscribers and the sync indicator.

use std::time::SystemTime;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    clock::ClockPhase,
    model::{EventType, GameStatus},
    pending::PendingChanges,
    undo::UndoableKind,
};

/// Change notifications fanned out to engine subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineNotification {
    /// A live game became active.
    GameLoaded {
        /// Game identifier.
        game_id: String,
    },
    /// The live session was closed or discarded.
    GameCleared,
    /// One second of play elapsed.
    ClockTick {
        /// New game time.
        game_time: u32,
    },
    /// The clock changed phase or was adjusted.
    ClockChanged {
        /// Phase after the change.
        phase: ClockPhase,
        /// Game time after the change.
        game_time: u32,
    },
    /// A period started or ended.
    PeriodChanged {
        /// Period in play.
        period: u8,
        /// Whether the period just ended.
        ended: bool,
    },
    /// The running clock reached the end of the period and stopped.
    PeriodExpired {
        /// Expired period.
        period: u8,
        /// Game time at expiry.
        game_time: u32,
    },
    /// A score changed.
    ScoreChanged {
        /// Home score.
        home_score: u32,
        /// Away score.
        away_score: u32,
    },
    /// A shot was recorded.
    ShotRecorded {
        /// Shot identifier.
        id: Uuid,
    },
    /// A goal against was recorded.
    GoalAgainstRecorded {
        /// Entry identifier.
        id: Uuid,
    },
    /// An event was appended to the log.
    EventRecorded {
        /// Event identifier.
        id: Uuid,
        /// Event kind.
        event_type: EventType,
    },
    /// The last action was reversed.
    ActionUndone {
        /// Kind of reversed action.
        kind: UndoableKind,
    },
    /// The game status changed.
    StatusChanged {
        /// New status.
        status: GameStatus,
    },
    /// Local data was replaced by records loaded from the remote store.
    DataLoaded {
        /// Number of records loaded.
        records: usize,
    },
}

impl EngineNotification {
    /// Stable event name used on the SSE stream.
    pub fn name(&self) -> &'static str {
        match self {
            EngineNotification::GameLoaded { .. } => "game.loaded",
            EngineNotification::GameCleared => "game.cleared",
            EngineNotification::ClockTick { .. } => "clock.tick",
            EngineNotification::ClockChanged { .. } => "clock.changed",
            EngineNotification::PeriodChanged { .. } => "period.changed",
            EngineNotification::PeriodExpired { .. } => "period.expired",
            EngineNotification::ScoreChanged { .. } => "score.changed",
            EngineNotification::ShotRecorded { .. } => "shot.recorded",
            EngineNotification::GoalAgainstRecorded { .. } => "goal_against.recorded",
            EngineNotification::EventRecorded { .. } => "event.recorded",
            EngineNotification::ActionUndone { .. } => "action.undone",
            EngineNotification::StatusChanged { .. } => "status.changed",
            EngineNotification::DataLoaded { .. } => "data.loaded",
        }
    }
}

/// Non-blocking indicator of unsynced work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Pending-change flags of the live session.
    pub pending: PendingChanges,
    /// Whether a sync pass is running.
    pub syncing: bool,
    /// Message of the last failed pass, cleared by the next successful one.
    pub last_error: Option<String>,
    /// Completion time of the last successful pass.
    pub last_synced_at: Option<SystemTime>,
}

impl SyncStatus {
    /// Whether anything awaits a sync.
    pub fn has_pending(&self) -> bool {
        self.pending.any()
    }
}
