//! Refusals of engine operations and failures of a sync pass.

use thiserror::Error;

use super::{model::GameStatus, pending::SubStore, period::InvalidPeriodTransition};
use crate::dao::storage::StorageError;

/// Reason an engine operation was refused. Refusals never alter state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// No live game is loaded.
    #[error("no live game is active")]
    NoActiveGame,
    /// `start_tracking` while the clock already tracks.
    #[error("the clock is already tracking")]
    ClockAlreadyTracking,
    /// Pause/resume without a matching clock phase.
    #[error("the clock is not in a state that allows this operation")]
    ClockStateMismatch,
    /// Invalid period transition.
    #[error(transparent)]
    Period(#[from] InvalidPeriodTransition),
    /// Attempt to move the game status backwards or sideways.
    #[error("game status cannot move from {from} to {to}")]
    StatusRegression {
        /// Current status.
        from: GameStatus,
        /// Requested status.
        to: GameStatus,
    },
    /// An archived game cannot be tracked again.
    #[error("game `{0}` is archived")]
    GameArchived(String),
    /// The single team timeout was already consumed.
    #[error("the timeout has already been used")]
    TimeoutAlreadyUsed,
    /// Bulk loading would discard local changes not yet pushed.
    #[error("local changes have not been synced yet")]
    UnsyncedChanges,
}

impl Rejection {
    /// Stable machine-readable name of the refusal.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::NoActiveGame => "no_active_game",
            Rejection::ClockAlreadyTracking => "clock_already_tracking",
            Rejection::ClockStateMismatch => "clock_state_mismatch",
            Rejection::Period(_) => "invalid_period_transition",
            Rejection::StatusRegression { .. } => "status_regression",
            Rejection::GameArchived(_) => "game_archived",
            Rejection::TimeoutAlreadyUsed => "timeout_already_used",
            Rejection::UnsyncedChanges => "unsynced_changes",
        }
    }
}

/// Failure of a sync pass. Pending flags are left set for the next checkpoint.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No remote store is installed (degraded mode).
    #[error("remote store unavailable")]
    Unavailable,
    /// A push to the remote store failed.
    #[error("failed to push {store:?} changes")]
    Push {
        /// Sub-store being flushed when the failure happened.
        store: SubStore,
        /// Underlying storage failure.
        #[source]
        source: StorageError,
    },
    /// Loading data from the remote store failed.
    #[error("failed to load game data")]
    Load(#[source] StorageError),
    /// Loading was refused by the engine.
    #[error(transparent)]
    Rejected(#[from] Rejection),
}
