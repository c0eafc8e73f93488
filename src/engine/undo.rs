//! Single-level, time-windowed undo.
//!
//! Shots, goals against and faceoffs are undoable. Goals scored through the
//! score shortcuts attach their event to the pending action so undo can remove
//! it by id; without a link the most recent matching event within the match
//! tolerance is removed instead.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    ledger::SyncRecord,
    model::EventType,
    pending::SubStore,
    session::LiveSession,
};

/// Kind of action the undo controller can reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UndoableKind {
    /// A shot ledger entry.
    Shot,
    /// A goal-against ledger entry.
    GoalAgainst,
    /// A won faceoff event.
    FaceoffWin,
    /// A lost faceoff event.
    FaceoffLoss,
}

/// The most recent reversible action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastAction {
    /// What was done.
    pub kind: UndoableKind,
    /// Wall-clock time of the action.
    pub timestamp: SystemTime,
    /// Whether the action recorded a goal.
    #[serde(default)]
    pub was_goal: bool,
    /// Ledger entry created by the action.
    #[serde(default)]
    pub entry_id: Option<Uuid>,
    /// Event created alongside the action.
    #[serde(default)]
    pub linked_event_id: Option<Uuid>,
}

impl LastAction {
    pub(crate) fn new(
        kind: UndoableKind,
        timestamp: SystemTime,
        was_goal: bool,
        entry_id: Option<Uuid>,
        linked_event_id: Option<Uuid>,
    ) -> Self {
        Self {
            kind,
            timestamp,
            was_goal,
            entry_id,
            linked_event_id,
        }
    }

    /// Whether a goal shortcut of the given ledger kind may attach its event here.
    pub(crate) fn accepts_goal_link(&self, kind: UndoableKind) -> bool {
        self.kind == kind && self.was_goal && self.linked_event_id.is_none()
    }

    fn goal_event(&self) -> Option<EventType> {
        match self.kind {
            UndoableKind::Shot if self.was_goal => Some(EventType::GoalHome),
            UndoableKind::Shot => None,
            UndoableKind::GoalAgainst => Some(EventType::GoalAway),
            UndoableKind::FaceoffWin => Some(EventType::FaceoffWon),
            UndoableKind::FaceoffLoss => Some(EventType::FaceoffLost),
        }
    }
}

/// Timing rules of the undo controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoPolicy {
    /// How long after an action it may still be undone.
    pub window: Duration,
    /// Timestamp tolerance used when correlating unlinked events.
    pub match_tolerance: Duration,
}

impl Default for UndoPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30),
            match_tolerance: Duration::from_secs(1),
        }
    }
}

impl UndoPolicy {
    /// Whether `action` is still inside the window at `now`.
    pub fn allows(&self, action: &LastAction, now: SystemTime) -> bool {
        now.duration_since(action.timestamp)
            .map(|elapsed| elapsed <= self.window)
            .unwrap_or(true)
    }
}

/// What an undo removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoReport {
    /// Kind of the reversed action.
    pub kind: UndoableKind,
    /// Ledger entry removed, if any.
    pub removed_entry: Option<Uuid>,
    /// Event removed, if any.
    pub removed_event: Option<Uuid>,
    /// Whether a score was decremented.
    pub score_reverted: bool,
}

impl LiveSession {
    /// Whether the last action can be undone at `now`.
    pub fn can_undo(&self, policy: &UndoPolicy, now: SystemTime) -> bool {
        self.last_action
            .as_ref()
            .is_some_and(|action| policy.allows(action, now))
    }

    /// Reverse the last action. Returns `None`, leaving state untouched, when nothing can be undone.
    pub(crate) fn undo(&mut self, policy: &UndoPolicy, now: SystemTime) -> Option<UndoReport> {
        if !self.can_undo(policy, now) {
            return None;
        }
        let action = self.last_action.take()?;

        let removed_entry = match action.kind {
            UndoableKind::Shot => {
                let removed = match action.entry_id {
                    Some(id) => self.shots.remove(id),
                    None => self.shots.pop(),
                };
                removed.map(|shot| {
                    self.bury(SubStore::Shots, shot.remote_id().map(str::to_owned));
                    (shot.id, shot.timestamp)
                })
            }
            UndoableKind::GoalAgainst => {
                let removed = match action.entry_id {
                    Some(id) => self.goals_against.remove(id),
                    None => self.goals_against.pop(),
                };
                removed.map(|goal| {
                    self.bury(SubStore::GoalsAgainst, goal.remote_id().map(str::to_owned));
                    (goal.id, goal.timestamp)
                })
            }
            UndoableKind::FaceoffWin | UndoableKind::FaceoffLoss => None,
        };

        let score_reverted = match action.kind {
            UndoableKind::Shot if action.was_goal => {
                self.game.home_score = self.game.home_score.saturating_sub(1);
                self.touch_game();
                true
            }
            UndoableKind::GoalAgainst => {
                self.game.away_score = self.game.away_score.saturating_sub(1);
                self.touch_game();
                true
            }
            _ => false,
        };

        let reference = removed_entry.map_or(action.timestamp, |(_, timestamp)| timestamp);
        let removed_event = action
            .goal_event()
            .and_then(|event_type| self.remove_satellite(&action, event_type, reference, policy));

        debug!(
            game_id = %self.game.id,
            kind = ?action.kind,
            ?removed_entry,
            ?removed_event,
            score_reverted,
            "undid last action"
        );

        Some(UndoReport {
            kind: action.kind,
            removed_entry: removed_entry.map(|(id, _)| id),
            removed_event,
            score_reverted,
        })
    }

    fn remove_satellite(
        &mut self,
        action: &LastAction,
        event_type: EventType,
        reference: SystemTime,
        policy: &UndoPolicy,
    ) -> Option<Uuid> {
        let id = action
            .linked_event_id
            .filter(|id| self.events.ledger().get(*id).is_some())
            .or_else(|| {
                self.events
                    .find_recent_match(event_type, reference, policy.match_tolerance)
            })?;
        let event = self.events.remove(id)?;
        self.bury(SubStore::Events, event.remote_id().map(str::to_owned));
        Some(event.id)
    }
}
