//! Shapes of the documents written to the remote store.
//!
//! Entities carry the local identifier (`local_id`) so a session rebuilt from
//! the store keeps the identifiers the undo controller refers to. Timestamps
//! are stored as Unix milliseconds.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{TimestampMilliSeconds, serde_as};
use uuid::Uuid;

use crate::engine::model::{
    EventType, Game, GameEvent, GameStatus, GoalAgainst, RinkPosition, Shot, ShotResult, TeamSide,
};

/// Shot record persisted in the `shots` collection.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShotEntity {
    /// Identifier used by the tracker.
    pub local_id: Uuid,
    /// Owning game.
    pub game_id: String,
    /// Period in play.
    pub period: u8,
    /// Wall-clock time of the shot.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub timestamp: SystemTime,
    /// Normalized horizontal position.
    pub x: f64,
    /// Normalized vertical position.
    pub y: f64,
    /// Outcome.
    pub result: ShotResult,
    /// Shooting side.
    pub team_side: TeamSide,
}

/// Goal-against record persisted in the `goals_against` collection.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalAgainstEntity {
    /// Identifier used by the tracker.
    pub local_id: Uuid,
    /// Owning game.
    pub game_id: String,
    /// Period in play.
    pub period: u8,
    /// Wall-clock time of the goal.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub timestamp: SystemTime,
    /// Normalized horizontal position.
    pub x: f64,
    /// Normalized vertical position.
    pub y: f64,
    /// Optional explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Event record persisted in the `game_events` collection.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEventEntity {
    /// Identifier used by the tracker.
    pub local_id: Uuid,
    /// Owning game.
    pub game_id: String,
    /// Kind of event.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Period in play.
    pub period: u8,
    /// Engine clock value in seconds.
    pub game_time: u32,
    /// Wall-clock time of the event.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub timestamp: SystemTime,
    /// Free text.
    pub description: String,
    /// Structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Live fields pushed to the game document in a single update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameStateChanges {
    /// Period in play.
    pub current_period: u8,
    /// Home score.
    pub home_score: u32,
    /// Away score.
    pub away_score: u32,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Tracked side; omitted when unknown so the stored value is kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_side: Option<TeamSide>,
    /// Whether the timeout was used.
    pub timeout_used: bool,
}

impl From<&Shot> for ShotEntity {
    fn from(shot: &Shot) -> Self {
        Self {
            local_id: shot.id,
            game_id: shot.game_id.clone(),
            period: shot.period,
            timestamp: shot.timestamp,
            x: shot.position.x,
            y: shot.position.y,
            result: shot.result,
            team_side: shot.team_side,
        }
    }
}

impl ShotEntity {
    /// Rebuild a synced shot from its stored record.
    pub fn into_shot(self, remote_id: String) -> Shot {
        Shot {
            id: self.local_id,
            game_id: self.game_id,
            period: self.period,
            timestamp: self.timestamp,
            position: RinkPosition::new(self.x, self.y),
            result: self.result,
            team_side: self.team_side,
            synced: true,
            remote_id: Some(remote_id),
        }
    }
}

impl From<&GoalAgainst> for GoalAgainstEntity {
    fn from(goal: &GoalAgainst) -> Self {
        Self {
            local_id: goal.id,
            game_id: goal.game_id.clone(),
            period: goal.period,
            timestamp: goal.timestamp,
            x: goal.position.x,
            y: goal.position.y,
            reason: goal.reason.clone(),
        }
    }
}

impl GoalAgainstEntity {
    /// Rebuild a synced goal-against entry from its stored record.
    pub fn into_goal_against(self, remote_id: String) -> GoalAgainst {
        GoalAgainst {
            id: self.local_id,
            game_id: self.game_id,
            period: self.period,
            timestamp: self.timestamp,
            position: RinkPosition::new(self.x, self.y),
            reason: self.reason,
            synced: true,
            remote_id: Some(remote_id),
        }
    }
}

impl From<&GameEvent> for GameEventEntity {
    fn from(event: &GameEvent) -> Self {
        Self {
            local_id: event.id,
            game_id: event.game_id.clone(),
            event_type: event.event_type,
            period: event.period,
            game_time: event.game_time,
            timestamp: event.timestamp,
            description: event.description.clone(),
            payload: event.payload.clone(),
        }
    }
}

impl GameEventEntity {
    /// Rebuild a synced event from its stored record.
    pub fn into_event(self, remote_id: String) -> GameEvent {
        GameEvent {
            id: self.local_id,
            game_id: self.game_id,
            event_type: self.event_type,
            period: self.period,
            game_time: self.game_time,
            timestamp: self.timestamp,
            description: self.description,
            payload: self.payload,
            synced: true,
            remote_id: Some(remote_id),
        }
    }
}

impl From<&Game> for GameStateChanges {
    fn from(game: &Game) -> Self {
        Self {
            current_period: game.current_period,
            home_score: game.home_score,
            away_score: game.away_score,
            status: game.status,
            team_side: game.team_side,
            timeout_used: game.timeout_used,
        }
    }
}
