//! Append-only log of game events, stamped with period and game time.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{
    ledger::Ledger,
    model::{EventType, GameEvent},
};

/// Append-only, time-ordered log of game events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Ledger<GameEvent>,
}

/// Clock and identity context an event is stamped with.
#[derive(Debug, Clone, Copy)]
pub struct EventStamp<'a> {
    /// Game the event belongs to.
    pub game_id: &'a str,
    /// Period in play.
    pub period: u8,
    /// Engine clock value.
    pub game_time: u32,
    /// Wall-clock time.
    pub timestamp: SystemTime,
}

impl EventLog {
    /// Build a log from already-known events.
    pub fn from_events(events: Vec<GameEvent>) -> Self {
        Self {
            events: Ledger::from_entries(events),
        }
    }

    /// Append a new unsynced event stamped with `stamp`.
    pub fn record(
        &mut self,
        stamp: EventStamp<'_>,
        event_type: EventType,
        description: impl Into<String>,
        payload: Option<Value>,
    ) -> &GameEvent {
        self.events.append(GameEvent {
            id: Uuid::new_v4(),
            game_id: stamp.game_id.to_owned(),
            event_type,
            period: stamp.period,
            game_time: stamp.game_time,
            timestamp: stamp.timestamp,
            description: description.into(),
            payload,
            synced: false,
            remote_id: None,
        })
    }

    /// Underlying ledger.
    pub fn ledger(&self) -> &Ledger<GameEvent> {
        &self.events
    }

    /// Mutable access for sync bookkeeping.
    pub(crate) fn ledger_mut(&mut self) -> &mut Ledger<GameEvent> {
        &mut self.events
    }

    /// All events in insertion order.
    pub fn events(&self) -> &[GameEvent] {
        self.events.entries()
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove an event by id.
    pub fn remove(&mut self, id: Uuid) -> Option<GameEvent> {
        self.events.remove(id)
    }

    /// Most recent event of `event_type` whose timestamp lies within `tolerance` of `reference`.
    pub fn find_recent_match(
        &self,
        event_type: EventType,
        reference: SystemTime,
        tolerance: Duration,
    ) -> Option<Uuid> {
        self.events
            .entries()
            .iter()
            .rev()
            .filter(|event| event.event_type == event_type)
            .find(|event| time_distance(event.timestamp, reference) <= tolerance)
            .map(|event| event.id)
    }

    /// Number of events logged at a game time later than `game_time`.
    pub fn events_after(&self, game_time: u32) -> usize {
        self.events
            .entries()
            .iter()
            .filter(|event| event.game_time > game_time)
            .count()
    }

    /// Largest game time present in the log.
    pub fn latest_game_time(&self) -> Option<u32> {
        self.events.entries().iter().map(|event| event.game_time).max()
    }

    /// Count events of one type.
    pub fn count(&self, event_type: EventType) -> usize {
        self.events
            .entries()
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }
}

fn time_distance(a: SystemTime, b: SystemTime) -> Duration {
    a.duration_since(b)
        .or_else(|_| b.duration_since(a))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(timestamp: SystemTime, game_time: u32) -> EventStamp<'static> {
        EventStamp {
            game_id: "game-1",
            period: 1,
            game_time,
            timestamp,
        }
    }

    #[test]
    fn matching_picks_the_most_recent_event_inside_the_window() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut log = EventLog::default();
        let older = log
            .record(stamp(base, 10), EventType::GoalHome, "goal", None)
            .id;
        log.record(
            stamp(base + Duration::from_millis(200), 10),
            EventType::FaceoffWon,
            "faceoff",
            None,
        );
        let newer = log
            .record(
                stamp(base + Duration::from_millis(400), 10),
                EventType::GoalHome,
                "goal",
                None,
            )
            .id;

        let tolerance = Duration::from_secs(1);
        assert_eq!(
            log.find_recent_match(EventType::GoalHome, base, tolerance),
            Some(newer)
        );
        log.remove(newer);
        assert_eq!(
            log.find_recent_match(EventType::GoalHome, base, tolerance),
            Some(older)
        );
    }

    #[test]
    fn events_outside_the_tolerance_are_not_matched() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut log = EventLog::default();
        log.record(stamp(base, 0), EventType::FaceoffLost, "faceoff", None);

        let later = base + Duration::from_millis(1_500);
        assert_eq!(
            log.find_recent_match(EventType::FaceoffLost, later, Duration::from_secs(1)),
            None
        );
        assert_eq!(
            log.find_recent_match(EventType::FaceoffWon, base, Duration::from_secs(1)),
            None
        );
    }

    #[test]
    fn events_after_counts_entries_ahead_of_the_clock() {
        let now = SystemTime::now();
        let mut log = EventLog::default();
        log.record(stamp(now, 30), EventType::PeriodStart, "start", None);
        log.record(stamp(now, 90), EventType::Timeout, "timeout", None);
        log.record(stamp(now, 120), EventType::Penalty, "penalty", None);

        assert_eq!(log.events_after(60), 2);
        assert_eq!(log.events_after(120), 0);
        assert_eq!(log.latest_game_time(), Some(120));
    }
}
