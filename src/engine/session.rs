//! Local state of one live game and the synchronous mutations applied to it.
//!
//! Every method here runs under the engine lock and completes without I/O.
//! Mutations mark the pending flag of each sub-store they touch; nothing else
//! ever sets those flags.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use super::{
    clock::{ClockState, TickOutcome},
    error::Rejection,
    event_log::{EventLog, EventStamp},
    ledger::Ledger,
    model::{
        EventType, Game, GameEvent, GameStatus, GoalAgainst, NewGoalAgainst, NewShot, Shot,
        ShotResult, TeamSide,
    },
    pending::{PendingChanges, SubStore, Tombstone},
    period::{self, PeriodPlan, PeriodTransition},
    undo::{LastAction, UndoableKind},
};

/// Result of a manual clock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeAdjustment {
    /// Game time after the adjustment.
    pub game_time: u32,
    /// Logged events whose game time is now ahead of the clock.
    pub events_ahead: usize,
}

/// Everything the engine owns for one live game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSession {
    pub(crate) game: Game,
    pub(crate) clock: ClockState,
    pub(crate) shots: Ledger<Shot>,
    pub(crate) goals_against: Ledger<GoalAgainst>,
    pub(crate) events: EventLog,
    pub(crate) pending: PendingChanges,
    pub(crate) last_action: Option<LastAction>,
    #[serde(default)]
    pub(crate) tombstones: Vec<Tombstone>,
    /// Bumped on every game-state mutation so a sync can tell whether it pushed the latest one.
    #[serde(default)]
    pub(crate) game_version: u64,
}

impl LiveSession {
    /// Open a live session for `game`, recording the game start.
    pub(crate) fn start(mut game: Game, now: SystemTime) -> Result<Self, Rejection> {
        if game.status == GameStatus::Archived {
            return Err(Rejection::GameArchived(game.id));
        }
        game.status = GameStatus::Live;
        if !game.schedule.contains(game.current_period) {
            game.current_period = 1;
        }

        let mut session = Self::loaded(game, Vec::new(), Vec::new(), Vec::new());
        session.touch_game();
        session.record_event(EventType::GameStart, "Game started", None, now);
        Ok(session)
    }

    /// Rebuild a session from records already present in the remote store.
    pub(crate) fn loaded(
        game: Game,
        shots: Vec<Shot>,
        goals_against: Vec<GoalAgainst>,
        events: Vec<GameEvent>,
    ) -> Self {
        let events = EventLog::from_events(events);
        let clock = ClockState {
            game_time: events.latest_game_time().unwrap_or_default(),
            ..ClockState::default()
        };

        Self {
            game,
            clock,
            shots: Ledger::from_entries(shots),
            goals_against: Ledger::from_entries(goals_against),
            events,
            pending: PendingChanges::default(),
            last_action: None,
            tombstones: Vec::new(),
            game_version: 0,
        }
    }

    /// Current game.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Current clock.
    pub fn clock(&self) -> &ClockState {
        &self.clock
    }

    /// Shot ledger.
    pub fn shots(&self) -> &Ledger<Shot> {
        &self.shots
    }

    /// Goal-against ledger.
    pub fn goals_against(&self) -> &Ledger<GoalAgainst> {
        &self.goals_against
    }

    /// Event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Pending-change flags.
    pub fn pending(&self) -> PendingChanges {
        self.pending
    }

    /// The action undo would reverse, if any.
    pub fn last_action(&self) -> Option<&LastAction> {
        self.last_action.as_ref()
    }

    /// Remote deletions still to be pushed.
    pub fn tombstones(&self) -> &[Tombstone] {
        &self.tombstones
    }

    pub(crate) fn touch_game(&mut self) {
        self.game_version = self.game_version.wrapping_add(1);
        self.pending.mark(SubStore::GameState);
    }

    pub(crate) fn bury(&mut self, store: SubStore, remote_id: Option<String>) {
        if let Some(remote_id) = remote_id {
            self.tombstones.push(Tombstone { store, remote_id });
        }
        self.pending.mark(store);
    }

    /// Append an event to the log.
    pub(crate) fn record_event(
        &mut self,
        event_type: EventType,
        description: impl Into<String>,
        payload: Option<Value>,
        now: SystemTime,
    ) -> GameEvent {
        let stamp = EventStamp {
            game_id: &self.game.id,
            period: self.game.current_period,
            game_time: self.clock.game_time,
            timestamp: now,
        };
        let event = self
            .events
            .record(stamp, event_type, description, payload)
            .clone();
        self.pending.mark(SubStore::Events);
        event
    }

    pub(crate) fn tick(&mut self) -> TickOutcome {
        let schedule = self.game.schedule;
        self.clock.tick(&schedule, self.game.current_period)
    }

    pub(crate) fn adjust_time(&mut self, delta: i64) -> TimeAdjustment {
        self.last_action = None;
        let game_time = self.clock.adjust(delta);
        self.time_adjusted(game_time)
    }

    pub(crate) fn set_time(&mut self, seconds: i64) -> TimeAdjustment {
        self.last_action = None;
        let game_time = self.clock.set(seconds);
        self.time_adjusted(game_time)
    }

    fn time_adjusted(&self, game_time: u32) -> TimeAdjustment {
        let events_ahead = self.events.events_after(game_time);
        if events_ahead > 0 {
            warn!(
                game_id = %self.game.id,
                game_time,
                events_ahead,
                "clock moved behind already logged events"
            );
        }
        TimeAdjustment {
            game_time,
            events_ahead,
        }
    }

    pub(crate) fn update_status(&mut self, status: GameStatus) -> Result<(), Rejection> {
        if !self.game.status.can_advance_to(status) {
            return Err(Rejection::StatusRegression {
                from: self.game.status,
                to: status,
            });
        }
        self.game.status = status;
        self.touch_game();
        Ok(())
    }

    pub(crate) fn start_period(
        &mut self,
        requested: u8,
        now: SystemTime,
    ) -> Result<PeriodPlan, Rejection> {
        let plan = period::plan(&self.game, &self.clock, PeriodTransition::Start(requested))?;

        if let Some(game_time) = plan.align_game_time {
            self.clock.set(i64::from(game_time));
        }
        self.game.current_period = plan.to;
        self.touch_game();

        let description = if self.game.schedule.is_overtime(plan.to) {
            "Overtime started".to_owned()
        } else {
            format!("Period {} started", plan.to)
        };
        self.record_event(
            EventType::PeriodStart,
            description,
            Some(json!({ "period": plan.to })),
            now,
        );
        self.last_action = None;
        Ok(plan)
    }

    pub(crate) fn end_period(&mut self, now: SystemTime) -> Result<PeriodPlan, Rejection> {
        let plan = period::plan(&self.game, &self.clock, PeriodTransition::End)?;

        self.clock.stop();
        let description = if self.game.schedule.is_overtime(plan.from) {
            "Overtime ended".to_owned()
        } else {
            format!("Period {} ended", plan.from)
        };
        self.record_event(
            EventType::PeriodEnd,
            description,
            Some(json!({ "period": plan.from })),
            now,
        );
        self.last_action = None;
        Ok(plan)
    }

    pub(crate) fn add_shot(&mut self, input: NewShot, now: SystemTime) -> Shot {
        let team_side = input
            .team_side
            .or(self.game.team_side)
            .unwrap_or(TeamSide::Home);
        let shot = self
            .shots
            .append(Shot {
                id: Uuid::new_v4(),
                game_id: self.game.id.clone(),
                period: self.game.current_period,
                timestamp: now,
                position: input.position,
                result: input.result,
                team_side,
                synced: false,
                remote_id: None,
            })
            .clone();
        self.pending.mark(SubStore::Shots);
        self.last_action = Some(LastAction::new(
            UndoableKind::Shot,
            now,
            shot.result == ShotResult::Goal,
            Some(shot.id),
            None,
        ));
        shot
    }

    pub(crate) fn add_goal_against(&mut self, input: NewGoalAgainst, now: SystemTime) -> GoalAgainst {
        let goal = self
            .goals_against
            .append(GoalAgainst {
                id: Uuid::new_v4(),
                game_id: self.game.id.clone(),
                period: self.game.current_period,
                timestamp: now,
                position: input.position,
                reason: input.reason,
                synced: false,
                remote_id: None,
            })
            .clone();
        self.pending.mark(SubStore::GoalsAgainst);
        self.last_action = Some(LastAction::new(
            UndoableKind::GoalAgainst,
            now,
            true,
            Some(goal.id),
            None,
        ));
        goal
    }

    /// Increment a score, log the goal and stop play.
    pub(crate) fn add_goal(&mut self, side: TeamSide, now: SystemTime) -> GameEvent {
        let (event_type, description, linkable) = match side {
            TeamSide::Home => {
                self.game.home_score = self.game.home_score.saturating_add(1);
                (EventType::GoalHome, "Goal for the home team", UndoableKind::Shot)
            }
            TeamSide::Away => {
                self.game.away_score = self.game.away_score.saturating_add(1);
                (
                    EventType::GoalAway,
                    "Goal for the away team",
                    UndoableKind::GoalAgainst,
                )
            }
        };
        self.touch_game();
        self.clock.pause();

        let payload = json!({
            "home_score": self.game.home_score,
            "away_score": self.game.away_score,
        });
        let event = self.record_event(event_type, description, Some(payload), now);

        let linked = match self.last_action.as_mut() {
            Some(action) if action.accepts_goal_link(linkable) => {
                action.linked_event_id = Some(event.id);
                true
            }
            _ => false,
        };
        if !linked {
            self.last_action = None;
        }
        event
    }

    pub(crate) fn add_faceoff(&mut self, won: bool, now: SystemTime) -> GameEvent {
        let (event_type, description, kind) = if won {
            (EventType::FaceoffWon, "Faceoff won", UndoableKind::FaceoffWin)
        } else {
            (EventType::FaceoffLost, "Faceoff lost", UndoableKind::FaceoffLoss)
        };
        let event = self.record_event(event_type, description, None, now);
        self.last_action = Some(LastAction::new(kind, now, false, None, Some(event.id)));
        event
    }

    pub(crate) fn use_timeout(&mut self, now: SystemTime) -> Result<GameEvent, Rejection> {
        if self.game.timeout_used {
            return Err(Rejection::TimeoutAlreadyUsed);
        }
        self.game.timeout_used = true;
        self.touch_game();
        self.clock.pause();
        let event = self.record_event(EventType::Timeout, "Timeout called", None, now);
        self.last_action = None;
        Ok(event)
    }

    /// Close the game: stop the clock, log the end and archive it.
    ///
    /// A game whose end is already logged only has its clock stopped again.
    pub(crate) fn finish(&mut self, now: SystemTime) {
        self.clock.stop();
        self.last_action = None;
        if self.events.count(EventType::GameEnd) > 0 {
            return;
        }
        let payload = json!({
            "home_score": self.game.home_score,
            "away_score": self.game.away_score,
        });
        self.record_event(EventType::GameEnd, "Game ended", Some(payload), now);
        if self.game.status.can_advance_to(GameStatus::Archived) {
            self.game.status = GameStatus::Archived;
            self.touch_game();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine::{
        clock::ClockPhase,
        model::{GameSchedule, RinkPosition},
    };

    fn session() -> LiveSession {
        let game = Game::new(
            "game-1",
            "Sharks",
            "Bears",
            GameSchedule {
                periods: 3,
                period_minutes: 20,
                has_overtime: true,
            },
        );
        LiveSession::start(game, SystemTime::now()).unwrap()
    }

    fn shot(result: ShotResult) -> NewShot {
        NewShot {
            position: RinkPosition::new(0.3, 0.6),
            result,
            team_side: None,
        }
    }

    #[test]
    fn starting_a_session_makes_the_game_live_and_logs_it() {
        let session = session();
        assert_eq!(session.game().status, GameStatus::Live);
        assert_eq!(session.events().count(EventType::GameStart), 1);
        assert!(session.pending().events);
        assert!(session.pending().game_state);
    }

    #[test]
    fn archived_games_cannot_be_started() {
        let mut game = session().game;
        game.status = GameStatus::Archived;
        assert_eq!(
            LiveSession::start(game, SystemTime::now()).unwrap_err(),
            Rejection::GameArchived("game-1".into())
        );
    }

    #[test]
    fn shots_default_to_the_game_team_side() {
        let mut session = session();
        session.game.team_side = Some(TeamSide::Away);
        let recorded = session.add_shot(shot(ShotResult::Save), SystemTime::now());
        assert_eq!(recorded.team_side, TeamSide::Away);
        assert!(!recorded.synced);
        assert!(session.pending().shots);
    }

    #[test]
    fn goals_stop_play_and_link_to_the_scoring_shot() {
        let mut session = session();
        session.clock.start(SystemTime::now());
        let now = SystemTime::now();

        session.add_shot(shot(ShotResult::Goal), now);
        let event = session.add_goal(TeamSide::Home, now);

        assert_eq!(session.game().home_score, 1);
        assert_eq!(session.clock().phase(), ClockPhase::Paused);
        let action = session.last_action().unwrap();
        assert_eq!(action.linked_event_id, Some(event.id));
    }

    #[test]
    fn unrelated_goals_clear_the_last_action() {
        let mut session = session();
        let now = SystemTime::now();
        session.add_shot(shot(ShotResult::Save), now);
        session.add_goal(TeamSide::Home, now);
        assert!(session.last_action().is_none());
    }

    #[test]
    fn finishing_twice_logs_a_single_game_end() {
        let mut session = session();
        let now = SystemTime::now();
        session.update_status(GameStatus::Archived).unwrap();
        session.finish(now);
        session.finish(now);
        assert_eq!(session.game().status, GameStatus::Archived);
        assert_eq!(session.events().count(EventType::GameEnd), 1);
    }

    #[test]
    fn moving_the_clock_by_hand_drops_the_undo() {
        let mut session = session();
        session.add_shot(shot(ShotResult::Save), SystemTime::now());
        session.adjust_time(-5);
        assert!(session.last_action().is_none());

        session.add_shot(shot(ShotResult::Miss), SystemTime::now());
        session.set_time(90);
        assert!(session.last_action().is_none());
    }

    #[test]
    fn goal_against_marks_only_its_own_ledger() {
        let mut session = session();
        session.pending = PendingChanges::default();

        session.add_goal_against(
            NewGoalAgainst {
                position: RinkPosition::new(0.9, 0.5),
                reason: Some("screened".into()),
            },
            SystemTime::now(),
        );

        let pending = session.pending();
        assert!(pending.goals_against);
        assert!(!pending.shots);
        assert!(!pending.events);
        assert!(!pending.game_state);
    }

    #[test]
    fn timeout_can_only_be_used_once() {
        let mut session = session();
        session.clock.start(SystemTime::now());
        assert!(session.use_timeout(SystemTime::now()).is_ok());
        assert!(session.game().timeout_used);
        assert_eq!(session.clock().phase(), ClockPhase::Paused);
        assert_eq!(
            session.use_timeout(SystemTime::now()).unwrap_err(),
            Rejection::TimeoutAlreadyUsed
        );
    }

    #[test]
    fn status_changes_are_monotonic() {
        let mut session = session();
        assert!(session.update_status(GameStatus::Planned).is_err());
        assert!(session.update_status(GameStatus::Archived).is_ok());
        assert!(session.update_status(GameStatus::Live).is_err());
    }

    #[test]
    fn rewinding_the_clock_reports_events_ahead_of_it() {
        let mut session = session();
        session.set_time(300);
        session.add_faceoff(true, SystemTime::now());
        let adjustment = session.adjust_time(-120);
        assert_eq!(adjustment.game_time, 180);
        assert_eq!(adjustment.events_ahead, 1);
    }

    #[test]
    fn finishing_archives_and_logs_the_final_score() {
        let mut session = session();
        let now = SystemTime::now() + Duration::from_secs(5);
        session.add_goal(TeamSide::Away, now);
        session.finish(now);

        assert_eq!(session.game().status, GameStatus::Archived);
        let end = session.events().events().last().unwrap();
        assert_eq!(end.event_type, EventType::GameEnd);
        assert_eq!(end.payload.as_ref().unwrap()["away_score"], 1);
    }

    #[test]
    fn period_events_carry_the_period_number() {
        let mut session = session();
        session.end_period(SystemTime::now()).unwrap();
        session.start_period(4, SystemTime::now()).unwrap();

        let start = session.events().events().last().unwrap();
        assert_eq!(start.event_type, EventType::PeriodStart);
        assert_eq!(start.description, "Overtime started");
        assert_eq!(start.period, 4);
        assert_eq!(session.clock().game_time, 3600);
    }
}
