//! Live-game tracking engine.
//!
//! [`LiveGameEngine`] owns the session of the game being tracked. Every
//! operation mutates local state synchronously under a single lock and returns
//! without touching the network; the remote store is only reached through
//! [`LiveGameEngine::sync`], which the engine itself calls at the end of the
//! first period and when the game ends.

pub mod clock;
pub mod error;
pub mod event_log;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod pending;
pub mod period;
pub mod session;
pub mod snapshot;
pub mod sync;
pub mod undo;
pub mod wall_clock;

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::{
    runtime::Handle,
    sync::{broadcast, watch},
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, info, warn};

use crate::dao::{
    local_cache::{CacheError, LocalCache},
    models::{GameEventEntity, GoalAgainstEntity, ShotEntity},
    remote_store::{RemoteCollection, RemoteRecord, RemoteStore},
};

pub use self::{
    clock::{ClockPhase, ClockState, TickOutcome},
    error::{Rejection, SyncError},
    model::{
        EventType, Game, GameEvent, GameSchedule, GameStatus, GoalAgainst, NewGoalAgainst,
        NewShot, RinkPosition, Shot, ShotResult, TeamSide,
    },
    notify::{EngineNotification, SyncStatus},
    pending::{PendingChanges, SubStore},
    period::PeriodPlan,
    session::{LiveSession, TimeAdjustment},
    snapshot::EngineSnapshot,
    sync::SyncReport,
    undo::{UndoPolicy, UndoReport},
    wall_clock::{ManualWallClock, SystemWallClock, WallClock},
};
use self::{clock::TimerSlot, sync::push_batch};

/// Tunables of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingSettings {
    /// Interval between clock ticks. One tick adds one second of game time.
    pub tick_interval: Duration,
    /// Undo window and event matching tolerance.
    pub undo: UndoPolicy,
    /// Capacity of the notification channel.
    pub notification_capacity: usize,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            undo: UndoPolicy::default(),
            notification_capacity: 64,
        }
    }
}

#[derive(Default)]
struct Inner {
    session: Option<LiveSession>,
    timer: TimerSlot,
}

impl Inner {
    fn live(&mut self) -> Result<&mut LiveSession, Rejection> {
        self.session.as_mut().ok_or(Rejection::NoActiveGame)
    }
}

/// The tracking engine shared by every caller of the live game.
pub struct LiveGameEngine {
    me: Weak<LiveGameEngine>,
    inner: Mutex<Inner>,
    store: RwLock<Option<Arc<dyn RemoteStore>>>,
    cache: Option<LocalCache>,
    wall_clock: Arc<dyn WallClock>,
    notifications: broadcast::Sender<EngineNotification>,
    sync_status: watch::Sender<SyncStatus>,
    is_syncing: AtomicBool,
    settings: TrackingSettings,
}

/// Resets the re-entrancy flag when a sync pass ends, however it ends.
struct SyncPassGuard<'a> {
    engine: &'a LiveGameEngine,
}

impl Drop for SyncPassGuard<'_> {
    fn drop(&mut self) {
        self.engine.is_syncing.store(false, Ordering::Release);
        self.engine
            .sync_status
            .send_modify(|status| status.syncing = false);
    }
}

impl LiveGameEngine {
    /// Engine on the system clock without a local cache.
    pub fn new(settings: TrackingSettings) -> Arc<Self> {
        Self::with_parts(settings, Arc::new(SystemWallClock), None)
    }

    /// Engine with an explicit wall clock and optional snapshot cache.
    pub fn with_parts(
        settings: TrackingSettings,
        wall_clock: Arc<dyn WallClock>,
        cache: Option<LocalCache>,
    ) -> Arc<Self> {
        let (notifications, _) = broadcast::channel(settings.notification_capacity.max(1));
        let (sync_status, _) = watch::channel(SyncStatus::default());
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            inner: Mutex::new(Inner::default()),
            store: RwLock::new(None),
            cache,
            wall_clock,
            notifications,
            sync_status,
            is_syncing: AtomicBool::new(false),
            settings,
        })
    }

    /// Engine settings.
    pub fn settings(&self) -> &TrackingSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notification: EngineNotification) {
        let _ = self.notifications.send(notification);
    }

    /// Mirror the session to the cache and refresh the pending indicator.
    fn commit(&self, session: Option<&LiveSession>) {
        if let Some(cache) = &self.cache {
            let result = match session {
                Some(session) => {
                    cache.store(&EngineSnapshot::capture(session, self.wall_clock.now()))
                }
                None => cache.clear(),
            };
            if let Err(err) = result {
                warn!(error = %err, "failed to update the live game cache");
            }
        }
        let pending = session.map(LiveSession::pending).unwrap_or_default();
        self.sync_status.send_if_modified(|status| {
            let changed = status.pending != pending;
            status.pending = pending;
            changed
        });
    }

    /// Run `op` against the live session, committing only if it succeeds.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Inner, std::time::SystemTime) -> Result<T, Rejection>,
    ) -> Result<T, Rejection> {
        let now = self.wall_clock.now();
        let mut guard = self.lock();
        let value = op(&mut guard, now)?;
        self.commit(guard.session.as_ref());
        Ok(value)
    }

    /// Install the remote store used by sync and bulk loads.
    pub fn install_store(&self, store: Arc<dyn RemoteStore>) {
        let mut slot = self.store.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(store);
    }

    /// Drop the remote store; syncs fail with [`SyncError::Unavailable`] until a new one is installed.
    pub fn clear_store(&self) {
        let mut slot = self.store.write().unwrap_or_else(PoisonError::into_inner);
        slot.take();
    }

    /// Currently installed store.
    pub fn store(&self) -> Option<Arc<dyn RemoteStore>> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receive change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineNotification> {
        self.notifications.subscribe()
    }

    /// Watch the sync indicator.
    pub fn sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.sync_status.subscribe()
    }

    /// Copy of the live session, if any.
    pub fn session(&self) -> Option<LiveSession> {
        self.lock().session.clone()
    }

    /// Whether the clock task is armed.
    pub fn timer_armed(&self) -> bool {
        self.lock().timer.is_armed()
    }

    /// Serializable copy of the live session.
    pub fn snapshot(&self) -> Option<EngineSnapshot> {
        let guard = self.lock();
        guard
            .session
            .as_ref()
            .map(|session| EngineSnapshot::capture(session, self.wall_clock.now()))
    }

    /// Replace the live session with `snapshot`. The clock comes back stopped.
    pub fn restore(&self, snapshot: EngineSnapshot) -> bool {
        if !snapshot.is_supported() {
            warn!(format = snapshot.format, "ignoring snapshot with unknown format");
            return false;
        }
        let session = snapshot.into_session();
        let game_id = session.game().id.clone();
        {
            let mut guard = self.lock();
            guard.timer.cancel();
            guard.session = Some(session);
            self.commit(guard.session.as_ref());
        }
        info!(%game_id, "restored live game from snapshot");
        self.notify(EngineNotification::GameLoaded { game_id });
        true
    }

    /// Resume the session mirrored in the local cache, if there is one.
    pub fn restore_from_cache(&self) -> Result<bool, CacheError> {
        let Some(cache) = &self.cache else {
            return Ok(false);
        };
        match cache.load::<EngineSnapshot>()? {
            Some(snapshot) => Ok(self.restore(snapshot)),
            None => Ok(false),
        }
    }

    // ---- lifecycle ----

    /// Start tracking `game`.
    ///
    /// Re-initializing the game already being tracked keeps its session. Another game is
    /// only accepted once the current one has nothing left to sync.
    pub fn initialize_live_game(&self, game: Game) -> Result<(), Rejection> {
        let game_id = game.id.clone();
        self.mutate(|inner, now| {
            if let Some(current) = &inner.session {
                if current.game().id == game.id {
                    return Ok(());
                }
                if current.pending().any() {
                    return Err(Rejection::UnsyncedChanges);
                }
            }
            let session = LiveSession::start(game, now)?;
            inner.timer.cancel();
            inner.session = Some(session);
            Ok(())
        })?;
        info!(%game_id, "live game initialized");
        self.notify(EngineNotification::GameLoaded { game_id });
        Ok(())
    }

    /// Move the game status forward.
    pub fn update_game_status(&self, status: GameStatus) -> Result<(), Rejection> {
        self.mutate(|inner, _| inner.live()?.update_status(status))?;
        self.notify(EngineNotification::StatusChanged { status });
        Ok(())
    }

    /// Archive the game: stop the clock, log the end, flush, then drop local state.
    ///
    /// The flush runs on its own task, so dropping this future (a client hanging up)
    /// does not leave an archived session behind. Calling it again while a flush is
    /// in flight waits for that flush and logs nothing new.
    pub async fn end_game(&self) -> Result<(), Rejection> {
        let game_id = self.mutate(|inner, now| {
            inner.timer.cancel();
            let session = inner.live()?;
            session.finish(now);
            Ok(session.game().id.clone())
        })?;
        self.notify(EngineNotification::StatusChanged {
            status: GameStatus::Archived,
        });

        let Some(engine) = self.me.upgrade() else {
            return Ok(());
        };
        let flush = tokio::spawn(async move { engine.flush_and_clear(game_id).await });
        if let Err(err) = flush.await {
            warn!(error = %err, "end-of-game flush task failed");
        }
        Ok(())
    }

    async fn flush_and_clear(&self, game_id: String) {
        if let Err(err) = self.sync_exclusive().await {
            warn!(%game_id, error = %err, "final sync failed; archiving anyway");
        }
        self.push_archival(&game_id).await;

        {
            let mut guard = self.lock();
            let current = guard
                .session
                .as_ref()
                .is_some_and(|session| session.game().id == game_id);
            if !current {
                return;
            }
            guard.timer.cancel();
            guard.session = None;
            self.commit(None);
        }
        info!(%game_id, "live game ended");
        self.notify(EngineNotification::GameCleared);
    }

    /// Best-effort status update when the regular sync could not deliver it.
    async fn push_archival(&self, game_id: &str) {
        let still_pending = self
            .lock()
            .session
            .as_ref()
            .is_some_and(|session| session.pending().game_state);
        if !still_pending {
            return;
        }
        let Some(store) = self.store() else {
            warn!(%game_id, "no remote store to archive the game");
            return;
        };
        let changes = json!({ "status": GameStatus::Archived });
        if let Err(err) = store
            .update(RemoteCollection::Games, game_id.to_owned(), changes)
            .await
        {
            warn!(%game_id, error = %err, "failed to push game archival");
        }
    }

    /// Drop the live session and its cached copy, discarding anything unsynced.
    pub fn clear_game_data(&self) -> bool {
        let cleared = {
            let mut guard = self.lock();
            guard.timer.cancel();
            let cleared = guard.session.take();
            self.commit(None);
            cleared
        };
        let Some(session) = cleared else {
            return false;
        };
        if session.pending().any() {
            warn!(game_id = %session.game().id, "discarding unsynced live game data");
        }
        self.notify(EngineNotification::GameCleared);
        true
    }

    /// Replace local data with the records stored remotely for `game`.
    pub async fn load_game_data(&self, game: Game) -> Result<usize, SyncError> {
        self.ensure_nothing_pending()?;
        let store = self.store().ok_or(SyncError::Unavailable)?;

        let key = Value::from(game.id.clone());
        let (shots, goals_against, events) = futures::try_join!(
            store.query_by_field(RemoteCollection::Shots, "game_id", key.clone()),
            store.query_by_field(RemoteCollection::GoalsAgainst, "game_id", key.clone()),
            store.query_by_field(RemoteCollection::GameEvents, "game_id", key),
        )
        .map_err(SyncError::Load)?;

        let mut shots = decode_all(RemoteCollection::Shots, shots, ShotEntity::into_shot);
        let mut goals_against = decode_all(
            RemoteCollection::GoalsAgainst,
            goals_against,
            GoalAgainstEntity::into_goal_against,
        );
        let mut events = decode_all(RemoteCollection::GameEvents, events, GameEventEntity::into_event);
        shots.sort_by_key(|shot| shot.timestamp);
        goals_against.sort_by_key(|goal| goal.timestamp);
        events.sort_by_key(|event| event.timestamp);

        let records = shots.len() + goals_against.len() + events.len();
        let game_id = game.id.clone();
        self.mutate(|inner, _| {
            if inner
                .session
                .as_ref()
                .is_some_and(|session| session.pending().any())
            {
                return Err(Rejection::UnsyncedChanges);
            }
            inner.timer.cancel();
            inner.session = Some(LiveSession::loaded(game, shots, goals_against, events));
            Ok(())
        })?;

        info!(%game_id, records, "loaded game data from remote store");
        self.notify(EngineNotification::GameLoaded { game_id });
        self.notify(EngineNotification::DataLoaded { records });
        Ok(records)
    }

    fn ensure_nothing_pending(&self) -> Result<(), Rejection> {
        let guard = self.lock();
        match &guard.session {
            Some(session) if session.pending().any() => Err(Rejection::UnsyncedChanges),
            _ => Ok(()),
        }
    }

    // ---- clock ----

    /// Start the clock from idle and arm the one-second task.
    ///
    /// Like every clock control, a successful call ends the undo window.
    pub fn start_tracking(&self) -> bool {
        let started = self.mutate(|inner, now| {
            let session = inner.live()?;
            if !session.clock.start(now) {
                return Err(Rejection::ClockAlreadyTracking);
            }
            session.last_action = None;
            let game_time = session.clock().game_time;
            let generation = inner.timer.rearm();
            if let Ok(runtime) = Handle::try_current() {
                let task = runtime.spawn(run_timer(
                    self.me.clone(),
                    generation,
                    self.settings.tick_interval,
                ));
                inner.timer.install(generation, task.abort_handle());
            } else {
                debug!("no async runtime; clock advances only through manual ticks");
            }
            Ok(game_time)
        });
        self.clock_changed(started.map(|game_time| (ClockPhase::Running, game_time)))
    }

    /// Pause a running clock.
    pub fn pause_tracking(&self) -> bool {
        let paused = self.mutate(|inner, _| {
            let session = inner.live()?;
            if !session.clock.pause() {
                return Err(Rejection::ClockStateMismatch);
            }
            session.last_action = None;
            Ok((ClockPhase::Paused, session.clock().game_time))
        });
        self.clock_changed(paused)
    }

    /// Resume a paused clock.
    pub fn resume_tracking(&self) -> bool {
        let resumed = self.mutate(|inner, _| {
            let session = inner.live()?;
            if !session.clock.resume() {
                return Err(Rejection::ClockStateMismatch);
            }
            session.last_action = None;
            Ok((ClockPhase::Running, session.clock().game_time))
        });
        self.clock_changed(resumed)
    }

    fn clock_changed(&self, result: Result<(ClockPhase, u32), Rejection>) -> bool {
        match result {
            Ok((phase, game_time)) => {
                self.notify(EngineNotification::ClockChanged { phase, game_time });
                true
            }
            Err(rejection) => {
                debug!(%rejection, "clock control ignored");
                false
            }
        }
    }

    /// Shift game time by `delta` seconds. The pending undo, if any, is dropped.
    pub fn adjust_time(&self, delta: i64) -> Result<TimeAdjustment, Rejection> {
        self.time_changed(self.mutate(|inner, _| Ok(inner.live()?.adjust_time(delta))))
    }

    /// Set game time to `seconds`.
    pub fn set_game_time(&self, seconds: i64) -> Result<TimeAdjustment, Rejection> {
        self.time_changed(self.mutate(|inner, _| Ok(inner.live()?.set_time(seconds))))
    }

    fn time_changed(
        &self,
        result: Result<TimeAdjustment, Rejection>,
    ) -> Result<TimeAdjustment, Rejection> {
        if let Ok(adjustment) = &result {
            let phase = self
                .lock()
                .session
                .as_ref()
                .map_or(ClockPhase::Idle, |session| session.clock().phase());
            self.notify(EngineNotification::ClockChanged {
                phase,
                game_time: adjustment.game_time,
            });
        }
        result
    }

    /// Apply one tick immediately, regardless of the timer task.
    pub fn tick(&self) -> TickOutcome {
        self.apply_tick(None).unwrap_or(TickOutcome::Skipped)
    }

    /// Apply a tick from the timer task of `generation`. `None` means the task must stop.
    fn apply_tick(&self, generation: Option<u64>) -> Option<TickOutcome> {
        let (outcome, period) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if let Some(generation) = generation {
                if !inner.timer.is_current(generation) {
                    return None;
                }
            }
            let session = inner.session.as_mut()?;
            let outcome = session.tick();
            let period = session.game().current_period;
            match outcome {
                TickOutcome::Skipped => return Some(outcome),
                TickOutcome::Advanced { .. } => {}
                TickOutcome::PeriodExpired { .. } => {
                    inner.timer.cancel();
                }
            }
            self.commit(inner.session.as_ref());
            (outcome, period)
        };

        match outcome {
            TickOutcome::Advanced { game_time } => {
                self.notify(EngineNotification::ClockTick { game_time });
            }
            TickOutcome::PeriodExpired { game_time } => {
                info!(period, game_time, "period time expired; clock stopped");
                self.notify(EngineNotification::ClockTick { game_time });
                self.notify(EngineNotification::PeriodExpired { period, game_time });
            }
            TickOutcome::Skipped => {}
        }
        match outcome {
            TickOutcome::PeriodExpired { .. } if generation.is_some() => None,
            _ => Some(outcome),
        }
    }

    // ---- periods ----

    /// Begin period `period`. The clock stays idle.
    pub fn start_period(&self, period: u8) -> Result<PeriodPlan, Rejection> {
        let plan = self.mutate(|inner, now| inner.live()?.start_period(period, now))?;
        self.notify(EngineNotification::PeriodChanged {
            period: plan.to,
            ended: false,
        });
        Ok(plan)
    }

    /// End the period in play. Ending the first period flushes pending changes.
    pub async fn end_period(&self) -> Result<PeriodPlan, Rejection> {
        let plan = self.mutate(|inner, now| {
            let plan = inner.live()?.end_period(now)?;
            inner.timer.cancel();
            Ok(plan)
        })?;
        self.notify(EngineNotification::PeriodChanged {
            period: plan.from,
            ended: true,
        });

        if plan.sync_checkpoint {
            if let Err(err) = self.sync().await {
                warn!(period = plan.from, error = %err, "checkpoint sync failed");
            }
        }
        Ok(plan)
    }

    // ---- ledger and event writers ----

    /// Record a shot.
    pub fn add_shot(&self, shot: NewShot) -> Result<Shot, Rejection> {
        let shot = self.mutate(|inner, now| Ok(inner.live()?.add_shot(shot, now)))?;
        self.notify(EngineNotification::ShotRecorded { id: shot.id });
        Ok(shot)
    }

    /// Record a goal against.
    pub fn add_goal_against(&self, goal: NewGoalAgainst) -> Result<GoalAgainst, Rejection> {
        let goal = self.mutate(|inner, now| Ok(inner.live()?.add_goal_against(goal, now)))?;
        self.notify(EngineNotification::GoalAgainstRecorded { id: goal.id });
        Ok(goal)
    }

    /// Score a goal for the home team.
    pub fn add_home_goal(&self) -> Result<GameEvent, Rejection> {
        self.add_goal(TeamSide::Home)
    }

    /// Score a goal for the away team.
    pub fn add_away_goal(&self) -> Result<GameEvent, Rejection> {
        self.add_goal(TeamSide::Away)
    }

    fn add_goal(&self, side: TeamSide) -> Result<GameEvent, Rejection> {
        let (event, home_score, away_score, phase) = self.mutate(|inner, now| {
            let session = inner.live()?;
            let event = session.add_goal(side, now);
            let game = session.game();
            Ok((
                event,
                game.home_score,
                game.away_score,
                session.clock().phase(),
            ))
        })?;
        self.notify(EngineNotification::ScoreChanged {
            home_score,
            away_score,
        });
        self.notify(EngineNotification::ClockChanged {
            phase,
            game_time: event.game_time,
        });
        self.event_recorded(&event);
        Ok(event)
    }

    /// Log a won faceoff.
    pub fn add_faceoff_win(&self) -> Result<GameEvent, Rejection> {
        self.add_faceoff(true)
    }

    /// Log a lost faceoff.
    pub fn add_faceoff_loss(&self) -> Result<GameEvent, Rejection> {
        self.add_faceoff(false)
    }

    fn add_faceoff(&self, won: bool) -> Result<GameEvent, Rejection> {
        let event = self.mutate(|inner, now| Ok(inner.live()?.add_faceoff(won, now)))?;
        self.event_recorded(&event);
        Ok(event)
    }

    /// Call the single team timeout.
    pub fn use_timeout(&self) -> Result<GameEvent, Rejection> {
        let event = self.mutate(|inner, now| inner.live()?.use_timeout(now))?;
        self.event_recorded(&event);
        Ok(event)
    }

    /// Log a free-form event, such as a penalty or a tactical drawing.
    pub fn record_event(
        &self,
        event_type: EventType,
        description: String,
        payload: Option<Value>,
    ) -> Result<GameEvent, Rejection> {
        let event = self.mutate(|inner, now| {
            let session = inner.live()?;
            let event = session.record_event(event_type, description, payload, now);
            session.last_action = None;
            Ok(event)
        })?;
        self.event_recorded(&event);
        Ok(event)
    }

    fn event_recorded(&self, event: &GameEvent) {
        self.notify(EngineNotification::EventRecorded {
            id: event.id,
            event_type: event.event_type,
        });
    }

    // ---- undo ----

    /// Whether the last action can still be undone.
    pub fn can_undo(&self) -> bool {
        let now = self.wall_clock.now();
        self.lock()
            .session
            .as_ref()
            .is_some_and(|session| session.can_undo(&self.settings.undo, now))
    }

    /// Reverse the last action. Returns `false` without changing anything when nothing can be undone.
    pub fn undo_last_action(&self) -> bool {
        self.undo().is_some()
    }

    /// Reverse the last action and describe what was removed.
    pub fn undo(&self) -> Option<UndoReport> {
        let (report, home_score, away_score) = self
            .mutate(|inner, now| {
                let session = inner.live()?;
                Ok(session.undo(&self.settings.undo, now).map(|report| {
                    (report, session.game().home_score, session.game().away_score)
                }))
            })
            .ok()
            .flatten()?;
        self.notify(EngineNotification::ActionUndone { kind: report.kind });
        if report.score_reverted {
            self.notify(EngineNotification::ScoreChanged {
                home_score,
                away_score,
            });
        }
        Some(report)
    }

    // ---- sync ----

    /// Flush pending changes to the remote store.
    ///
    /// A call made while another pass is running returns at once with a skipped report.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        if self.is_syncing.swap(true, Ordering::AcqRel) {
            debug!("sync already in progress; skipping");
            return Ok(SyncReport::skipped());
        }
        let _guard = SyncPassGuard { engine: self };
        self.sync_status.send_modify(|status| status.syncing = true);

        let result = self.sync_pass().await;
        let now = self.wall_clock.now();
        self.sync_status.send_modify(|status| match &result {
            Ok(_) => {
                status.last_error = None;
                status.last_synced_at = Some(now);
            }
            Err(err) => status.last_error = Some(err.to_string()),
        });
        match &result {
            Ok(report) => debug!(?report, "sync finished"),
            Err(err) => warn!(error = %err, "sync failed"),
        }
        result
    }

    /// Sync, waiting for a pass already in flight instead of skipping.
    async fn sync_exclusive(&self) -> Result<SyncReport, SyncError> {
        let mut status = self.sync_status.subscribe();
        loop {
            let report = self.sync().await?;
            if !report.skipped {
                return Ok(report);
            }
            if status.wait_for(|status| !status.syncing).await.is_err() {
                return Ok(report);
            }
        }
    }

    async fn sync_pass(&self) -> Result<SyncReport, SyncError> {
        let batch = {
            let guard = self.lock();
            match &guard.session {
                Some(session) => session.sync_batch(),
                None => return Ok(SyncReport::default()),
            }
        };
        if batch.is_empty() {
            return Ok(SyncReport::default());
        }
        let store = self.store().ok_or(SyncError::Unavailable)?;

        let progress = push_batch(store.as_ref(), &batch).await;

        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(session) = inner
            .session
            .as_mut()
            .filter(|session| session.game().id == batch.game_id())
        else {
            debug!("live game changed during sync; dropping results");
            return Ok(SyncReport::default());
        };
        let result = session.apply_sync(&batch, progress);
        self.commit(inner.session.as_ref());
        result
    }
}

fn decode_all<E, T>(
    collection: RemoteCollection,
    records: Vec<RemoteRecord>,
    build: impl Fn(E, String) -> T,
) -> Vec<T>
where
    E: DeserializeOwned,
{
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<E>(record.body) {
            Ok(entity) => Some(build(entity, record.id)),
            Err(err) => {
                warn!(%collection, id = %record.id, error = %err, "skipping malformed record");
                None
            }
        })
        .collect()
}

async fn run_timer(engine: Weak<LiveGameEngine>, generation: u64, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };
        if engine.apply_tick(Some(generation)).is_none() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::remote_store::memory::MemoryRemoteStore;

    fn game() -> Game {
        Game::new(
            "game-1",
            "home",
            "away",
            GameSchedule {
                periods: 2,
                period_minutes: 1,
                has_overtime: false,
            },
        )
    }

    fn engine() -> (Arc<LiveGameEngine>, Arc<ManualWallClock>) {
        let clock = Arc::new(ManualWallClock::new(
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        ));
        let engine = LiveGameEngine::with_parts(TrackingSettings::default(), clock.clone(), None);
        (engine, clock)
    }

    #[test]
    fn operations_without_a_game_are_refused_without_effect() {
        let (engine, _) = engine();
        assert!(!engine.start_tracking());
        assert!(!engine.undo_last_action());
        assert_eq!(engine.add_home_goal().unwrap_err(), Rejection::NoActiveGame);
        assert_eq!(engine.tick(), TickOutcome::Skipped);
        assert!(engine.session().is_none());
    }

    #[test]
    fn manual_ticks_drive_the_clock_without_a_runtime() {
        let (engine, _) = engine();
        engine.initialize_live_game(game()).unwrap();
        assert!(engine.start_tracking());
        assert!(!engine.start_tracking());

        for _ in 0..59 {
            engine.tick();
        }
        assert_eq!(engine.tick(), TickOutcome::PeriodExpired { game_time: 60 });
        assert_eq!(engine.tick(), TickOutcome::Skipped);
        let session = engine.session().unwrap();
        assert_eq!(session.clock().game_time, 60);
        assert_eq!(session.clock().phase(), ClockPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn the_timer_task_ticks_every_second_and_stops_at_the_boundary() {
        let (engine, _) = engine();
        engine.initialize_live_game(game()).unwrap();
        let mut notifications = engine.subscribe();
        assert!(engine.start_tracking());
        assert!(engine.timer_armed());

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(engine.session().unwrap().clock().game_time, 10);

        tokio::time::sleep(Duration::from_secs(120)).await;
        let session = engine.session().unwrap();
        assert_eq!(session.clock().game_time, 60);
        assert!(!session.clock().is_tracking);
        assert!(!engine.timer_armed());

        let mut expirations = 0;
        while let Ok(notification) = notifications.try_recv() {
            if matches!(notification, EngineNotification::PeriodExpired { .. }) {
                expirations += 1;
            }
        }
        assert_eq!(expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pausing_freezes_time_until_resumed() {
        let (engine, _) = engine();
        engine.initialize_live_game(game()).unwrap();
        engine.start_tracking();
        tokio::time::sleep(Duration::from_millis(5_500)).await;

        assert!(engine.pause_tracking());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.session().unwrap().clock().game_time, 5);

        assert!(engine.resume_tracking());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(engine.session().unwrap().clock().game_time, 8);
    }

    #[test]
    fn undo_follows_the_wall_clock_window() {
        let (engine, clock) = engine();
        engine.initialize_live_game(game()).unwrap();
        engine.add_faceoff_win().unwrap();

        clock.advance(Duration::from_millis(29_900));
        assert!(engine.can_undo());
        clock.advance(Duration::from_millis(200));
        assert!(!engine.can_undo());
        assert!(!engine.undo_last_action());
        assert_eq!(
            engine.session().unwrap().events().count(EventType::FaceoffWon),
            1
        );
    }

    #[test]
    fn clock_controls_close_the_undo_window() {
        let (engine, _) = engine();
        engine.initialize_live_game(game()).unwrap();
        assert!(engine.start_tracking());
        engine.add_faceoff_win().unwrap();
        assert!(engine.can_undo());

        assert!(engine.pause_tracking());
        assert!(!engine.can_undo());
        assert!(!engine.undo_last_action());

        engine.add_faceoff_loss().unwrap();
        assert!(engine.resume_tracking());
        assert!(!engine.can_undo());

        engine.add_faceoff_loss().unwrap();
        engine.set_game_time(30).unwrap();
        assert!(!engine.can_undo());
        assert_eq!(
            engine.session().unwrap().events().count(EventType::FaceoffLost),
            2
        );
    }

    #[test]
    fn a_different_game_waits_for_pending_changes() {
        let (engine, _) = engine();
        engine.initialize_live_game(game()).unwrap();
        engine.initialize_live_game(game()).unwrap();

        let mut other = game();
        other.id = "game-2".into();
        assert_eq!(
            engine.initialize_live_game(other).unwrap_err(),
            Rejection::UnsyncedChanges
        );
    }

    #[tokio::test]
    async fn sync_without_a_store_keeps_changes_pending() {
        let (engine, _) = engine();
        engine.initialize_live_game(game()).unwrap();

        assert!(matches!(engine.sync().await, Err(SyncError::Unavailable)));
        let status = engine.sync_status().borrow().clone();
        assert!(status.has_pending());
        assert!(status.last_error.is_some());
        assert!(!status.syncing);
    }

    #[tokio::test]
    async fn ending_the_first_period_is_a_checkpoint() {
        let (engine, _) = engine();
        let store = Arc::new(MemoryRemoteStore::new());
        store.insert(RemoteCollection::Games, "game-1", serde_json::json!({}));
        engine.install_store(store.clone());
        engine.initialize_live_game(game()).unwrap();
        engine.add_faceoff_loss().unwrap();

        engine.end_period().await.unwrap();

        assert!(!engine.session().unwrap().pending().any());
        assert_eq!(store.documents(RemoteCollection::GameEvents).len(), 3);
    }
}
