use std::{
    future::Future,
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::future::BoxFuture;
use serde_json::{Value, json};

use rinkside::{
    dao::{
        local_cache::{LIVE_GAME_NAMESPACE, LocalCache},
        remote_store::{RemoteCollection, RemoteRecord, RemoteStore, memory::MemoryRemoteStore},
        storage::StorageResult,
    },
    engine::{
        ClockPhase, EventType, Game, GameSchedule, GameStatus, LiveGameEngine, ManualWallClock,
        NewGoalAgainst, NewShot, PendingChanges, Rejection, RinkPosition, ShotResult, TickOutcome,
        TrackingSettings,
    },
};

const GAME_ID: &str = "game-2x10";
const WRITE_DELAY: Duration = Duration::from_millis(50);

/// Drive async engine calls without giving the clock a runtime to spawn its task on.
fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn two_by_ten() -> Game {
    Game::new(
        GAME_ID,
        "Hawks",
        "Owls",
        GameSchedule {
            periods: 2,
            period_minutes: 10,
            has_overtime: false,
        },
    )
}

fn seeded_store() -> Arc<MemoryRemoteStore> {
    let store = Arc::new(MemoryRemoteStore::new());
    store.insert(
        RemoteCollection::Games,
        GAME_ID,
        json!({"home_team": "Hawks", "away_team": "Owls", "status": "planned"}),
    );
    store
}

fn engine_with(
    store: &Arc<MemoryRemoteStore>,
    cache: Option<LocalCache>,
) -> (Arc<LiveGameEngine>, Arc<ManualWallClock>) {
    let clock = Arc::new(ManualWallClock::new(
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_760_000_000),
    ));
    let engine = LiveGameEngine::with_parts(TrackingSettings::default(), clock.clone(), cache);
    engine.install_store(store.clone());
    (engine, clock)
}

/// Memory store whose writes take a while, so concurrent callers interleave.
struct SlowStore {
    inner: MemoryRemoteStore,
}

impl SlowStore {
    fn delayed<T: Send + 'static>(
        write: BoxFuture<'static, StorageResult<T>>,
    ) -> BoxFuture<'static, StorageResult<T>> {
        Box::pin(async move {
            tokio::time::sleep(WRITE_DELAY).await;
            write.await
        })
    }
}

impl RemoteStore for SlowStore {
    fn create(
        &self,
        collection: RemoteCollection,
        record: Value,
    ) -> BoxFuture<'static, StorageResult<String>> {
        Self::delayed(RemoteStore::create(&self.inner, collection, record))
    }

    fn update(
        &self,
        collection: RemoteCollection,
        id: String,
        changes: Value,
    ) -> BoxFuture<'static, StorageResult<()>> {
        Self::delayed(RemoteStore::update(&self.inner, collection, id, changes))
    }

    fn query_by_field(
        &self,
        collection: RemoteCollection,
        field: &'static str,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<Vec<RemoteRecord>>> {
        RemoteStore::query_by_field(&self.inner, collection, field, value)
    }

    fn delete(
        &self,
        collection: RemoteCollection,
        id: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        Self::delayed(RemoteStore::delete(&self.inner, collection, id))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        RemoteStore::health_check(&self.inner)
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        RemoteStore::try_reconnect(&self.inner)
    }
}

/// Engine writing through a [`SlowStore`]; the returned store sees the same documents.
fn slow_engine() -> (Arc<LiveGameEngine>, Arc<MemoryRemoteStore>) {
    let store = seeded_store();
    let (engine, _) = engine_with(&store, None);
    engine.install_store(Arc::new(SlowStore {
        inner: (*store).clone(),
    }));
    (engine, store)
}

fn game_end_events(store: &MemoryRemoteStore) -> usize {
    store
        .documents(RemoteCollection::GameEvents)
        .iter()
        .filter(|record| record.body["type"] == "game_end")
        .count()
}

fn shot(result: ShotResult) -> NewShot {
    NewShot {
        position: RinkPosition::new(0.82, 0.47),
        result,
        team_side: None,
    }
}

fn tick_until_expiry(engine: &LiveGameEngine, max: u32) -> (u32, usize) {
    let mut expirations = 0;
    let mut last = 0;
    for _ in 0..max {
        match engine.tick() {
            TickOutcome::Advanced { game_time } => last = game_time,
            TickOutcome::PeriodExpired { game_time } => {
                last = game_time;
                expirations += 1;
            }
            TickOutcome::Skipped => {}
        }
    }
    (last, expirations)
}

#[test]
fn a_two_by_ten_minute_game_end_to_end() {
    let store = seeded_store();
    let (engine, wall) = engine_with(&store, None);

    engine.initialize_live_game(two_by_ten()).unwrap();
    assert!(engine.start_tracking());
    for _ in 0..300 {
        engine.tick();
    }

    // shot that went in, then the goal shortcut
    engine.add_shot(shot(ShotResult::Goal)).unwrap();
    wall.advance(Duration::from_secs(2));
    engine.add_home_goal().unwrap();
    let session = engine.session().unwrap();
    assert_eq!(session.game().home_score, 1);
    assert_eq!(session.clock().phase(), ClockPhase::Paused);

    // conceded goal logged and then taken back
    assert!(engine.resume_tracking());
    wall.advance(Duration::from_secs(10));
    engine
        .add_goal_against(NewGoalAgainst {
            position: RinkPosition::new(0.1, 0.5),
            reason: Some("screened".into()),
        })
        .unwrap();
    engine.add_away_goal().unwrap();
    wall.advance(Duration::from_secs(5));
    assert!(engine.undo_last_action());
    let session = engine.session().unwrap();
    assert_eq!(session.game().away_score, 0);
    assert!(session.goals_against().is_empty());
    assert_eq!(session.events().count(EventType::GoalAway), 0);

    assert!(engine.resume_tracking());
    let (game_time, expirations) = tick_until_expiry(&engine, 400);
    assert_eq!(game_time, 600);
    assert_eq!(expirations, 1);
    assert!(!engine.session().unwrap().clock().is_tracking);

    // end of the first period flushes everything
    block_on(engine.end_period()).unwrap();
    assert!(!engine.session().unwrap().pending().any());
    assert_eq!(store.documents(RemoteCollection::Shots).len(), 1);
    assert!(store.documents(RemoteCollection::GoalsAgainst).is_empty());
    assert_eq!(store.documents(RemoteCollection::GameEvents).len(), 3);

    engine.start_period(2).unwrap();
    assert!(engine.start_tracking());
    engine.use_timeout().unwrap();
    assert_eq!(
        engine.use_timeout().unwrap_err(),
        Rejection::TimeoutAlreadyUsed
    );
    assert!(engine.resume_tracking());
    let (game_time, expirations) = tick_until_expiry(&engine, 700);
    assert_eq!(game_time, 1_200);
    assert_eq!(expirations, 1);

    block_on(engine.end_period()).unwrap();
    block_on(engine.end_game()).unwrap();

    assert!(engine.session().is_none());
    let games = store.documents(RemoteCollection::Games);
    assert_eq!(games[0].body["status"], "archived");
    assert_eq!(games[0].body["home_score"], 1);
    assert_eq!(games[0].body["away_score"], 0);
    assert_eq!(games[0].body["timeout_used"], true);
    // start, home goal, period end, period start, timeout, period end, game end
    assert_eq!(store.documents(RemoteCollection::GameEvents).len(), 7);
    assert!(!engine.sync_status().borrow().has_pending());
}

#[tokio::test(start_paused = true)]
async fn overlapping_syncs_push_each_record_once() {
    let (engine, store) = slow_engine();
    engine.initialize_live_game(two_by_ten()).unwrap();
    engine.add_shot(shot(ShotResult::Save)).unwrap();

    let (first, second) = tokio::join!(engine.sync(), engine.sync());
    let first = first.unwrap();
    let second = second.unwrap();

    // game start event + shot, then the game document
    assert!(!first.skipped);
    assert_eq!(first.created, 2);
    assert!(second.skipped);
    assert_eq!(second.created, 0);
    assert_eq!(store.write_count(), 3);
    assert_eq!(store.documents(RemoteCollection::Shots).len(), 1);
    assert_eq!(store.documents(RemoteCollection::GameEvents).len(), 1);
    assert!(!engine.sync_status().borrow().syncing);

    let third = engine.sync().await.unwrap();
    assert!(!third.skipped);
    assert_eq!(third.created, 0);
    assert_eq!(store.write_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn ending_the_game_waits_for_a_sync_in_flight() {
    let (engine, store) = slow_engine();
    engine.initialize_live_game(two_by_ten()).unwrap();
    engine.add_shot(shot(ShotResult::Goal)).unwrap();

    let (synced, ended) = tokio::join!(engine.sync(), engine.end_game());
    assert_eq!(synced.unwrap().created, 2);
    ended.unwrap();

    assert!(engine.session().is_none());
    let games = store.documents(RemoteCollection::Games);
    assert_eq!(games[0].body["status"], "archived");
    let events = store.documents(RemoteCollection::GameEvents);
    let kinds: Vec<_> = events.iter().map(|record| &record.body["type"]).collect();
    assert_eq!(kinds, ["game_start", "game_end"]);
    assert_eq!(store.documents(RemoteCollection::Shots).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn an_abandoned_end_game_still_archives_once() {
    let (engine, store) = slow_engine();
    engine.initialize_live_game(two_by_ten()).unwrap();
    engine.add_shot(shot(ShotResult::Save)).unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(10), engine.end_game()).await;
    assert!(abandoned.is_err());

    // the caller retries while the first flush is still writing
    engine.end_game().await.unwrap();

    assert!(engine.session().is_none());
    assert_eq!(game_end_events(&store), 1);
    let games = store.documents(RemoteCollection::Games);
    assert_eq!(games[0].body["status"], "archived");
    assert_eq!(store.documents(RemoteCollection::Shots).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn a_dropped_end_game_finishes_on_its_own() {
    let (engine, store) = slow_engine();
    engine.initialize_live_game(two_by_ten()).unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(10), engine.end_game()).await;
    assert!(abandoned.is_err());
    assert_eq!(
        engine.session().map(|session| session.game().status),
        Some(GameStatus::Archived)
    );

    tokio::time::sleep(WRITE_DELAY * 10).await;
    assert!(engine.session().is_none());
    assert_eq!(game_end_events(&store), 1);
    assert!(!engine.sync_status().borrow().has_pending());
}

#[test]
fn each_operation_marks_only_what_it_touches() {
    let store = seeded_store();
    let (engine, _) = engine_with(&store, None);
    engine.initialize_live_game(two_by_ten()).unwrap();
    block_on(engine.sync()).unwrap();
    assert_eq!(
        engine.session().unwrap().pending(),
        PendingChanges::default()
    );

    engine
        .add_goal_against(NewGoalAgainst {
            position: RinkPosition::new(0.5, 0.5),
            reason: None,
        })
        .unwrap();
    assert_eq!(
        engine.session().unwrap().pending(),
        PendingChanges {
            goals_against: true,
            ..PendingChanges::default()
        }
    );

    block_on(engine.sync()).unwrap();
    engine.add_faceoff_win().unwrap();
    assert_eq!(
        engine.session().unwrap().pending(),
        PendingChanges {
            events: true,
            ..PendingChanges::default()
        }
    );

    assert!(engine.start_tracking());
    assert_eq!(
        engine.session().unwrap().pending(),
        PendingChanges {
            events: true,
            ..PendingChanges::default()
        }
    );
}

#[test]
fn a_restart_resumes_from_the_local_cache_with_the_clock_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store();
    let (engine, _) = engine_with(
        &store,
        Some(LocalCache::new(dir.path(), LIVE_GAME_NAMESPACE)),
    );
    engine.initialize_live_game(two_by_ten()).unwrap();
    assert!(engine.start_tracking());
    for _ in 0..42 {
        engine.tick();
    }
    engine.add_shot(shot(ShotResult::Miss)).unwrap();
    assert!(dir.path().join("hockey-live-game-storage.json").exists());
    drop(engine);

    let (restarted, _) = engine_with(
        &store,
        Some(LocalCache::new(dir.path(), LIVE_GAME_NAMESPACE)),
    );
    assert!(restarted.restore_from_cache().unwrap());
    let session = restarted.session().unwrap();
    assert_eq!(session.clock().game_time, 42);
    assert!(!session.clock().is_tracking);
    assert_eq!(session.shots().len(), 1);
    assert!(session.pending().shots);
    assert!(restarted.sync_status().borrow().has_pending());
}

#[test]
fn stored_games_can_be_reloaded_into_a_fresh_engine() {
    let store = seeded_store();
    let (engine, wall) = engine_with(&store, None);
    engine.initialize_live_game(two_by_ten()).unwrap();
    engine.add_shot(shot(ShotResult::Save)).unwrap();
    wall.advance(Duration::from_secs(1));
    engine.add_shot(shot(ShotResult::Blocked)).unwrap();
    block_on(engine.sync()).unwrap();

    let (fresh, _) = engine_with(&store, None);
    let mut game = two_by_ten();
    game.status = GameStatus::Live;
    let records = block_on(fresh.load_game_data(game)).unwrap();
    assert_eq!(records, 3);

    let session = fresh.session().unwrap();
    let results: Vec<_> = session.shots().entries().iter().map(|s| s.result).collect();
    assert_eq!(results, [ShotResult::Save, ShotResult::Blocked]);
    assert!(session.shots().entries().iter().all(|s| s.synced));
    assert!(!session.pending().any());
}
