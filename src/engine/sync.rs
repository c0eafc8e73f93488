//! Flushing pending local changes to the remote store.
//!
//! A sync pass has three steps. [`LiveSession::sync_batch`] copies everything
//! dirty while the engine lock is held, [`push_batch`] talks to the store with
//! the lock released, and [`LiveSession::apply_sync`] reapplies the outcome by
//! id under the lock again. Mutations made while the push is in flight keep
//! their pending flags.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    error::SyncError,
    ledger::{Ledger, SyncRecord},
    model::{GameEvent, GoalAgainst, Shot},
    pending::{SubStore, Tombstone},
    session::LiveSession,
};
use crate::dao::{
    models::{GameEventEntity, GameStateChanges, GoalAgainstEntity, ShotEntity},
    remote_store::{RemoteCollection, RemoteStore},
    storage::{StorageError, StorageResult},
};

/// Copy of the dirty state taken at the start of a sync pass.
#[derive(Debug, Clone)]
pub struct SyncBatch {
    game_id: String,
    dirty: Vec<SubStore>,
    shots: Vec<Shot>,
    goals_against: Vec<GoalAgainst>,
    events: Vec<GameEvent>,
    tombstones: Vec<Tombstone>,
    game_state: Option<(GameStateChanges, u64)>,
}

impl SyncBatch {
    /// Game the batch was taken from.
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Whether the pass has anything to do.
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }
}

/// What a push managed to do before finishing or failing.
#[derive(Debug, Default)]
pub struct SyncProgress {
    created: Vec<(SubStore, Uuid, String)>,
    deleted: Vec<Tombstone>,
    game_state_version: Option<u64>,
    error: Option<SyncError>,
}

/// Summary of a completed sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Another pass was already running; nothing was done.
    pub skipped: bool,
    /// Records created remotely.
    pub created: usize,
    /// Remote records deleted.
    pub deleted: usize,
    /// Whether the game document was updated.
    pub game_state_pushed: bool,
    /// Sub-stores whose pending flag was cleared.
    pub cleared: Vec<SubStore>,
}

impl SyncReport {
    /// Report for a pass collapsed into one already running.
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

impl LiveSession {
    /// Snapshot everything the next push must send.
    pub(crate) fn sync_batch(&self) -> SyncBatch {
        let dirty: Vec<SubStore> = self.pending.dirty().collect();
        let wants = |store| dirty.contains(&store);

        SyncBatch {
            game_id: self.game.id.clone(),
            shots: if wants(SubStore::Shots) {
                self.shots.unsynced()
            } else {
                Vec::new()
            },
            goals_against: if wants(SubStore::GoalsAgainst) {
                self.goals_against.unsynced()
            } else {
                Vec::new()
            },
            events: if wants(SubStore::Events) {
                self.events.ledger().unsynced()
            } else {
                Vec::new()
            },
            tombstones: self
                .tombstones
                .iter()
                .filter(|tombstone| wants(tombstone.store))
                .cloned()
                .collect(),
            game_state: wants(SubStore::GameState)
                .then(|| (GameStateChanges::from(&self.game), self.game_version)),
            dirty,
        }
    }

    /// Record the outcome of a push and clear the flags it fully covered.
    ///
    /// Flags are only cleared when the push finished without error.
    pub(crate) fn apply_sync(
        &mut self,
        batch: &SyncBatch,
        progress: SyncProgress,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport {
            created: progress.created.len(),
            deleted: progress.deleted.len(),
            game_state_pushed: progress.game_state_version.is_some(),
            ..SyncReport::default()
        };

        for (store, id, remote_id) in progress.created {
            let applied = match store {
                SubStore::Shots => self.shots.mark_synced(id, remote_id.clone()),
                SubStore::GoalsAgainst => self.goals_against.mark_synced(id, remote_id.clone()),
                SubStore::Events => self.events.ledger_mut().mark_synced(id, remote_id.clone()),
                SubStore::GameState => true,
            };
            if !applied {
                debug!(?store, %id, "record undone while its push was in flight");
                self.bury(store, Some(remote_id));
            }
        }
        self.tombstones
            .retain(|tombstone| !progress.deleted.contains(tombstone));

        if let Some(error) = progress.error {
            return Err(error);
        }

        for store in &batch.dirty {
            let settled = match store {
                SubStore::Shots => settled(&self.shots),
                SubStore::GoalsAgainst => settled(&self.goals_against),
                SubStore::Events => settled(self.events.ledger()),
                SubStore::GameState => progress.game_state_version == Some(self.game_version),
            };
            let buried = self.tombstones.iter().any(|t| t.store == *store);
            if settled && !buried {
                self.pending.clear(*store);
                report.cleared.push(*store);
            }
        }
        Ok(report)
    }
}

fn settled<T: SyncRecord>(ledger: &Ledger<T>) -> bool {
    !ledger.has_unsynced()
}

fn encode<E: Serialize>(collection: RemoteCollection, entity: E) -> StorageResult<Value> {
    serde_json::to_value(entity).map_err(|source| StorageError::Encode { collection, source })
}

/// Push `batch` to `store`, stopping at the first failure.
pub async fn push_batch(store: &dyn RemoteStore, batch: &SyncBatch) -> SyncProgress {
    let mut progress = SyncProgress::default();
    if let Err((failed, source)) = push_all(store, batch, &mut progress).await {
        warn!(store = ?failed, error = %source, "sync push failed");
        progress.error = Some(SyncError::Push {
            store: failed,
            source,
        });
    }
    progress
}

async fn push_all(
    store: &dyn RemoteStore,
    batch: &SyncBatch,
    progress: &mut SyncProgress,
) -> Result<(), (SubStore, StorageError)> {
    for sub_store in &batch.dirty {
        let sub_store = *sub_store;
        let collection = sub_store.collection();
        let fail = |source: StorageError| (sub_store, source);

        for tombstone in batch.tombstones.iter().filter(|t| t.store == sub_store) {
            store
                .delete(collection, tombstone.remote_id.clone())
                .await
                .map_err(fail)?;
            progress.deleted.push(tombstone.clone());
        }

        let records: Vec<(Uuid, StorageResult<Value>)> = match sub_store {
            SubStore::Shots => batch
                .shots
                .iter()
                .map(|shot| (shot.id, encode(collection, ShotEntity::from(shot))))
                .collect(),
            SubStore::GoalsAgainst => batch
                .goals_against
                .iter()
                .map(|goal| (goal.id, encode(collection, GoalAgainstEntity::from(goal))))
                .collect(),
            SubStore::Events => batch
                .events
                .iter()
                .map(|event| (event.id(), encode(collection, GameEventEntity::from(event))))
                .collect(),
            SubStore::GameState => {
                if let Some((changes, version)) = &batch.game_state {
                    let changes = encode(collection, changes).map_err(fail)?;
                    store
                        .update(collection, batch.game_id.clone(), changes)
                        .await
                        .map_err(fail)?;
                    progress.game_state_version = Some(*version);
                }
                Vec::new()
            }
        };

        for (id, record) in records {
            let remote_id = store
                .create(collection, record.map_err(fail)?)
                .await
                .map_err(fail)?;
            progress.created.push((sub_store, id, remote_id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use serde_json::json;

    use super::*;
    use crate::{
        dao::remote_store::memory::MemoryRemoteStore,
        engine::model::{
            Game, GameSchedule, NewGoalAgainst, NewShot, RinkPosition, ShotResult, TeamSide,
        },
    };

    fn session() -> LiveSession {
        let game = Game::new(
            "game-1",
            "home",
            "away",
            GameSchedule {
                periods: 2,
                period_minutes: 10,
                has_overtime: false,
            },
        );
        LiveSession::start(game, SystemTime::now()).unwrap()
    }

    fn store() -> MemoryRemoteStore {
        let store = MemoryRemoteStore::new();
        store.insert(RemoteCollection::Games, "game-1", json!({"home_team": "home"}));
        store
    }

    fn shot() -> NewShot {
        NewShot {
            position: RinkPosition::new(0.2, 0.8),
            result: ShotResult::Save,
            team_side: Some(TeamSide::Home),
        }
    }

    async fn sync(session: &mut LiveSession, store: &MemoryRemoteStore) -> Result<SyncReport, SyncError> {
        let batch = session.sync_batch();
        let progress = push_batch(store, &batch).await;
        session.apply_sync(&batch, progress)
    }

    #[tokio::test]
    async fn a_full_pass_marks_everything_synced_and_clears_flags() {
        let mut session = session();
        session.add_shot(shot(), SystemTime::now());
        let store = store();

        let report = sync(&mut session, &store).await.unwrap();
        assert_eq!(report.created, 2);
        assert!(report.game_state_pushed);
        assert!(!session.pending().any());
        assert!(session.shots().entries().iter().all(|shot| shot.synced));
        assert_eq!(store.documents(RemoteCollection::Games)[0].body["status"], "live");

        let again = sync(&mut session, &store).await.unwrap();
        assert_eq!(again, SyncReport::default());
        assert_eq!(store.documents(RemoteCollection::Shots).len(), 1);
    }

    #[tokio::test]
    async fn partial_failures_keep_flags_but_remember_successes() {
        let mut session = session();
        session.add_shot(shot(), SystemTime::now());
        session.add_goal_against(
            NewGoalAgainst {
                position: RinkPosition::new(0.5, 0.5),
                reason: None,
            },
            SystemTime::now(),
        );
        let store = store();

        let batch = session.sync_batch();
        let mut progress = SyncProgress::default();
        // the shot went through, then the store dropped out
        let shot_id = session.shots().entries()[0].id;
        progress.created.push((SubStore::Shots, shot_id, "shots-99".into()));
        progress.error = Some(SyncError::Unavailable);

        assert!(session.apply_sync(&batch, progress).is_err());
        assert!(session.shots().entries()[0].synced);
        assert!(session.pending().shots);
        assert!(session.pending().goals_against);

        let report = sync(&mut session, &store).await.unwrap();
        assert_eq!(report.created, 2);
        assert!(store.documents(RemoteCollection::Shots).is_empty());
        assert!(!session.pending().any());
    }

    #[tokio::test]
    async fn failing_push_reports_the_sub_store() {
        let mut session = session();
        session.add_shot(shot(), SystemTime::now());
        let store = store();
        store.fail_next_writes(1);

        match sync(&mut session, &store).await {
            Err(SyncError::Push { store, .. }) => assert_eq!(store, SubStore::Shots),
            other => panic!("unexpected sync result: {other:?}"),
        }
        assert!(session.pending().shots);
        assert!(session.pending().game_state);
    }

    #[tokio::test]
    async fn game_state_changed_during_push_stays_pending() {
        let mut session = session();
        let store = store();

        let batch = session.sync_batch();
        let progress = push_batch(&store, &batch).await;
        session.add_goal(TeamSide::Home, SystemTime::now());
        let report = session.apply_sync(&batch, progress).unwrap();

        assert!(report.game_state_pushed);
        assert!(session.pending().game_state);
        assert!(session.pending().events);
    }

    #[tokio::test]
    async fn undone_synced_records_are_deleted_remotely() {
        let mut session = session();
        let store = store();
        session.add_shot(shot(), SystemTime::now());
        sync(&mut session, &store).await.unwrap();
        assert_eq!(store.documents(RemoteCollection::Shots).len(), 1);

        session
            .undo(&Default::default(), SystemTime::now())
            .unwrap();
        assert!(session.pending().shots);

        let report = sync(&mut session, &store).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(store.documents(RemoteCollection::Shots).is_empty());
        assert!(session.tombstones().is_empty());
        assert!(!session.pending().shots);
    }
}
