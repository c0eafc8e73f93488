//! Append-only collections of records awaiting (or done with) remote sync.

use std::time::SystemTime;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use super::model::{GameEvent, GoalAgainst, Shot};

/// Record kept locally and mirrored to the remote store.
pub trait SyncRecord: Clone + Serialize + DeserializeOwned {
    /// Local identifier.
    fn id(&self) -> Uuid;
    /// Wall-clock creation time.
    fn timestamp(&self) -> SystemTime;
    /// Whether the record reached the remote store.
    fn is_synced(&self) -> bool;
    /// Identifier assigned by the remote store.
    fn remote_id(&self) -> Option<&str>;
    /// Record a successful push.
    fn mark_synced(&mut self, remote_id: String);
}

macro_rules! impl_sync_record {
    ($ty:ty) => {
        impl SyncRecord for $ty {
            fn id(&self) -> Uuid {
                self.id
            }

            fn timestamp(&self) -> SystemTime {
                self.timestamp
            }

            fn is_synced(&self) -> bool {
                self.synced
            }

            fn remote_id(&self) -> Option<&str> {
                self.remote_id.as_deref()
            }

            fn mark_synced(&mut self, remote_id: String) {
                self.synced = true;
                self.remote_id = Some(remote_id);
            }
        }
    };
}

impl_sync_record!(Shot);
impl_sync_record!(GoalAgainst);
impl_sync_record!(GameEvent);

/// Ordered, append-only collection. Entries only leave through [`Ledger::remove`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger<T> {
    entries: Vec<T>,
}

impl<T> Default for Ledger<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: SyncRecord> Ledger<T> {
    /// Build a ledger from already-known entries, keeping their order.
    pub fn from_entries(entries: Vec<T>) -> Self {
        Self { entries }
    }

    /// Append an entry and return a reference to it.
    pub fn append(&mut self, entry: T) -> &T {
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&T> {
        self.entries.last()
    }

    /// Look an entry up by local id.
    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    /// Remove the entry with `id`.
    pub fn remove(&mut self, id: Uuid) -> Option<T> {
        let index = self.entries.iter().rposition(|entry| entry.id() == id)?;
        Some(self.entries.remove(index))
    }

    /// Remove the most recent entry.
    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop()
    }

    /// Clones of the entries not yet synced.
    pub fn unsynced(&self) -> Vec<T> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_synced())
            .cloned()
            .collect()
    }

    /// Whether any entry still awaits sync.
    pub fn has_unsynced(&self) -> bool {
        self.entries.iter().any(|entry| !entry.is_synced())
    }

    /// Mark the entry with `id` as synced. Returns `false` when it no longer exists.
    pub fn mark_synced(&mut self, id: Uuid, remote_id: String) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id() == id) {
            Some(entry) => {
                entry.mark_synced(remote_id);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::{RinkPosition, ShotResult, TeamSide};

    fn shot(result: ShotResult) -> Shot {
        Shot {
            id: Uuid::new_v4(),
            game_id: "game-1".into(),
            period: 1,
            timestamp: SystemTime::now(),
            position: RinkPosition::new(0.5, 0.5),
            result,
            team_side: TeamSide::Home,
            synced: false,
            remote_id: None,
        }
    }

    #[test]
    fn unsynced_entries_are_tracked_until_marked() {
        let mut ledger = Ledger::default();
        let first = ledger.append(shot(ShotResult::Save)).id;
        let second = ledger.append(shot(ShotResult::Goal)).id;

        assert_eq!(ledger.unsynced().len(), 2);
        assert!(ledger.mark_synced(first, "remote-1".into()));
        assert_eq!(ledger.unsynced().len(), 1);
        assert_eq!(ledger.get(first).and_then(|s| s.remote_id()), Some("remote-1"));

        ledger.mark_synced(second, "remote-2".into());
        assert!(!ledger.has_unsynced());
    }

    #[test]
    fn removed_entries_cannot_be_marked_synced() {
        let mut ledger = Ledger::default();
        let id = ledger.append(shot(ShotResult::Miss)).id;
        assert!(ledger.remove(id).is_some());
        assert!(!ledger.mark_synced(id, "remote".into()));
        assert!(ledger.is_empty());
    }

    #[test]
    fn ledgers_serialize_as_plain_arrays() {
        let mut ledger = Ledger::default();
        ledger.append(shot(ShotResult::Blocked));
        let value = serde_json::to_value(&ledger).unwrap();
        assert!(value.is_array());

        let back: Ledger<Shot> = serde_json::from_value(value).unwrap();
        assert_eq!(back, ledger);
    }
}
