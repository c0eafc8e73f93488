//! Per sub-store dirty flags and the tombstones left behind by undone records.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::remote_store::RemoteCollection;

/// Logical sub-stores tracked for remote sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubStore {
    /// Shot ledger.
    Shots,
    /// Goal-against ledger.
    GoalsAgainst,
    /// Event log.
    Events,
    /// Live fields of the game document.
    GameState,
}

impl SubStore {
    /// All sub-stores in flush order.
    pub const ALL: [SubStore; 4] = [
        SubStore::Shots,
        SubStore::GoalsAgainst,
        SubStore::Events,
        SubStore::GameState,
    ];

    /// Remote collection the sub-store is mirrored to.
    pub fn collection(self) -> RemoteCollection {
        match self {
            SubStore::Shots => RemoteCollection::Shots,
            SubStore::GoalsAgainst => RemoteCollection::GoalsAgainst,
            SubStore::Events => RemoteCollection::GameEvents,
            SubStore::GameState => RemoteCollection::Games,
        }
    }
}

/// Dirty flags, one per sub-store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChanges {
    /// Shot ledger has unpushed mutations.
    pub shots: bool,
    /// Goal-against ledger has unpushed mutations.
    pub goals_against: bool,
    /// Event log has unpushed mutations.
    pub events: bool,
    /// Game live fields have unpushed mutations.
    pub game_state: bool,
}

impl PendingChanges {
    /// Flag `store` as dirty.
    pub fn mark(&mut self, store: SubStore) {
        *self.flag_mut(store) = true;
    }

    /// Clear the flag of `store`.
    pub fn clear(&mut self, store: SubStore) {
        *self.flag_mut(store) = false;
    }

    /// Whether `store` is dirty.
    pub fn is_set(&self, store: SubStore) -> bool {
        match store {
            SubStore::Shots => self.shots,
            SubStore::GoalsAgainst => self.goals_against,
            SubStore::Events => self.events,
            SubStore::GameState => self.game_state,
        }
    }

    /// Whether anything is dirty.
    pub fn any(&self) -> bool {
        SubStore::ALL.iter().any(|store| self.is_set(*store))
    }

    /// Dirty sub-stores in flush order.
    pub fn dirty(&self) -> impl Iterator<Item = SubStore> + '_ {
        SubStore::ALL
            .into_iter()
            .filter(move |store| self.is_set(*store))
    }

    fn flag_mut(&mut self, store: SubStore) -> &mut bool {
        match store {
            SubStore::Shots => &mut self.shots,
            SubStore::GoalsAgainst => &mut self.goals_against,
            SubStore::Events => &mut self.events,
            SubStore::GameState => &mut self.game_state,
        }
    }
}

/// Remote record that must be deleted because its local counterpart was undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    /// Sub-store the record belonged to.
    pub store: SubStore,
    /// Identifier of the record in the remote store.
    pub remote_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_independent() {
        let mut pending = PendingChanges::default();
        assert!(!pending.any());

        pending.mark(SubStore::GoalsAgainst);
        pending.mark(SubStore::GameState);
        assert!(pending.goals_against);
        assert!(!pending.shots);
        assert_eq!(
            pending.dirty().collect::<Vec<_>>(),
            vec![SubStore::GoalsAgainst, SubStore::GameState]
        );

        pending.clear(SubStore::GoalsAgainst);
        assert!(!pending.is_set(SubStore::GoalsAgainst));
        assert!(pending.any());
    }
}
