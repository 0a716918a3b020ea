//! Item lifecycle: spawning into free cells, collection and expiry.

use std::{collections::BTreeMap, time::Duration};

use can_rush_core::{CellIndex, DifficultyProfile, ItemId, ItemSnapshot, ITEM_LIFETIME};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    grid::GridModel,
    scheduler::{Scheduler, TaskKey},
};

/// Item living on the grid.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Item {
    pub(crate) id: ItemId,
    pub(crate) cell: CellIndex,
    pub(crate) negative: bool,
    pub(crate) created_at: Duration,
    pub(crate) lifetime: Duration,
}

impl Item {
    pub(crate) fn snapshot(&self, now: Duration) -> ItemSnapshot {
        let expires_at = self.created_at.saturating_add(self.lifetime);
        ItemSnapshot {
            id: self.id,
            cell: self.cell,
            negative: self.negative,
            created_at: self.created_at,
            remaining: expires_at.saturating_sub(now),
        }
    }
}

/// Outcome of a successful collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CollectionResult {
    pub(crate) cell: CellIndex,
    pub(crate) negative: bool,
}

/// Owns the live items of the current round. An item leaves the registry the
/// moment it is collected or expires, so a missing entry is a terminal one.
///
/// Identifiers are allocated monotonically for the lifetime of the registry,
/// so an identifier left over from an earlier round never names a new item.
#[derive(Debug)]
pub(crate) struct ItemRegistry {
    entries: BTreeMap<ItemId, Item>,
    next_item_id: ItemId,
    rng: ChaCha8Rng,
}

impl ItemRegistry {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_item_id: ItemId::new(0),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Forgets every item of the round. Identifier allocation continues.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Spawns a single item into a uniformly chosen empty cell and arms its
    /// expiry. Returns `None` when the grid is full.
    pub(crate) fn try_spawn_one(
        &mut self,
        profile: &DifficultyProfile,
        grid: &mut GridModel,
        scheduler: &mut Scheduler,
        round: u64,
    ) -> Option<Item> {
        let empty = grid.empty_cells();
        if empty.is_empty() {
            return None;
        }

        let cell = empty[self.rng.gen_range(0..empty.len())];
        let negative = self.rng.gen_bool(profile.negative_probability());
        let item = Item {
            id: self.allocate_id(),
            cell,
            negative,
            created_at: scheduler.now(),
            lifetime: ITEM_LIFETIME,
        };

        grid.occupy(cell, item.id);
        let _ = self.entries.insert(item.id, item);
        scheduler.schedule_in(TaskKey::ItemExpiry(item.id), round, item.lifetime);
        Some(item)
    }

    /// Makes `items_per_tick` independent spawn attempts; each one observes
    /// the cells taken by the attempts before it.
    pub(crate) fn spawn_tick(
        &mut self,
        profile: &DifficultyProfile,
        grid: &mut GridModel,
        scheduler: &mut Scheduler,
        round: u64,
    ) -> Vec<Item> {
        (0..profile.items_per_tick())
            .filter_map(|_| self.try_spawn_one(profile, grid, scheduler, round))
            .collect()
    }

    /// Collects a live item, cancelling its expiry. Unknown and already
    /// removed items are ignored.
    pub(crate) fn collect(
        &mut self,
        id: ItemId,
        grid: &mut GridModel,
        scheduler: &mut Scheduler,
    ) -> Option<CollectionResult> {
        let item = self.entries.remove(&id)?;
        let _ = scheduler.cancel(TaskKey::ItemExpiry(id));
        grid.release(item.cell);
        Some(CollectionResult {
            cell: item.cell,
            negative: item.negative,
        })
    }

    /// Expires a live item. A late expiry for a collected or forgotten item
    /// does nothing.
    pub(crate) fn expire(&mut self, id: ItemId, grid: &mut GridModel) -> Option<Item> {
        let item = self.entries.remove(&id)?;
        grid.release(item.cell);
        Some(item)
    }

    pub(crate) fn live(&self) -> impl Iterator<Item = &Item> {
        self.entries.values()
    }

    pub(crate) fn get_live(&self, id: ItemId) -> Option<&Item> {
        self.entries.get(&id)
    }

    fn allocate_id(&mut self) -> ItemId {
        let id = self.next_item_id;
        self.next_item_id = ItemId::new(id.get().wrapping_add(1));
        id
    }
}
