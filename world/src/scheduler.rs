//! Cancellable timers driven by the world clock.
//!
//! Every deferred piece of work in a round is a task keyed by [`TaskKey`].
//! Scheduling a key that is already pending replaces the earlier entry, so a
//! key is armed at most once. Tasks fire in due order; ties fire in the order
//! they were scheduled.

use std::{collections::BTreeMap, time::Duration};

use can_rush_core::ItemId;

/// Identity of a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum TaskKey {
    /// Periodic spawn tick of the active round.
    SpawnTicker,
    /// One-second countdown step of the active round.
    Countdown,
    /// Expiry of a single item.
    ItemExpiry(ItemId),
    /// Emptying of the container after the nth container filled.
    ContainerReset(u32),
    /// Auto-hide of the goal badge.
    GoalBadge,
}

/// Task popped from the queue once its due instant was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DueTask {
    pub(crate) key: TaskKey,
    pub(crate) round: u64,
    pub(crate) due: Duration,
}

#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    now: Duration,
    next_sequence: u64,
    queue: BTreeMap<(Duration, u64), (TaskKey, u64)>,
    slots: BTreeMap<TaskKey, (Duration, u64)>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn now(&self) -> Duration {
        self.now
    }

    pub(crate) fn schedule_in(&mut self, key: TaskKey, round: u64, delay: Duration) {
        let due = self.now.saturating_add(delay);
        self.schedule_at(key, round, due);
    }

    /// Arms `key` at `due`, never earlier than the current instant.
    pub(crate) fn schedule_at(&mut self, key: TaskKey, round: u64, due: Duration) {
        let _ = self.cancel(key);
        let due = due.max(self.now);
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        let _ = self.queue.insert((due, sequence), (key, round));
        let _ = self.slots.insert(key, (due, sequence));
    }

    pub(crate) fn cancel(&mut self, key: TaskKey) -> bool {
        match self.slots.remove(&key) {
            Some(slot) => self.queue.remove(&slot).is_some(),
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
        self.slots.clear();
    }

    pub(crate) fn is_scheduled(&self, key: TaskKey) -> bool {
        self.slots.contains_key(&key)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Removes the earliest task due at or before `until` and moves the clock
    /// to its due instant.
    pub(crate) fn pop_due(&mut self, until: Duration) -> Option<DueTask> {
        let (&(due, sequence), &(key, round)) = self.queue.iter().next()?;
        if due > until {
            return None;
        }

        let _ = self.queue.remove(&(due, sequence));
        let _ = self.slots.remove(&key);
        self.now = self.now.max(due);
        Some(DueTask { key, round, due })
    }

    pub(crate) fn advance_to(&mut self, instant: Duration) {
        self.now = self.now.max(instant);
    }
}
