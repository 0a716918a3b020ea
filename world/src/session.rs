//! Round counters and goal tracking.

use can_rush_core::{SessionSnapshot, CONTAINER_CAPACITY, FILL_PER_ITEM, TOTAL_PERCENT_CAP};

/// Side effects of a single collection that the controller must act upon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct CollectionEffect {
    /// The container reached capacity and counts as filled.
    pub(crate) container_filled: bool,
    /// The goal was reached for the first time this round.
    pub(crate) goal_newly_reached: bool,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct SessionState {
    container_percent: u32,
    total_percent: u32,
    clicked: u32,
    filled_containers: u32,
    goal_reached: bool,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Scores a collected item. `goal` is `None` in endless mode.
    pub(crate) fn apply_collection(&mut self, negative: bool, goal: Option<u32>) -> CollectionEffect {
        self.clicked = self.clicked.saturating_add(1);

        if negative {
            self.container_percent = self.container_percent.saturating_sub(FILL_PER_ITEM);
            self.total_percent = self.total_percent.saturating_sub(FILL_PER_ITEM);
        } else {
            self.container_percent = self
                .container_percent
                .saturating_add(FILL_PER_ITEM)
                .min(CONTAINER_CAPACITY);
            self.total_percent = self
                .total_percent
                .saturating_add(FILL_PER_ITEM)
                .min(TOTAL_PERCENT_CAP);
        }

        let container_filled = !negative && self.container_percent >= CONTAINER_CAPACITY;
        if container_filled {
            self.filled_containers = self.filled_containers.saturating_add(1);
        }

        let goal_newly_reached = match goal {
            Some(goal) if !self.goal_reached && self.total_percent >= goal => {
                self.goal_reached = true;
                true
            }
            _ => false,
        };

        CollectionEffect {
            container_filled,
            goal_newly_reached,
        }
    }

    pub(crate) fn empty_container(&mut self) {
        self.container_percent = 0;
    }

    pub(crate) fn container_percent(&self) -> u32 {
        self.container_percent
    }

    pub(crate) fn total_percent(&self) -> u32 {
        self.total_percent
    }

    pub(crate) fn clicked(&self) -> u32 {
        self.clicked
    }

    pub(crate) fn filled_containers(&self) -> u32 {
        self.filled_containers
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            container_percent: self.container_percent,
            total_percent: self.total_percent,
            clicked: self.clicked,
            filled_containers: self.filled_containers,
            goal_reached: self.goal_reached,
        }
    }
}
