#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Presentation contract for Can Rush adapters.
//!
//! Adapters implement [`Presenter`] and feed every batch of world events
//! through [`dispatch`]. [`Hud`] is a ready-made presenter that mirrors what
//! a player would see on screen.

use std::{fmt::Write as _, time::Duration};

use can_rush_core::{
    Celebration, CellIndex, Difficulty, Event, RoundOutcome, GOAL_REACHED_MESSAGE, ROUND_SECONDS,
};
use serde::Serialize;

/// Receives presentation notifications derived from world events.
pub trait Presenter {
    /// An item appeared in `cell` and will vanish after `lifetime`.
    fn on_item_spawned(&mut self, cell: CellIndex, negative: bool, lifetime: Duration);

    /// The item in `cell` was collected or expired.
    fn on_item_removed(&mut self, cell: CellIndex);

    /// The container fill changed.
    fn on_container_changed(&mut self, percent: u32);

    /// The click or filled-container counters changed.
    fn on_counters_changed(&mut self, clicked: u32, filled_containers: u32);

    /// The round finished with a definite outcome.
    fn on_round_ended(&mut self, outcome: RoundOutcome);

    /// The goal was reached for the first time this round.
    fn on_goal_reached(&mut self, celebration: Celebration);

    /// The countdown moved on.
    fn on_countdown(&mut self, _remaining_seconds: u32) {}

    /// The grid was rebuilt with `size × size` empty cells.
    fn on_grid_resized(&mut self, _size: u32) {}

    /// A round started.
    fn on_round_started(&mut self, _difficulty: Difficulty, _endless: bool, _goal: Option<u32>) {}

    /// The goal badge should disappear.
    fn on_goal_badge_hidden(&mut self) {}

    /// The round was reset to idle.
    fn on_round_reset(&mut self) {}
}

/// Routes each event to the matching presenter callback, in order.
pub fn dispatch<P: Presenter + ?Sized>(events: &[Event], presenter: &mut P) {
    for event in events {
        match *event {
            Event::TimeAdvanced { .. } => {}
            Event::RoundStarted {
                difficulty,
                endless,
                goal_percent,
                ..
            } => presenter.on_round_started(difficulty, endless, goal_percent),
            Event::GridResized { size } => presenter.on_grid_resized(size),
            Event::ItemSpawned {
                cell,
                negative,
                lifetime,
                ..
            } => presenter.on_item_spawned(cell, negative, lifetime),
            Event::ItemRemoved { cell, .. } => presenter.on_item_removed(cell),
            Event::ContainerChanged { percent } => presenter.on_container_changed(percent),
            Event::CountersChanged {
                clicked,
                filled_containers,
            } => presenter.on_counters_changed(clicked, filled_containers),
            Event::CountdownTicked { remaining_seconds } => {
                presenter.on_countdown(remaining_seconds);
            }
            Event::GoalReached { celebration } => presenter.on_goal_reached(celebration),
            Event::GoalBadgeHidden => presenter.on_goal_badge_hidden(),
            Event::RoundEnded { outcome } => presenter.on_round_ended(outcome),
            Event::RoundReset => presenter.on_round_reset(),
        }
    }
}

/// Visual content of a single grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellView {
    /// Nothing to click.
    #[default]
    Empty,
    /// A can that fills the container.
    Positive,
    /// A can that drains the container.
    Negative,
}

impl CellView {
    fn glyph(self) -> char {
        match self {
            Self::Empty => '.',
            Self::Positive => '+',
            Self::Negative => '-',
        }
    }
}

/// Presenter that keeps the on-screen state of a round.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Hud {
    size: u32,
    cells: Vec<CellView>,
    container_percent: u32,
    clicked: u32,
    filled_containers: u32,
    remaining_seconds: u32,
    goal_badge: bool,
    achievement: Option<String>,
    banner: Option<String>,
    celebration: Celebration,
}

impl Hud {
    /// Creates a HUD for an empty `size × size` grid.
    #[must_use]
    pub fn new(size: u32) -> Self {
        Self {
            size,
            cells: vec![CellView::Empty; cell_count(size)],
            container_percent: 0,
            clicked: 0,
            filled_containers: 0,
            remaining_seconds: ROUND_SECONDS,
            goal_badge: false,
            achievement: None,
            banner: None,
            celebration: Celebration::None,
        }
    }

    /// Content of `cell`, or `None` when it lies outside the grid.
    #[must_use]
    pub fn cell(&self, cell: CellIndex) -> Option<CellView> {
        self.cells.get(cell.get() as usize).copied()
    }

    /// Container fill shown on the gauge.
    #[must_use]
    pub fn container_percent(&self) -> u32 {
        self.container_percent
    }

    /// Seconds shown on the countdown.
    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    /// Whether the goal badge is showing.
    #[must_use]
    pub fn goal_badge(&self) -> bool {
        self.goal_badge
    }

    /// Text of the achievements line: the goal notice, then the end message.
    #[must_use]
    pub fn achievement(&self) -> Option<&str> {
        self.achievement.as_deref()
    }

    /// End-of-round message, once the round ended.
    #[must_use]
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// Size of the most recent celebration.
    #[must_use]
    pub fn celebration(&self) -> Celebration {
        self.celebration
    }

    /// Renders the grid as rows of `.`, `+` and `-` glyphs.
    #[must_use]
    pub fn render_grid(&self) -> String {
        let mut out = String::new();
        let width = self.size.max(1) as usize;
        for row in self.cells.chunks(width) {
            let line: Vec<String> = row.iter().map(|cell| cell.glyph().to_string()).collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    }

    /// One-line summary of the gauges and counters.
    #[must_use]
    pub fn status_line(&self) -> String {
        let mut line = String::new();
        let _ = write!(
            line,
            "{:>2}s | container {:>3}% | clicked {} | filled {}",
            self.remaining_seconds, self.container_percent, self.clicked, self.filled_containers
        );
        if self.goal_badge {
            line.push_str(" | GOAL!");
        }
        if let Some(achievement) = &self.achievement {
            let _ = write!(line, " | {achievement}");
        }
        line
    }

    fn set_cell(&mut self, cell: CellIndex, view: CellView) {
        if let Some(slot) = self.cells.get_mut(cell.get() as usize) {
            *slot = view;
        }
    }
}

impl Default for Hud {
    fn default() -> Self {
        Self::new(Difficulty::default().profile().grid_size())
    }
}

impl Presenter for Hud {
    fn on_item_spawned(&mut self, cell: CellIndex, negative: bool, _lifetime: Duration) {
        let view = if negative {
            CellView::Negative
        } else {
            CellView::Positive
        };
        self.set_cell(cell, view);
    }

    fn on_item_removed(&mut self, cell: CellIndex) {
        self.set_cell(cell, CellView::Empty);
    }

    fn on_container_changed(&mut self, percent: u32) {
        self.container_percent = percent;
    }

    fn on_counters_changed(&mut self, clicked: u32, filled_containers: u32) {
        self.clicked = clicked;
        self.filled_containers = filled_containers;
    }

    fn on_round_ended(&mut self, outcome: RoundOutcome) {
        self.banner = Some(outcome.message().to_owned());
        self.achievement = self.banner.clone();
        self.celebration = outcome.celebration;
    }

    fn on_goal_reached(&mut self, celebration: Celebration) {
        self.goal_badge = true;
        self.achievement = Some(GOAL_REACHED_MESSAGE.to_owned());
        self.celebration = celebration;
    }

    fn on_countdown(&mut self, remaining_seconds: u32) {
        self.remaining_seconds = remaining_seconds;
    }

    fn on_grid_resized(&mut self, size: u32) {
        self.size = size;
        self.cells = vec![CellView::Empty; cell_count(size)];
    }

    fn on_round_started(&mut self, _difficulty: Difficulty, _endless: bool, _goal: Option<u32>) {
        self.remaining_seconds = ROUND_SECONDS;
        self.goal_badge = false;
        self.achievement = None;
        self.banner = None;
        self.celebration = Celebration::None;
    }

    fn on_goal_badge_hidden(&mut self) {
        self.goal_badge = false;
    }

    fn on_round_reset(&mut self) {
        *self = Self::new(self.size);
    }
}

fn cell_count(size: u32) -> usize {
    let size = size as usize;
    size.saturating_mul(size)
}
