#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Can Rush engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing player requests and the passage of time, the world executes
//! those commands via its `apply` entry point, and then broadcasts [`Event`]
//! values for presenters and systems to react to deterministically.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fill contributed (or drained) by a single collected item, in percent.
pub const FILL_PER_ITEM: u32 = 20;

/// Capacity of the visible container, in percent.
pub const CONTAINER_CAPACITY: u32 = 100;

/// Upper bound on the fill accumulated across a round, in percent.
pub const TOTAL_PERCENT_CAP: u32 = 10_000;

/// Time an item stays on the grid before it expires.
pub const ITEM_LIFETIME: Duration = Duration::from_millis(4_000);

/// Countdown budget every round starts with, in whole seconds.
pub const ROUND_SECONDS: u32 = 30;

/// Cadence of the round countdown.
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);

/// Pause during which a full container stays visible before it empties.
pub const CONTAINER_RESET_DELAY: Duration = Duration::from_millis(500);

/// Time the goal badge remains visible before it hides itself.
pub const GOAL_BADGE_DURATION: Duration = Duration::from_millis(4_500);

/// Achievement text shown while the goal badge is up.
pub const GOAL_REACHED_MESSAGE: &str = "Goal reached! Keep going until time runs out.";

/// Lifecycle phase of the round controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundState {
    /// No round is running; the grid may be previewed at any difficulty.
    Idle,
    /// Timers run and items spawn.
    Active,
    /// The countdown expired; a reset is required before playing again.
    Ended,
}

/// Difficulty presets recognised by the configuration resolver.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Difficulty {
    /// Slow spawns and few negative items.
    Easy,
    /// Baseline pacing.
    #[default]
    Normal,
    /// Fast, crowded spawns on a larger grid with a two-container goal.
    Hard,
}

impl Difficulty {
    /// Every difficulty in ascending order.
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Normal, Self::Hard];

    /// Lowercase key used by adapters to select the difficulty.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
        }
    }

    /// Resolves a key leniently, falling back to [`Difficulty::Normal`] for
    /// anything unrecognised.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        key.parse().unwrap_or(Self::Normal)
    }

    /// Concrete spawn and goal parameters for the difficulty.
    #[must_use]
    pub fn profile(self) -> DifficultyProfile {
        match self {
            Self::Easy => DifficultyProfile::new(Duration::from_millis(800), 1, 0.25, 1, 3),
            Self::Normal => DifficultyProfile::new(Duration::from_millis(600), 1, 0.4, 1, 3),
            Self::Hard => DifficultyProfile::new(Duration::from_millis(450), 2, 0.5, 2, 4),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|difficulty| difficulty.key().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownDifficulty(trimmed.to_owned()))
    }
}

/// Reported when a difficulty key does not name a known preset.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown difficulty '{0}', expected one of easy, normal, hard")]
pub struct UnknownDifficulty(pub String);

/// Immutable spawn and goal parameters selected for a round.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    spawn_interval: Duration,
    items_per_tick: u32,
    negative_probability: f64,
    containers_required: u32,
    grid_size: u32,
}

impl DifficultyProfile {
    /// Creates a profile from explicit parameters.
    ///
    /// Values are normalised so the profile always satisfies its invariants:
    /// the interval is at least one millisecond, counts are at least one and
    /// the probability lies within `0.0..=1.0`.
    #[must_use]
    pub fn new(
        spawn_interval: Duration,
        items_per_tick: u32,
        negative_probability: f64,
        containers_required: u32,
        grid_size: u32,
    ) -> Self {
        let spawn_interval = if spawn_interval.is_zero() {
            Duration::from_millis(1)
        } else {
            spawn_interval
        };
        let negative_probability = if negative_probability.is_nan() {
            0.0
        } else {
            negative_probability.clamp(0.0, 1.0)
        };
        Self {
            spawn_interval,
            items_per_tick: at_least_one(items_per_tick),
            negative_probability,
            containers_required: at_least_one(containers_required),
            grid_size: at_least_one(grid_size),
        }
    }

    /// Delay between successive spawn ticks.
    #[must_use]
    pub const fn spawn_interval(&self) -> Duration {
        self.spawn_interval
    }

    /// Number of spawn attempts made on every tick.
    #[must_use]
    pub const fn items_per_tick(&self) -> u32 {
        self.items_per_tick
    }

    /// Probability that a spawned item drains instead of fills.
    #[must_use]
    pub const fn negative_probability(&self) -> f64 {
        self.negative_probability
    }

    /// Number of full containers needed to reach the goal.
    #[must_use]
    pub const fn containers_required(&self) -> u32 {
        self.containers_required
    }

    /// Length of one side of the square grid.
    #[must_use]
    pub const fn grid_size(&self) -> u32 {
        self.grid_size
    }

    /// Total fill, in percent, that counts as reaching the goal.
    #[must_use]
    pub const fn goal_percent(&self) -> u32 {
        self.containers_required.saturating_mul(CONTAINER_CAPACITY)
    }
}

const fn at_least_one(value: u32) -> u32 {
    if value == 0 {
        1
    } else {
        value
    }
}

/// Maps a difficulty key to its profile, falling back to the normal preset.
#[must_use]
pub fn resolve(key: &str) -> DifficultyProfile {
    Difficulty::from_key(key).profile()
}

/// Grid size for a difficulty key, used to preview the grid while idle.
#[must_use]
pub fn grid_size_for(key: &str) -> u32 {
    resolve(key).grid_size()
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Replaces the profile used for a difficulty. Ignored unless idle.
    ConfigureProfile {
        /// Difficulty whose parameters are replaced.
        difficulty: Difficulty,
        /// Parameters to use for subsequent rounds at that difficulty.
        profile: DifficultyProfile,
    },
    /// Requests a new round. Ignored unless the world is idle.
    StartRound {
        /// Difficulty preset that drives spawning and the goal.
        difficulty: Difficulty,
        /// Whether the round succeeds by surviving the countdown.
        endless: bool,
        /// Explicit goal overriding the preset; ignored in endless mode.
        goal_percent: Option<u32>,
    },
    /// Cancels every pending timer and returns the world to idle.
    ResetRound,
    /// Reports that the player clicked an item.
    CollectItem {
        /// Identifier of the clicked item.
        item: ItemId,
    },
    /// Resizes the idle grid to preview a difficulty.
    PreviewDifficulty {
        /// Difficulty whose grid should be shown.
        difficulty: Difficulty,
    },
    /// Advances the world clock, firing every timer that falls due.
    Tick {
        /// Duration of time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Indicates that the world clock advanced.
    TimeAdvanced {
        /// Duration of time that elapsed in the tick.
        dt: Duration,
    },
    /// Announces that a round began.
    RoundStarted {
        /// Difficulty chosen for the round.
        difficulty: Difficulty,
        /// Whether the round runs in endless mode.
        endless: bool,
        /// Goal in percent, absent in endless mode.
        goal_percent: Option<u32>,
        /// Countdown budget in seconds.
        remaining_seconds: u32,
    },
    /// Reports that the grid was rebuilt with a new side length.
    GridResized {
        /// Side length of the square grid.
        size: u32,
    },
    /// Confirms that an item appeared in a cell.
    ItemSpawned {
        /// Identifier assigned to the item.
        item: ItemId,
        /// Cell the item occupies.
        cell: CellIndex,
        /// Whether collecting the item drains the container.
        negative: bool,
        /// Time before the item expires.
        lifetime: Duration,
    },
    /// Confirms that an item left its cell.
    ItemRemoved {
        /// Identifier of the removed item.
        item: ItemId,
        /// Cell the item vacated.
        cell: CellIndex,
        /// Why the item was removed.
        cause: RemovalCause,
    },
    /// Reports the visible container fill.
    ContainerChanged {
        /// Current container fill in percent.
        percent: u32,
    },
    /// Reports the click and filled-container counters.
    CountersChanged {
        /// Number of items clicked this round.
        clicked: u32,
        /// Number of containers filled this round.
        filled_containers: u32,
    },
    /// Reports the countdown after each one-second step.
    CountdownTicked {
        /// Whole seconds left in the round.
        remaining_seconds: u32,
    },
    /// Announces the first time the goal is reached in a round.
    GoalReached {
        /// Size of the celebration to present.
        celebration: Celebration,
    },
    /// Signals that the goal badge should be hidden.
    GoalBadgeHidden,
    /// Announces that the countdown expired and the round is over.
    RoundEnded {
        /// Result of the round.
        outcome: RoundOutcome,
    },
    /// Confirms that the world returned to idle.
    RoundReset,
}

/// Reason an item was taken off the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalCause {
    /// The player clicked the item before it expired.
    Collected {
        /// Whether the collected item drained the container.
        negative: bool,
    },
    /// The item's lifetime elapsed.
    Expired,
}

/// Size of the celebration accompanying a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Celebration {
    /// Nothing to celebrate.
    None,
    /// A modest burst.
    Standard,
    /// A large, long burst.
    Big,
}

/// Why a round ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    /// Endless mode survived the countdown.
    EndlessTimeRanOut,
    /// The accumulated fill met the goal when time ran out.
    GoalReached,
    /// Time ran out short of the goal.
    TimeUp,
}

impl EndReason {
    /// Message shown to the player for the reason.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::EndlessTimeRanOut => "Good job! Time ran out (Endless).",
            Self::GoalReached => "You reached the goal!",
            Self::TimeUp => "Time is up! You ran out of time.",
        }
    }
}

/// Definite result recorded when a round ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Whether the player won.
    pub success: bool,
    /// Why the round ended.
    pub reason: EndReason,
    /// Size of the celebration to present.
    pub celebration: Celebration,
}

impl RoundOutcome {
    /// Derives the outcome for a reason.
    #[must_use]
    pub const fn from_reason(reason: EndReason) -> Self {
        let (success, celebration) = match reason {
            EndReason::EndlessTimeRanOut | EndReason::GoalReached => (true, Celebration::Big),
            EndReason::TimeUp => (false, Celebration::None),
        };
        Self {
            success,
            reason,
            celebration,
        }
    }

    /// Message shown to the player.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.reason.message()
    }
}

/// Unique identifier assigned to an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(u32);

impl ItemId {
    /// Creates a new item identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Row-major index of a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIndex(u32);

impl CellIndex {
    /// Creates a new cell index.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the underlying index.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Column of the cell in a grid with the provided side length.
    #[must_use]
    pub const fn column(&self, grid_size: u32) -> u32 {
        if grid_size == 0 {
            0
        } else {
            self.0 % grid_size
        }
    }

    /// Row of the cell in a grid with the provided side length.
    #[must_use]
    pub const fn row(&self, grid_size: u32) -> u32 {
        if grid_size == 0 {
            0
        } else {
            self.0 / grid_size
        }
    }
}

/// Immutable representation of a live item used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    /// Identifier assigned to the item.
    pub id: ItemId,
    /// Cell occupied by the item.
    pub cell: CellIndex,
    /// Whether collecting the item drains the container.
    pub negative: bool,
    /// Clock instant at which the item spawned.
    pub created_at: Duration,
    /// Time left before the item expires.
    pub remaining: Duration,
}

/// Copy of the round counters used for queries and reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Visible container fill in percent.
    pub container_percent: u32,
    /// Fill accumulated across the round in percent.
    pub total_percent: u32,
    /// Items clicked this round.
    pub clicked: u32,
    /// Containers filled this round.
    pub filled_containers: u32,
    /// Whether the goal notification already fired.
    pub goal_reached: bool,
}
