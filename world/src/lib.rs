#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative round state management for Can Rush.
//!
//! The [`World`] is the round controller. It owns the grid, the item
//! registry, the session counters and the scheduler that serialises every
//! timer of a round onto one queue. All mutation happens through [`apply`];
//! read access goes through the [`query`] module.

mod grid;
mod items;
mod scheduler;
mod session;

use std::{collections::BTreeMap, time::Duration};

use can_rush_core::{
    Celebration, Command, Difficulty, DifficultyProfile, EndReason, Event, ItemId, RemovalCause,
    RoundOutcome, RoundState, CONTAINER_RESET_DELAY, COUNTDOWN_INTERVAL, FILL_PER_ITEM,
    GOAL_BADGE_DURATION, ROUND_SECONDS,
};
use log::{debug, info};

use crate::{
    grid::GridModel,
    items::{Item, ItemRegistry},
    scheduler::{DueTask, Scheduler, TaskKey},
    session::SessionState,
};

/// Seed used by [`World::new`] for item placement.
pub const DEFAULT_SEED: u64 = 0x5eed_ca11_2024_0001;

/// Represents the authoritative Can Rush round state.
#[derive(Debug)]
pub struct World {
    state: RoundState,
    profiles: BTreeMap<Difficulty, DifficultyProfile>,
    difficulty: Difficulty,
    profile: DifficultyProfile,
    endless: bool,
    goal_percent: Option<u32>,
    remaining_seconds: u32,
    round: u64,
    outcome: Option<RoundOutcome>,
    session: SessionState,
    grid: GridModel,
    items: ItemRegistry,
    scheduler: Scheduler,
}

impl World {
    /// Creates an idle world using [`DEFAULT_SEED`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Creates an idle world whose item placement derives from `seed`.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        let profiles: BTreeMap<Difficulty, DifficultyProfile> = Difficulty::ALL
            .into_iter()
            .map(|difficulty| (difficulty, difficulty.profile()))
            .collect();
        let difficulty = Difficulty::default();
        let profile = difficulty.profile();
        Self {
            state: RoundState::Idle,
            profiles,
            difficulty,
            profile,
            endless: false,
            goal_percent: Some(profile.goal_percent()),
            remaining_seconds: ROUND_SECONDS,
            round: 0,
            outcome: None,
            session: SessionState::new(),
            grid: GridModel::new(profile.grid_size()),
            items: ItemRegistry::new(seed),
            scheduler: Scheduler::new(),
        }
    }

    fn profile_for(&self, difficulty: Difficulty) -> DifficultyProfile {
        self.profiles
            .get(&difficulty)
            .copied()
            .unwrap_or_else(|| difficulty.profile())
    }

    fn configure_profile(&mut self, difficulty: Difficulty, profile: DifficultyProfile) {
        if self.state != RoundState::Idle {
            debug!("ignoring profile change for {difficulty} outside idle");
            return;
        }
        let _ = self.profiles.insert(difficulty, profile);
    }

    fn preview(&mut self, difficulty: Difficulty, out_events: &mut Vec<Event>) {
        if self.state != RoundState::Idle {
            debug!("ignoring preview of {difficulty} while {:?}", self.state);
            return;
        }

        self.difficulty = difficulty;
        let size = self.profile_for(difficulty).grid_size();
        self.grid.initialize(size);
        out_events.push(Event::GridResized { size });
    }

    fn start(
        &mut self,
        difficulty: Difficulty,
        endless: bool,
        goal_percent: Option<u32>,
        out_events: &mut Vec<Event>,
    ) {
        if self.state != RoundState::Idle {
            debug!("ignoring start request while {:?}", self.state);
            return;
        }

        let profile = self.profile_for(difficulty);
        self.round = self.round.wrapping_add(1);
        self.difficulty = difficulty;
        self.profile = profile;
        self.endless = endless;
        self.goal_percent = if endless {
            None
        } else {
            Some(goal_percent.map_or(profile.goal_percent(), |goal| goal.max(FILL_PER_ITEM)))
        };
        self.session.reset();
        self.items.clear();
        self.scheduler.clear();
        self.grid.initialize(profile.grid_size());
        self.remaining_seconds = ROUND_SECONDS;
        self.outcome = None;
        self.state = RoundState::Active;

        info!(
            "round {} started at {difficulty} (endless: {endless}, goal: {:?})",
            self.round, self.goal_percent
        );
        out_events.push(Event::RoundStarted {
            difficulty,
            endless,
            goal_percent: self.goal_percent,
            remaining_seconds: self.remaining_seconds,
        });
        out_events.push(Event::GridResized {
            size: profile.grid_size(),
        });
        self.push_counters(out_events);

        self.spawn_tick(out_events);
        self.scheduler
            .schedule_in(TaskKey::SpawnTicker, self.round, profile.spawn_interval());
        self.scheduler
            .schedule_in(TaskKey::Countdown, self.round, COUNTDOWN_INTERVAL);
    }

    fn reset(&mut self, out_events: &mut Vec<Event>) {
        self.scheduler.clear();
        self.session.reset();
        self.items.clear();
        let size = self.profile_for(self.difficulty).grid_size();
        self.grid.initialize(size);
        self.remaining_seconds = ROUND_SECONDS;
        self.outcome = None;
        self.state = RoundState::Idle;

        info!("round reset");
        out_events.push(Event::RoundReset);
        out_events.push(Event::GridResized { size });
        self.push_counters(out_events);
    }

    fn collect(&mut self, item: ItemId, out_events: &mut Vec<Event>) {
        if self.state != RoundState::Active {
            debug!("ignoring collection of item {} while {:?}", item.get(), self.state);
            return;
        }

        let Some(result) = self
            .items
            .collect(item, &mut self.grid, &mut self.scheduler)
        else {
            debug!("ignoring collection of unknown item {}", item.get());
            return;
        };

        out_events.push(Event::ItemRemoved {
            item,
            cell: result.cell,
            cause: RemovalCause::Collected {
                negative: result.negative,
            },
        });

        let effect = self
            .session
            .apply_collection(result.negative, self.goal_percent);
        self.push_counters(out_events);

        if effect.container_filled {
            let ordinal = self.session.filled_containers();
            self.scheduler.schedule_in(
                TaskKey::ContainerReset(ordinal),
                self.round,
                CONTAINER_RESET_DELAY,
            );
        }

        if effect.goal_newly_reached {
            info!("goal reached at {}%", self.session.total_percent());
            out_events.push(Event::GoalReached {
                celebration: Celebration::Big,
            });
            self.scheduler
                .schedule_in(TaskKey::GoalBadge, self.round, GOAL_BADGE_DURATION);
        }
    }

    fn advance(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let until = self.scheduler.now().saturating_add(dt);
        while let Some(task) = self.scheduler.pop_due(until) {
            if task.round != self.round {
                debug!("dropping stale {:?} from round {}", task.key, task.round);
                continue;
            }
            self.run_task(task, out_events);
        }
        self.scheduler.advance_to(until);
    }

    fn run_task(&mut self, task: DueTask, out_events: &mut Vec<Event>) {
        match task.key {
            TaskKey::SpawnTicker => {
                if self.state != RoundState::Active {
                    return;
                }
                self.spawn_tick(out_events);
                let next = task.due.saturating_add(self.profile.spawn_interval());
                self.scheduler
                    .schedule_at(TaskKey::SpawnTicker, self.round, next);
            }
            TaskKey::Countdown => self.countdown_tick(task.due, out_events),
            TaskKey::ItemExpiry(item) => {
                if let Some(expired) = self.items.expire(item, &mut self.grid) {
                    out_events.push(Event::ItemRemoved {
                        item,
                        cell: expired.cell,
                        cause: RemovalCause::Expired,
                    });
                }
            }
            TaskKey::ContainerReset(_) => {
                self.session.empty_container();
                out_events.push(Event::ContainerChanged {
                    percent: self.session.container_percent(),
                });
            }
            TaskKey::GoalBadge => out_events.push(Event::GoalBadgeHidden),
        }
    }

    fn spawn_tick(&mut self, out_events: &mut Vec<Event>) {
        let spawned = self.items.spawn_tick(
            &self.profile,
            &mut self.grid,
            &mut self.scheduler,
            self.round,
        );
        out_events.extend(spawned.into_iter().map(|item: Item| Event::ItemSpawned {
            item: item.id,
            cell: item.cell,
            negative: item.negative,
            lifetime: item.lifetime,
        }));
    }

    fn countdown_tick(&mut self, due: Duration, out_events: &mut Vec<Event>) {
        if self.state != RoundState::Active {
            return;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        out_events.push(Event::CountdownTicked {
            remaining_seconds: self.remaining_seconds,
        });

        if self.remaining_seconds > 0 {
            let next = due.saturating_add(COUNTDOWN_INTERVAL);
            self.scheduler
                .schedule_at(TaskKey::Countdown, self.round, next);
            return;
        }

        let reason = match self.goal_percent {
            None => EndReason::EndlessTimeRanOut,
            Some(goal) if self.session.total_percent() >= goal => EndReason::GoalReached,
            Some(_) => EndReason::TimeUp,
        };
        self.end(RoundOutcome::from_reason(reason), out_events);
    }

    /// Stops the round timers and records the outcome. Items still on the
    /// grid keep their expiry, and a pending container reset still applies.
    fn end(&mut self, outcome: RoundOutcome, out_events: &mut Vec<Event>) {
        let _ = self.scheduler.cancel(TaskKey::SpawnTicker);
        let _ = self.scheduler.cancel(TaskKey::Countdown);
        self.state = RoundState::Ended;
        self.outcome = Some(outcome);

        info!(
            "round {} ended: {} ({}%)",
            self.round,
            outcome.message(),
            self.session.total_percent()
        );
        out_events.push(Event::RoundEnded { outcome });
    }

    fn push_counters(&self, out_events: &mut Vec<Event>) {
        out_events.push(Event::ContainerChanged {
            percent: self.session.container_percent(),
        });
        out_events.push(Event::CountersChanged {
            clicked: self.session.clicked(),
            filled_containers: self.session.filled_containers(),
        });
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Requests that make no sense in the current state (starting twice,
/// collecting a vanished item, previewing mid-round) are ignored and produce
/// no events.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureProfile {
            difficulty,
            profile,
        } => world.configure_profile(difficulty, profile),
        Command::StartRound {
            difficulty,
            endless,
            goal_percent,
        } => world.start(difficulty, endless, goal_percent, out_events),
        Command::ResetRound => world.reset(out_events),
        Command::CollectItem { item } => world.collect(item, out_events),
        Command::PreviewDifficulty { difficulty } => world.preview(difficulty, out_events),
        Command::Tick { dt } => {
            out_events.push(Event::TimeAdvanced { dt });
            world.advance(dt, out_events);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use super::{GridModel, TaskKey, World};
    use can_rush_core::{
        CellIndex, Difficulty, DifficultyProfile, ItemId, ItemSnapshot, RoundOutcome, RoundState,
        SessionSnapshot,
    };

    /// Current lifecycle phase.
    #[must_use]
    pub fn round_state(world: &World) -> RoundState {
        world.state
    }

    /// Difficulty of the running round, or the one last previewed.
    #[must_use]
    pub fn difficulty(world: &World) -> Difficulty {
        world.difficulty
    }

    /// Profile in effect for the current or most recent round.
    #[must_use]
    pub fn profile(world: &World) -> DifficultyProfile {
        world.profile
    }

    /// Profile that a round started at `difficulty` would use.
    #[must_use]
    pub fn profile_for(world: &World, difficulty: Difficulty) -> DifficultyProfile {
        world.profile_for(difficulty)
    }

    /// Whether the current or most recent round runs in endless mode.
    #[must_use]
    pub fn is_endless(world: &World) -> bool {
        world.endless
    }

    /// Goal of the current or most recent round, `None` in endless mode.
    #[must_use]
    pub fn goal_percent(world: &World) -> Option<u32> {
        world.goal_percent
    }

    /// Whole seconds left on the countdown.
    #[must_use]
    pub fn remaining_seconds(world: &World) -> u32 {
        world.remaining_seconds
    }

    /// Result of the round once it ended.
    #[must_use]
    pub fn outcome(world: &World) -> Option<RoundOutcome> {
        world.outcome
    }

    /// Copy of the round counters.
    #[must_use]
    pub fn session(world: &World) -> SessionSnapshot {
        world.session.snapshot()
    }

    /// Current instant of the world clock.
    #[must_use]
    pub fn now(world: &World) -> Duration {
        world.scheduler.now()
    }

    /// Reports whether the spawn ticker and countdown are armed.
    #[must_use]
    pub fn round_timers_armed(world: &World) -> bool {
        world.scheduler.is_scheduled(TaskKey::SpawnTicker)
            && world.scheduler.is_scheduled(TaskKey::Countdown)
    }

    /// Number of timers waiting to fire.
    #[must_use]
    pub fn pending_tasks(world: &World) -> usize {
        world.scheduler.len()
    }

    /// Live items in identifier order.
    #[must_use]
    pub fn live_items(world: &World) -> Vec<ItemSnapshot> {
        let now = world.scheduler.now();
        world.items.live().map(|item| item.snapshot(now)).collect()
    }

    /// Snapshot of a live item, if it still exists.
    #[must_use]
    pub fn item(world: &World, id: ItemId) -> Option<ItemSnapshot> {
        world
            .items
            .get_live(id)
            .map(|item| item.snapshot(world.scheduler.now()))
    }

    /// Exposes a read-only view of the grid occupancy.
    #[must_use]
    pub fn grid_view(world: &World) -> GridView<'_> {
        GridView { grid: &world.grid }
    }

    /// Read-only view into the occupancy grid.
    #[derive(Clone, Copy, Debug)]
    pub struct GridView<'a> {
        grid: &'a GridModel,
    }

    impl<'a> GridView<'a> {
        /// Side length of the square grid.
        #[must_use]
        pub fn size(&self) -> u32 {
            self.grid.size()
        }

        /// Returns the item occupying the provided cell, if any.
        #[must_use]
        pub fn occupant(&self, cell: CellIndex) -> Option<ItemId> {
            self.grid.occupant(cell)
        }

        /// Unoccupied cells in scan order.
        #[must_use]
        pub fn empty_cells(&self) -> Vec<CellIndex> {
            self.grid.empty_cells()
        }

        /// Returns an iterator over all cells in scan order.
        pub fn iter(&self) -> impl Iterator<Item = Option<ItemId>> + 'a {
            self.grid.cells().iter().copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_rush_core::{CellIndex, SessionSnapshot};

    fn calm_profile() -> DifficultyProfile {
        DifficultyProfile::new(Duration::from_millis(600), 1, 0.0, 1, 3)
    }

    fn started_world() -> (World, Vec<Event>) {
        let mut world = World::with_seed(9);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::ConfigureProfile {
                difficulty: Difficulty::Normal,
                profile: calm_profile(),
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::StartRound {
                difficulty: Difficulty::Normal,
                endless: false,
                goal_percent: None,
            },
            &mut events,
        );
        (world, events)
    }

    fn first_live_item(world: &World) -> ItemId {
        query::live_items(world)
            .first()
            .map(|item| item.id)
            .expect("a live item")
    }

    #[test]
    fn new_world_is_idle_with_default_grid() {
        let world = World::new();
        assert_eq!(query::round_state(&world), RoundState::Idle);
        assert_eq!(query::grid_view(&world).size(), 3);
        assert_eq!(query::remaining_seconds(&world), ROUND_SECONDS);
        assert_eq!(query::pending_tasks(&world), 0);
    }

    #[test]
    fn start_spawns_immediately_and_arms_timers() {
        let (world, events) = started_world();

        assert_eq!(query::round_state(&world), RoundState::Active);
        assert!(query::round_timers_armed(&world));
        assert_eq!(query::live_items(&world).len(), 1);
        assert_eq!(query::goal_percent(&world), Some(100));
        assert_eq!(query::profile(&world), calm_profile());
        assert!(matches!(events.first(), Some(Event::RoundStarted { .. })));
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::ItemSpawned { negative: false, .. })));
    }

    #[test]
    fn start_while_active_is_ignored() {
        let (mut world, _) = started_world();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::StartRound {
                difficulty: Difficulty::Hard,
                endless: true,
                goal_percent: None,
            },
            &mut events,
        );

        assert!(events.is_empty());
        assert_eq!(query::difficulty(&world), Difficulty::Normal);
        assert!(!query::is_endless(&world));
    }

    #[test]
    fn spawn_ticker_rearms_each_interval() {
        let (mut world, _) = started_world();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(1_800),
            },
            &mut events,
        );

        let spawned = events
            .iter()
            .filter(|event| matches!(event, Event::ItemSpawned { .. }))
            .count();
        assert_eq!(spawned, 3);
        assert_eq!(query::live_items(&world).len(), 4);
        assert_eq!(query::now(&world), Duration::from_millis(1_800));
    }

    #[test]
    fn collecting_updates_counters_and_frees_the_cell() {
        let (mut world, _) = started_world();
        let item = first_live_item(&world);
        let cell = query::item(&world, item).expect("live").cell;
        let mut events = Vec::new();

        apply(&mut world, Command::CollectItem { item }, &mut events);

        assert_eq!(
            events,
            vec![
                Event::ItemRemoved {
                    item,
                    cell,
                    cause: RemovalCause::Collected { negative: false },
                },
                Event::ContainerChanged { percent: 20 },
                Event::CountersChanged {
                    clicked: 1,
                    filled_containers: 0,
                },
            ]
        );
        assert_eq!(query::grid_view(&world).occupant(cell), None);
    }

    #[test]
    fn collecting_twice_changes_nothing() {
        let (mut world, _) = started_world();
        let item = first_live_item(&world);
        let mut events = Vec::new();
        apply(&mut world, Command::CollectItem { item }, &mut events);
        let before = query::session(&world);

        events.clear();
        apply(&mut world, Command::CollectItem { item }, &mut events);

        assert!(events.is_empty());
        assert_eq!(query::session(&world), before);
    }

    #[test]
    fn items_expire_after_their_lifetime() {
        let (mut world, _) = started_world();
        let item = first_live_item(&world);
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(4_000),
            },
            &mut events,
        );

        assert!(events.iter().any(|event| matches!(
            event,
            Event::ItemRemoved { item: removed, cause: RemovalCause::Expired, .. } if *removed == item
        )));
        assert!(query::item(&world, item).is_none());

        events.clear();
        apply(&mut world, Command::CollectItem { item }, &mut events);
        assert!(events.is_empty(), "expired items cannot be collected");
        assert_eq!(query::session(&world).clicked, 0);
    }

    #[test]
    fn preview_resizes_only_while_idle() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::PreviewDifficulty {
                difficulty: Difficulty::Hard,
            },
            &mut events,
        );
        assert_eq!(events, vec![Event::GridResized { size: 4 }]);
        assert_eq!(query::grid_view(&world).size(), 4);

        let (mut active, _) = started_world();
        events.clear();
        apply(
            &mut active,
            Command::PreviewDifficulty {
                difficulty: Difficulty::Hard,
            },
            &mut events,
        );
        assert!(events.is_empty());
        assert_eq!(query::grid_view(&active).size(), 3);
        assert_eq!(query::session(&active).clicked, 0);
    }

    #[test]
    fn explicit_goal_is_clamped_to_one_item() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::StartRound {
                difficulty: Difficulty::Easy,
                endless: false,
                goal_percent: Some(5),
            },
            &mut events,
        );
        assert_eq!(query::goal_percent(&world), Some(FILL_PER_ITEM));
    }

    #[test]
    fn endless_mode_ignores_explicit_goal() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::StartRound {
                difficulty: Difficulty::Easy,
                endless: true,
                goal_percent: Some(300),
            },
            &mut events,
        );
        assert_eq!(query::goal_percent(&world), None);
        assert!(query::is_endless(&world));
    }

    #[test]
    fn profile_changes_are_ignored_mid_round() {
        let (mut world, _) = started_world();
        let mut events = Vec::new();
        let crowded = DifficultyProfile::new(Duration::from_millis(100), 4, 1.0, 3, 5);
        apply(
            &mut world,
            Command::ConfigureProfile {
                difficulty: Difficulty::Normal,
                profile: crowded,
            },
            &mut events,
        );
        assert_eq!(query::profile_for(&world, Difficulty::Normal), calm_profile());
    }

    #[test]
    fn reset_cancels_every_timer() {
        let (mut world, _) = started_world();
        let item = first_live_item(&world);
        let mut events = Vec::new();
        for _ in 0..5 {
            let target = first_live_item(&world);
            apply(&mut world, Command::CollectItem { item: target }, &mut events);
            apply(
                &mut world,
                Command::Tick {
                    dt: Duration::from_millis(600),
                },
                &mut events,
            );
        }
        assert!(query::pending_tasks(&world) > 0);

        events.clear();
        apply(&mut world, Command::ResetRound, &mut events);

        assert_eq!(query::round_state(&world), RoundState::Idle);
        assert_eq!(query::pending_tasks(&world), 0);
        assert!(!query::round_timers_armed(&world));
        assert_eq!(query::session(&world), SessionSnapshot::default());
        assert!(query::live_items(&world).is_empty());
        assert!(query::item(&world, item).is_none());
        assert_eq!(query::grid_view(&world).empty_cells().len(), 9);
        assert_eq!(events.first(), Some(&Event::RoundReset));

        events.clear();
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_secs(10),
            },
            &mut events,
        );
        assert_eq!(events, vec![Event::TimeAdvanced { dt: Duration::from_secs(10) }]);
        assert!(query::grid_view(&world)
            .iter()
            .all(|slot| slot.is_none()));
        assert_eq!(query::grid_view(&world).occupant(CellIndex::new(0)), None);
    }
}
