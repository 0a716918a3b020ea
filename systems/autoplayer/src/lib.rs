#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Simulated player that reacts to spawned items with collection commands.
//!
//! The autoplayer only sees the event stream. It notices an item when the
//! spawn event arrives, waits out its reaction delay and then clicks the item
//! if it is still on the grid. Positive items are always clicked; negative
//! items are clicked with the configured misclick probability.

use std::{collections::BTreeMap, time::Duration};

use can_rush_core::{Command, Event, ItemId};
use log::trace;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Configuration parameters required to construct the autoplayer.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    reaction: Duration,
    misclick_rate: f64,
    rng_seed: u64,
}

impl Config {
    /// Creates a configuration with the given reaction delay, probability of
    /// clicking a negative item and seed.
    ///
    /// The misclick rate is clamped to `[0, 1]`; NaN counts as zero.
    #[must_use]
    pub fn new(reaction: Duration, misclick_rate: f64, rng_seed: u64) -> Self {
        let misclick_rate = if misclick_rate.is_nan() {
            0.0
        } else {
            misclick_rate.clamp(0.0, 1.0)
        };
        Self {
            reaction,
            misclick_rate,
            rng_seed,
        }
    }

    /// Delay between noticing an item and clicking it.
    #[must_use]
    pub fn reaction(&self) -> Duration {
        self.reaction
    }

    /// Probability of clicking a negative item.
    #[must_use]
    pub fn misclick_rate(&self) -> f64 {
        self.misclick_rate
    }
}

/// Pure system that turns item events into collection commands.
#[derive(Debug)]
pub struct Autoplayer {
    reaction: Duration,
    misclick_rate: f64,
    rng: ChaCha8Rng,
    elapsed: Duration,
    tick_start: Duration,
    active: bool,
    targets: BTreeMap<ItemId, Duration>,
}

impl Autoplayer {
    /// Creates a new autoplayer using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            reaction: config.reaction,
            misclick_rate: config.misclick_rate,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            elapsed: Duration::ZERO,
            tick_start: Duration::ZERO,
            active: false,
            targets: BTreeMap::new(),
        }
    }

    /// Consumes the events of the last step and emits collection commands
    /// for every target whose reaction delay has passed.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        self.tick_start = self.elapsed;
        for event in events {
            match event {
                Event::RoundStarted { .. } => {
                    self.active = true;
                    self.targets.clear();
                }
                Event::RoundEnded { .. } | Event::RoundReset => {
                    self.active = false;
                    self.targets.clear();
                }
                Event::TimeAdvanced { dt } => {
                    self.tick_start = self.elapsed;
                    self.elapsed = self.elapsed.saturating_add(*dt);
                }
                // Spawns follow the tick's `TimeAdvanced`, so the item
                // appeared no earlier than the start of that tick.
                Event::ItemSpawned { item, negative, .. } => {
                    if self.active && self.wants(*negative) {
                        let _ = self.targets.insert(*item, self.tick_start);
                    }
                }
                Event::ItemRemoved { item, .. } => {
                    let _ = self.targets.remove(item);
                }
                _ => {}
            }
        }

        if !self.active {
            return;
        }

        let ready: Vec<ItemId> = self
            .targets
            .iter()
            .filter(|(_, noticed)| self.elapsed.saturating_sub(**noticed) >= self.reaction)
            .map(|(item, _)| *item)
            .collect();

        for item in ready {
            let _ = self.targets.remove(&item);
            trace!("clicking item {}", item.get());
            out.push(Command::CollectItem { item });
        }
    }

    /// Number of items the autoplayer still intends to click.
    #[must_use]
    pub fn pending_targets(&self) -> usize {
        self.targets.len()
    }

    fn wants(&mut self, negative: bool) -> bool {
        !negative || self.rng.gen_bool(self.misclick_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_rush_core::{CellIndex, Difficulty, RemovalCause};

    fn started() -> Event {
        Event::RoundStarted {
            difficulty: Difficulty::Normal,
            endless: false,
            goal_percent: Some(100),
            remaining_seconds: 30,
        }
    }

    fn spawned(id: u32, negative: bool) -> Event {
        Event::ItemSpawned {
            item: ItemId::new(id),
            cell: CellIndex::new(id),
            negative,
            lifetime: Duration::from_secs(4),
        }
    }

    fn advanced(millis: u64) -> Event {
        Event::TimeAdvanced {
            dt: Duration::from_millis(millis),
        }
    }

    #[test]
    fn waits_for_the_reaction_delay() {
        let mut autoplayer =
            Autoplayer::new(Config::new(Duration::from_millis(300), 0.0, 1));
        let mut commands = Vec::new();

        autoplayer.handle(&[started(), spawned(0, false)], &mut commands);
        assert!(commands.is_empty());

        autoplayer.handle(&[advanced(299)], &mut commands);
        assert!(commands.is_empty());

        autoplayer.handle(&[advanced(1)], &mut commands);
        assert_eq!(
            commands,
            vec![Command::CollectItem {
                item: ItemId::new(0)
            }]
        );
        assert_eq!(autoplayer.pending_targets(), 0);
    }

    #[test]
    fn reaction_counts_from_the_start_of_the_spawning_tick() {
        let config = Config::new(Duration::from_millis(300), 0.0, 1);
        assert_eq!(config.reaction(), Duration::from_millis(300));
        let mut autoplayer = Autoplayer::new(config);
        let mut commands = Vec::new();

        autoplayer.handle(&[started()], &mut commands);
        autoplayer.handle(&[advanced(100), spawned(3, false)], &mut commands);
        assert!(commands.is_empty());

        autoplayer.handle(&[advanced(200)], &mut commands);
        assert_eq!(
            commands,
            vec![Command::CollectItem {
                item: ItemId::new(3)
            }]
        );
    }

    #[test]
    fn skips_negative_items_without_misclicks() {
        let mut autoplayer = Autoplayer::new(Config::new(Duration::ZERO, 0.0, 1));
        let mut commands = Vec::new();

        autoplayer.handle(
            &[started(), spawned(0, true), spawned(1, false)],
            &mut commands,
        );

        assert_eq!(
            commands,
            vec![Command::CollectItem {
                item: ItemId::new(1)
            }]
        );
    }

    #[test]
    fn certain_misclicks_take_negative_items() {
        let mut autoplayer = Autoplayer::new(Config::new(Duration::ZERO, 1.0, 1));
        let mut commands = Vec::new();

        autoplayer.handle(&[started(), spawned(4, true)], &mut commands);

        assert_eq!(
            commands,
            vec![Command::CollectItem {
                item: ItemId::new(4)
            }]
        );
    }

    #[test]
    fn forgets_items_removed_before_reacting() {
        let mut autoplayer =
            Autoplayer::new(Config::new(Duration::from_millis(500), 0.0, 1));
        let mut commands = Vec::new();

        autoplayer.handle(&[started(), spawned(2, false)], &mut commands);
        autoplayer.handle(
            &[
                advanced(400),
                Event::ItemRemoved {
                    item: ItemId::new(2),
                    cell: CellIndex::new(2),
                    cause: RemovalCause::Expired,
                },
            ],
            &mut commands,
        );
        autoplayer.handle(&[advanced(400)], &mut commands);

        assert!(commands.is_empty());
    }

    #[test]
    fn idle_between_rounds() {
        let mut autoplayer = Autoplayer::new(Config::new(Duration::ZERO, 1.0, 1));
        let mut commands = Vec::new();

        autoplayer.handle(&[spawned(0, false)], &mut commands);
        autoplayer.handle(&[started(), spawned(1, false), Event::RoundReset], &mut commands);
        autoplayer.handle(&[advanced(1_000)], &mut commands);

        assert!(commands.is_empty());
        assert_eq!(autoplayer.pending_targets(), 0);
    }

    #[test]
    fn misclick_rate_is_clamped() {
        assert_eq!(Config::new(Duration::ZERO, 3.0, 0).misclick_rate(), 1.0);
        assert_eq!(Config::new(Duration::ZERO, -1.0, 0).misclick_rate(), 0.0);
        assert_eq!(Config::new(Duration::ZERO, f64::NAN, 0).misclick_rate(), 0.0);
    }
}
