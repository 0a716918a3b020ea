#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays a headless round of Can Rush.
//!
//! The binary drives the world clock in fixed steps and lets the autoplayer
//! click items, then prints the round result as text or JSON.

mod report;

use std::time::Duration;

use anyhow::{ensure, Context, Result};
use can_rush_core::{
    Celebration, CellIndex, Command, Difficulty, DifficultyProfile, RoundOutcome, RoundState,
    ROUND_SECONDS,
};
use can_rush_presentation::{dispatch, Hud, Presenter};
use can_rush_system_autoplayer::{Autoplayer, Config as AutoplayerConfig};
use can_rush_world::{self as world, query, World, DEFAULT_SEED};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};

use crate::report::{RoundReport, Tally};

/// Output format of the round summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "can-rush", version, about = "Plays a headless round of Can Rush")]
struct CliArgs {
    /// Difficulty key (easy, normal, hard). Unknown keys fall back to normal.
    #[arg(long, default_value = "normal")]
    difficulty: String,

    /// Survive the countdown instead of chasing a goal.
    #[arg(long)]
    endless: bool,

    /// Goal in percent, overriding the difficulty's containers. Ignored in endless mode.
    #[arg(long, value_name = "PERCENT")]
    goal: Option<u32>,

    /// Seed for item placement. The autoplayer derives its own seed from it.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Virtual time advanced per simulation step.
    #[arg(long, value_name = "MS", default_value_t = 100)]
    tick_ms: u64,

    /// Delay between an item appearing and the autoplayer clicking it.
    #[arg(long, value_name = "MS", default_value_t = 350)]
    reaction_ms: u64,

    /// Probability that the autoplayer clicks a negative item.
    #[arg(long, value_name = "P", default_value_t = 0.1)]
    misclick_rate: f64,

    /// Summary format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print the grid after every countdown second. With `--format json` the
    /// final screen is attached to the report instead.
    #[arg(long)]
    show_grid: bool,

    /// Override the spawn cadence of the selected difficulty.
    #[arg(long, value_name = "MS")]
    spawn_interval_ms: Option<u64>,

    /// Override the spawn attempts per tick of the selected difficulty.
    #[arg(long, value_name = "N")]
    items_per_tick: Option<u32>,

    /// Override the negative item probability of the selected difficulty.
    #[arg(long, value_name = "P")]
    negative_rate: Option<f64>,

    /// Override the containers required by the selected difficulty.
    #[arg(long, value_name = "N")]
    containers: Option<u32>,

    /// Override the grid side length of the selected difficulty.
    #[arg(long, value_name = "N")]
    grid_size: Option<u32>,
}

impl CliArgs {
    fn validate(&self) -> Result<()> {
        ensure!(self.tick_ms > 0, "--tick-ms must be greater than zero");
        ensure_probability(self.misclick_rate).context("invalid --misclick-rate")?;
        if let Some(rate) = self.negative_rate {
            ensure_probability(rate).context("invalid --negative-rate")?;
        }
        Ok(())
    }

    fn difficulty(&self) -> Difficulty {
        match self.difficulty.parse() {
            Ok(difficulty) => difficulty,
            Err(error) => {
                warn!("{error}; falling back to {}", Difficulty::Normal);
                Difficulty::Normal
            }
        }
    }

    /// Profile with the overrides applied, or `None` when no override was given.
    fn profile_override(&self, base: DifficultyProfile) -> Option<DifficultyProfile> {
        let overridden = self.spawn_interval_ms.is_some()
            || self.items_per_tick.is_some()
            || self.negative_rate.is_some()
            || self.containers.is_some()
            || self.grid_size.is_some();
        if !overridden {
            return None;
        }

        Some(DifficultyProfile::new(
            self.spawn_interval_ms
                .map_or(base.spawn_interval(), Duration::from_millis),
            self.items_per_tick.unwrap_or(base.items_per_tick()),
            self.negative_rate.unwrap_or(base.negative_probability()),
            self.containers.unwrap_or(base.containers_required()),
            self.grid_size.unwrap_or(base.grid_size()),
        ))
    }
}

fn ensure_probability(value: f64) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&value),
        "probability {value} is outside [0, 1]"
    );
    Ok(())
}

/// Presenter that keeps the HUD current and logs notable moments.
#[derive(Debug)]
struct ConsolePresenter {
    hud: Hud,
    show_grid: bool,
}

impl ConsolePresenter {
    fn new(show_grid: bool) -> Self {
        Self {
            hud: Hud::default(),
            show_grid,
        }
    }

    fn print_frame(&self) {
        println!("{}", self.hud.status_line());
        print!("{}", self.hud.render_grid());
    }
}

impl Presenter for ConsolePresenter {
    fn on_item_spawned(&mut self, cell: CellIndex, negative: bool, lifetime: Duration) {
        self.hud.on_item_spawned(cell, negative, lifetime);
    }

    fn on_item_removed(&mut self, cell: CellIndex) {
        self.hud.on_item_removed(cell);
    }

    fn on_container_changed(&mut self, percent: u32) {
        self.hud.on_container_changed(percent);
    }

    fn on_counters_changed(&mut self, clicked: u32, filled_containers: u32) {
        self.hud.on_counters_changed(clicked, filled_containers);
    }

    fn on_round_ended(&mut self, outcome: RoundOutcome) {
        self.hud.on_round_ended(outcome);
        if self.show_grid {
            self.print_frame();
        }
    }

    fn on_goal_reached(&mut self, celebration: Celebration) {
        info!("goal reached ({celebration:?} celebration)");
        self.hud.on_goal_reached(celebration);
    }

    fn on_countdown(&mut self, remaining_seconds: u32) {
        self.hud.on_countdown(remaining_seconds);
        if self.show_grid && remaining_seconds > 0 {
            self.print_frame();
        }
    }

    fn on_grid_resized(&mut self, size: u32) {
        debug!("grid resized to {size}x{size}");
        self.hud.on_grid_resized(size);
    }

    fn on_round_started(&mut self, difficulty: Difficulty, endless: bool, goal: Option<u32>) {
        self.hud.on_round_started(difficulty, endless, goal);
    }

    fn on_goal_badge_hidden(&mut self) {
        self.hud.on_goal_badge_hidden();
    }

    fn on_round_reset(&mut self) {
        self.hud.on_round_reset();
    }
}

fn play(args: &CliArgs) -> Result<RoundReport> {
    let difficulty = args.difficulty();
    let mut world = World::with_seed(args.seed);
    let mut autoplayer = Autoplayer::new(AutoplayerConfig::new(
        Duration::from_millis(args.reaction_ms),
        args.misclick_rate,
        args.seed.wrapping_add(1),
    ));
    let mut presenter = ConsolePresenter::new(args.show_grid && args.format == OutputFormat::Text);
    let mut tally = Tally::default();
    let mut events = Vec::new();

    if let Some(profile) = args.profile_override(query::profile_for(&world, difficulty)) {
        debug!("using custom {difficulty} profile: {profile:?}");
        world::apply(
            &mut world,
            Command::ConfigureProfile {
                difficulty,
                profile,
            },
            &mut events,
        );
    }
    world::apply(
        &mut world,
        Command::PreviewDifficulty { difficulty },
        &mut events,
    );
    world::apply(
        &mut world,
        Command::StartRound {
            difficulty,
            endless: args.endless,
            goal_percent: args.goal,
        },
        &mut events,
    );

    let step = Duration::from_millis(args.tick_ms);
    let step_limit = u64::from(ROUND_SECONDS) * 1_000 / args.tick_ms + 2;
    let mut steps = 0_u64;
    while query::round_state(&world) == RoundState::Active {
        ensure!(
            steps <= step_limit,
            "round still running after {steps} steps of {}ms",
            args.tick_ms
        );

        dispatch(&events, &mut presenter);
        tally.observe(&events);
        let mut commands = Vec::new();
        autoplayer.handle(&events, &mut commands);
        events.clear();

        for command in commands {
            world::apply(&mut world, command, &mut events);
        }
        world::apply(&mut world, Command::Tick { dt: step }, &mut events);
        steps += 1;
    }
    dispatch(&events, &mut presenter);
    tally.observe(&events);

    let outcome = query::outcome(&world).context("round ended without an outcome")?;
    let report = RoundReport::new(
        difficulty,
        query::goal_percent(&world),
        args.seed,
        outcome,
        query::session(&world),
        tally,
    );
    if args.show_grid && args.format == OutputFormat::Json {
        return Ok(report.with_hud(presenter.hud));
    }
    Ok(report)
}

/// Entry point for the Can Rush command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();
    args.validate()?;

    let report = play(&args)?;
    match args.format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!(
            "{}",
            report.to_json().context("failed to serialise the round report")?
        ),
    }
    Ok(())
}
