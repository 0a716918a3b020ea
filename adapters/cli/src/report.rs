//! End-of-round summary printed by the CLI.

use std::fmt::Write as _;

use can_rush_core::{Celebration, Difficulty, Event, RemovalCause, RoundOutcome, SessionSnapshot};
use can_rush_presentation::Hud;
use serde::Serialize;

/// Item traffic observed over a round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub(crate) struct Tally {
    pub(crate) spawned: u32,
    pub(crate) collected_positive: u32,
    pub(crate) collected_negative: u32,
    pub(crate) expired: u32,
}

impl Tally {
    pub(crate) fn observe(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::ItemSpawned { .. } => self.spawned += 1,
                Event::ItemRemoved { cause, .. } => match cause {
                    RemovalCause::Collected { negative: false } => self.collected_positive += 1,
                    RemovalCause::Collected { negative: true } => self.collected_negative += 1,
                    RemovalCause::Expired => self.expired += 1,
                },
                Event::RoundStarted { .. } | Event::RoundReset => *self = Self::default(),
                _ => {}
            }
        }
    }
}

/// Result of a headless round.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct RoundReport {
    pub(crate) difficulty: Difficulty,
    pub(crate) endless: bool,
    pub(crate) goal_percent: Option<u32>,
    pub(crate) seed: u64,
    pub(crate) success: bool,
    pub(crate) message: String,
    pub(crate) celebration: Celebration,
    pub(crate) session: SessionSnapshot,
    pub(crate) tally: Tally,
    /// Final screen state, attached when the grid was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) hud: Option<Hud>,
}

impl RoundReport {
    pub(crate) fn new(
        difficulty: Difficulty,
        goal_percent: Option<u32>,
        seed: u64,
        outcome: RoundOutcome,
        session: SessionSnapshot,
        tally: Tally,
    ) -> Self {
        Self {
            difficulty,
            endless: goal_percent.is_none(),
            goal_percent,
            seed,
            success: outcome.success,
            message: outcome.message().to_owned(),
            celebration: outcome.celebration,
            session,
            tally,
            hud: None,
        }
    }

    pub(crate) fn with_hud(mut self, hud: Hud) -> Self {
        self.hud = Some(hud);
        self
    }

    pub(crate) fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub(crate) fn render_text(&self) -> String {
        let mut out = String::new();
        let goal = match self.goal_percent {
            Some(goal) => format!("goal {goal}%"),
            None => "endless".to_owned(),
        };
        let _ = writeln!(out, "{} ({}, {goal}, seed {})", self.message, self.difficulty, self.seed);
        let _ = writeln!(
            out,
            "total {}% | containers filled {} | clicks {}",
            self.session.total_percent, self.session.filled_containers, self.session.clicked
        );
        let _ = writeln!(
            out,
            "items spawned {} | collected {} good, {} bad | expired {}",
            self.tally.spawned,
            self.tally.collected_positive,
            self.tally.collected_negative,
            self.tally.expired
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_rush_core::{CellIndex, EndReason, ItemId};
    use serde_json::json;
    use std::time::Duration;

    fn removed(id: u32, cause: RemovalCause) -> Event {
        Event::ItemRemoved {
            item: ItemId::new(id),
            cell: CellIndex::new(id),
            cause,
        }
    }

    #[test]
    fn tally_counts_item_traffic() {
        let mut tally = Tally::default();
        tally.observe(&[
            Event::ItemSpawned {
                item: ItemId::new(0),
                cell: CellIndex::new(0),
                negative: false,
                lifetime: Duration::from_secs(4),
            },
            removed(0, RemovalCause::Collected { negative: false }),
            removed(1, RemovalCause::Collected { negative: true }),
            removed(2, RemovalCause::Expired),
            removed(3, RemovalCause::Expired),
        ]);

        assert_eq!(
            tally,
            Tally {
                spawned: 1,
                collected_positive: 1,
                collected_negative: 1,
                expired: 2,
            }
        );

        tally.observe(&[Event::RoundReset]);
        assert_eq!(tally, Tally::default());
    }

    #[test]
    fn report_renders_outcome_message() {
        let report = RoundReport::new(
            Difficulty::Hard,
            Some(200),
            7,
            RoundOutcome::from_reason(EndReason::GoalReached),
            SessionSnapshot {
                total_percent: 240,
                filled_containers: 2,
                clicked: 14,
                ..SessionSnapshot::default()
            },
            Tally::default(),
        );

        let text = report.render_text();
        assert!(text.starts_with("You reached the goal! (hard, goal 200%, seed 7)"));
        assert!(text.contains("total 240%"));

        let json: serde_json::Value =
            serde_json::from_str(&report.to_json().expect("serializes")).expect("valid json");
        assert_eq!(json["success"], true);
        assert_eq!(json["goal_percent"], 200);
        assert_eq!(json["session"]["clicked"], 14);
        assert!(json.get("hud").is_none());
        assert!(!report.endless);
    }

    #[test]
    fn attached_hud_travels_in_json() {
        let report = RoundReport::new(
            Difficulty::Easy,
            None,
            1,
            RoundOutcome::from_reason(EndReason::EndlessTimeRanOut),
            SessionSnapshot::default(),
            Tally::default(),
        )
        .with_hud(Hud::new(2));

        let json: serde_json::Value =
            serde_json::from_str(&report.to_json().expect("serializes")).expect("valid json");
        assert_eq!(json["celebration"], json!("Big"));
        assert_eq!(
            json["hud"]["cells"],
            json!(["empty", "empty", "empty", "empty"])
        );
        assert_eq!(json["hud"]["remaining_seconds"], 30);
    }
}
