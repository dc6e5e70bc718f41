//! Scripted player for headless runs.
//!
//! Every message is dismissed as soon as it opens. On a build day the
//! autopilot straightens the highway between starter roads that share a row
//! or column: it clears anything unlocked that blocks it, paints the missing
//! road tiles and then ends the day.

use std::{collections::BTreeSet, fmt, time::Duration};

use anyhow::{bail, Result};
use gateway_town_core::{Coordinate, Economy, InputSnapshot, Phase};
use gateway_town_system_builder::Tool;
use gateway_town_system_session::{Outcome, Session};
use gateway_town_world::{Map, MapObject, RoadTile};

/// Ticks allowed per simulated week before the run is abandoned.
const TICK_BUDGET_PER_WEEK: usize = 200_000;

/// Tool uses allowed on one build day.
const ACTIONS_PER_BUILD_DAY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Use(Tool, Coordinate),
    Finish,
}

/// Cells strictly between starter roads sharing a row or a column.
fn highway_cells(map: &Map) -> Vec<Coordinate> {
    let starters: Vec<Coordinate> = map
        .iter()
        .filter(|object| object.as_road().is_some_and(RoadTile::is_starter))
        .map(MapObject::coordinate)
        .collect();

    let mut cells = BTreeSet::new();
    for (index, a) in starters.iter().enumerate() {
        for b in &starters[index + 1..] {
            if a.y() == b.y() {
                for x in a.x().min(b.x()) + 1..a.x().max(b.x()) {
                    let _ = cells.insert(Coordinate::new(x, a.y()));
                }
            } else if a.x() == b.x() {
                for y in a.y().min(b.y()) + 1..a.y().max(b.y()) {
                    let _ = cells.insert(Coordinate::new(a.x(), y));
                }
            }
        }
    }
    cells.into_iter().collect()
}

fn next_step(map: &Map) -> Step {
    for cell in highway_cells(map) {
        match map.get_at(cell) {
            None => return Step::Use(Tool::DrawRoads, cell),
            Some(object) if object.as_road().is_some() || object.is_locked() => {}
            Some(object) if object.is_decor() => return Step::Use(Tool::Clean, cell),
            Some(_) => return Step::Use(Tool::Erase, cell),
        }
    }
    Step::Finish
}

/// Books of a finished run.
#[derive(Clone, Debug)]
pub(crate) struct Report {
    town: String,
    weeks: u32,
    date: String,
    money: i64,
    earned: i64,
    spent: i64,
    rating: i64,
    outcome: Option<Outcome>,
    messages: Vec<String>,
    notices: Vec<String>,
}

impl Report {
    fn capture(session: &Session, notices: Vec<String>) -> Self {
        let ledger = session.ledger();
        Self {
            town: session.town_name().to_owned(),
            weeks: session.weeks_played(),
            date: session.calendar().to_string(),
            money: ledger.money(),
            earned: ledger.total_earned(),
            spent: ledger.total_spent(),
            rating: ledger.town_rating(),
            outcome: session.outcome(),
            messages: session
                .messages()
                .history()
                .iter()
                .map(|message| message.title.clone())
                .collect(),
            notices,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} after {} week(s), {}", self.town, self.weeks, self.date)?;
        writeln!(f, "  balance  {:>12}", self.money)?;
        writeln!(f, "  earned   {:>12}", self.earned)?;
        writeln!(f, "  spent    {:>12}", self.spent)?;
        writeln!(f, "  rating   {:>12}", self.rating)?;
        let outcome = match self.outcome {
            Some(Outcome::Won) => "won",
            Some(Outcome::Failed) => "failed",
            None => "undecided",
        };
        writeln!(f, "  goal     {outcome:>12}")?;
        writeln!(f, "messages:")?;
        for title in &self.messages {
            writeln!(f, "  - {title}")?;
        }
        if !self.notices.is_empty() {
            writeln!(f, "notices:")?;
            for notice in &self.notices {
                writeln!(f, "  - {notice}")?;
            }
        }
        Ok(())
    }
}

/// Plays `weeks` weeks and returns the books.
pub(crate) fn run(session: &mut Session, weeks: u32, tick: Duration) -> Result<Report> {
    let budget = TICK_BUDGET_PER_WEEK * (weeks as usize + 1);
    let mut notices = Vec::new();
    let mut actions_today = 0;

    for _ in 0..budget {
        if session.weeks_played() >= weeks {
            return Ok(Report::capture(session, notices));
        }

        let mut input = InputSnapshot {
            dismiss_message: session.messages().is_open(),
            ..InputSnapshot::default()
        };
        let mut finishing = false;
        if session.phase() == Phase::Build && !input.dismiss_message {
            let step = if actions_today < ACTIONS_PER_BUILD_DAY {
                next_step(session.map())
            } else {
                Step::Finish
            };
            match step {
                Step::Use(tool, cell) => {
                    if session.build().tool() != tool {
                        session.build_mut().toggle_tool(tool);
                    }
                    input.pointer = Some(session.map().grid().position_of(cell));
                    input.primary_pressed = true;
                    input.primary_held = true;
                    actions_today += 1;
                    tracing::debug!(?tool, %cell, "autopilot repairs highway");
                }
                Step::Finish => {
                    session.finish_build();
                    finishing = true;
                }
            }
        }

        session.update(&input, tick);
        notices.extend(session.drain_notices());
        let _ = session.drain_events();

        if session.phase() != Phase::Build {
            actions_today = 0;
        } else if finishing {
            bail!(
                "build day on {} could not end: {}",
                session.calendar(),
                notices.last().map_or("no reason given", String::as_str)
            );
        }
    }

    bail!(
        "autopilot gave up in {:?} after {} week(s)",
        session.phase(),
        session.weeks_played()
    )
}
