#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line adapter that plays a Gateway Town scenario.

mod autopilot;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use gateway_town_system_session::{ScenarioConfig, Session};
use tracing_subscriber::EnvFilter;

/// Town loaded when no scenario file is given.
const DEMO_SCENARIO: &str = include_str!("../../../scenarios/demo.toml");

/// Plays a town headlessly with a scripted player and prints the books.
#[derive(Debug, Parser)]
#[command(name = "gateway-town", version, about)]
struct Cli {
    /// Scenario file to load instead of the built-in demo town.
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Number of weeks to simulate.
    #[arg(long, default_value_t = 4)]
    weeks: u32,
    /// Seed replacing the one in the scenario.
    #[arg(long)]
    seed: Option<u64>,
    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
    /// Log filter, e.g. `info` or `gateway_town_system_play=debug`.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Entry point for the Gateway Town command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let mut config = load_scenario(cli.scenario.as_deref())?;
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let mut session = Session::new(&config).context("failed to open session")?;
    let tick = Duration::from_millis(cli.tick_ms.max(1));
    let report = autopilot::run(&mut session, cli.weeks, tick)?;
    println!("{report}");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log level `{level}`"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

fn load_scenario(path: Option<&Path>) -> Result<ScenarioConfig> {
    let Some(path) = path else {
        return ScenarioConfig::from_toml_str(DEMO_SCENARIO)
            .context("built-in demo scenario is invalid");
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario at {}", path.display()))?;
    ScenarioConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load scenario at {}", path.display()))
}
