#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Top-level session tying build days to simulated weeks.
//!
//! A session opens with a welcome message. Once it is dismissed the player
//! builds until they declare the day done; a valid road network starts a
//! week of traffic. Every finished week posts a message and may be followed
//! by a random event before the next build day.

mod config;
mod events;
mod weekly;

use std::time::Duration;

pub use config::{
    BoundsConfig, BusinessPlacement, ConfigError, DecorPlacement, GridConfig, RoadPlacement,
    ScenarioConfig, DEFAULT_TOWN_RATING, SUPPORTED_SCENARIO_VERSION,
};
pub use events::{RandomEvent, JACKPOT_UNIT};
pub use weekly::{Outcome, DEADLINE_DAY, WINNING_BALANCE};

use events::EventScope;
use gateway_town_core::{Economy, InputSnapshot, Notifier, Phase, TownEvent, WELCOME_BANNER};
use gateway_town_fsm::{FsmError, StateMachine, StateMachineBuilder};
use gateway_town_system_autotile::RoadRuleSet;
use gateway_town_system_builder::{BuildMode, BuildScope};
use gateway_town_system_play::{Calendar, Config as PlayConfig, PlayMode, PlayScope};
use gateway_town_system_road_graph::RoadGraph;
use gateway_town_world::{Map, MessageBoard, NotificationQueue, TownLedger};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use weekly::Bulletin;

/// Notice shown when the build day cannot end.
pub const DISCONNECTED_ROADS_NOTICE: &str =
    "Cannot proceed; Not all starting roads are connected to the graph.";

const WELCOME_TEXT: &str = "Today is build day!\n\n\
    Connect the roads at the edge of town and line them with businesses.\n\
    Travelers pass through every week and spend money at whatever they can reach.\n\n\
    Every road and business costs upkeep, so keep an eye on your balance.\n\n\
    Try to have 1 million dollars at once before the end of June!\n\
    Good luck :)\n";

/// Errors raised while opening a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The scenario failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A phase machine could not be assembled.
    #[error("failed to assemble state machine: {0}")]
    Machine(#[from] FsmError),
}

struct World {
    town_name: String,
    map: Map,
    road: RoadGraph,
    ledger: TownLedger,
    notices: NotificationQueue,
    messages: MessageBoard,
    build: BuildMode,
    play: PlayMode,
    rng: ChaCha8Rng,
    input: InputSnapshot,
    events: Vec<TownEvent>,
    bulletin: Bulletin,
    done_requested: bool,
    ready_to_play: bool,
    weeks_played: u32,
}

impl World {
    fn announce(&mut self, phase: Phase) {
        tracing::info!(
            ?phase,
            date = %self.play.calendar(),
            money = self.ledger.money(),
            "phase changed"
        );
        self.events.push(TownEvent::PhaseChanged { phase });
    }

    fn enter_idle(&mut self) {
        self.announce(Phase::Idle);
    }

    fn enter_build(&mut self) {
        self.announce(Phase::Build);
        self.done_requested = false;
        self.build.cleanup();
        self.build.retile(&mut self.map);
    }

    fn run_build(&mut self, dt: Duration) {
        let mut scope = BuildScope {
            map: &mut self.map,
            economy: &mut self.ledger,
            notifier: &mut self.notices,
            events: &mut self.events,
        };
        self.build.update(&self.input, dt, &mut scope);
        if std::mem::take(&mut self.done_requested) {
            self.validate();
        }
    }

    fn validate(&mut self) {
        self.build.retile(&mut self.map);
        self.road.redraw(&self.map);
        if self.road.is_map_valid() {
            self.ready_to_play = true;
        } else {
            tracing::warn!(
                entrances = self.road.entrances().len(),
                exits = self.road.exits().len(),
                "build day cannot end"
            );
            self.notices.enqueue(DISCONNECTED_ROADS_NOTICE);
        }
    }

    fn exit_build(&mut self) {
        self.build.cleanup();
    }

    fn enter_play(&mut self) {
        self.announce(Phase::Play);
        self.ready_to_play = false;
        self.play.init(&self.map, &mut self.ledger);
    }

    fn run_play(&mut self, dt: Duration) {
        let mut scope = PlayScope {
            map: &mut self.map,
            road: &mut self.road,
            economy: &mut self.ledger,
            messages: &mut self.messages,
            events: &mut self.events,
        };
        self.play.update(&self.input, dt, &mut scope);
    }

    fn exit_play(&mut self) {
        self.play.cleanup(&mut self.map);
        self.weeks_played += 1;
    }

    fn enter_transition(&mut self) {
        self.announce(Phase::TransitionToBuild);
        let day = self.play.calendar().day();
        self.bulletin.post(self.ledger.money(), day, &mut self.messages);
    }

    fn enter_event_chance(&mut self) {
        self.announce(Phase::EventChance);
        let day = self.play.calendar().day();
        let mut scope = EventScope {
            map: &mut self.map,
            economy: &mut self.ledger,
            messages: &mut self.messages,
            events: &mut self.events,
            town_name: &self.town_name,
        };
        let _ = events::roll(&mut self.rng, day, &mut scope);
    }
}

fn no_message_open(world: &World) -> bool {
    !world.messages.is_open()
}

fn phase_machine() -> Result<StateMachine<Phase, World>, FsmError> {
    StateMachineBuilder::<Phase, World>::new()
        .with_state(Phase::Idle)
        .with_on_enter(World::enter_idle)
        .with_transition(Phase::Build, no_message_open)
        .with_state(Phase::Build)
        .with_on_enter(World::enter_build)
        .with_on_run(World::run_build)
        .with_on_exit(World::exit_build)
        .with_transition(Phase::Play, |world| world.ready_to_play)
        .with_state(Phase::Play)
        .with_on_enter(World::enter_play)
        .with_on_run(World::run_play)
        .with_on_exit(World::exit_play)
        .with_transition(Phase::TransitionToBuild, |world| world.play.is_finished())
        .with_state(Phase::TransitionToBuild)
        .with_on_enter(World::enter_transition)
        .with_transition(Phase::EventChance, no_message_open)
        .with_state(Phase::EventChance)
        .with_on_enter(World::enter_event_chance)
        .with_transition(Phase::Build, no_message_open)
        .build()
}

/// One playthrough of a scenario.
pub struct Session {
    machine: StateMachine<Phase, World>,
    world: World,
}

impl Session {
    /// Loads the scenario and posts the welcome message.
    pub fn new(config: &ScenarioConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let grid = config.grid_service();
        let bounds = config.world_bounds();

        let mut map = Map::new(grid, bounds);
        let mut events = Vec::new();
        for (position, object) in config.objects()? {
            let cell = grid.coordinate_of(position);
            let _ = map.erase_at(cell, true, &mut events);
            map.put_at(object, cell, true, &mut events);
        }
        tracing::info!(
            town = %config.town_name,
            objects = map.len(),
            seed = config.seed,
            "scenario loaded"
        );

        let mut messages = MessageBoard::default();
        messages.show(WELCOME_BANNER, WELCOME_TEXT);

        let mut world = World {
            town_name: config.town_name.clone(),
            map,
            road: RoadGraph::new(grid, bounds),
            ledger: TownLedger::new(config.starting_cash, config.default_rating),
            notices: NotificationQueue::new(),
            messages,
            build: BuildMode::new(config.business_catalog(), RoadRuleSet::standard())?,
            play: PlayMode::new(PlayConfig::new(
                config.seed.wrapping_add(1),
                config.week_seconds,
                config.car_speed,
            ))?,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            input: InputSnapshot::default(),
            events,
            bulletin: Bulletin::default(),
            done_requested: false,
            ready_to_play: false,
            weeks_played: 0,
        };
        let mut machine = phase_machine()?;
        machine.start(&mut world);
        Ok(Self { machine, world })
    }

    /// Advances the session by one tick.
    pub fn update(&mut self, input: &InputSnapshot, dt: Duration) {
        if input.dismiss_message {
            self.world.messages.dismiss();
        }
        self.world.input = *input;
        self.machine.run(&mut self.world, dt);
    }

    /// Declares the build day done. The road network is validated on the
    /// next tick; outside the build phase the request is ignored.
    pub fn finish_build(&mut self) {
        if self.phase() == Phase::Build {
            self.world.done_requested = true;
        }
    }

    /// Applies `event` right away, as if it had been rolled. Returns false
    /// when the town was spared.
    pub fn trigger_event(&mut self, event: RandomEvent) -> bool {
        let world = &mut self.world;
        let mut scope = EventScope {
            map: &mut world.map,
            economy: &mut world.ledger,
            messages: &mut world.messages,
            events: &mut world.events,
            town_name: &world.town_name,
        };
        events::apply(event, &mut world.rng, &mut scope)
    }

    /// Active phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.machine.current().unwrap_or(Phase::Idle)
    }

    /// Name of the town.
    #[must_use]
    pub fn town_name(&self) -> &str {
        &self.world.town_name
    }

    /// Current map.
    #[must_use]
    pub fn map(&self) -> &Map {
        &self.world.map
    }

    /// Road network of the last validated build.
    #[must_use]
    pub fn road(&self) -> &RoadGraph {
        &self.world.road
    }

    /// Money and rating.
    #[must_use]
    pub fn ledger(&self) -> &TownLedger {
        &self.world.ledger
    }

    /// Modal messages.
    #[must_use]
    pub fn messages(&self) -> &MessageBoard {
        &self.world.messages
    }

    /// Build tools, for menus and buttons.
    #[must_use]
    pub fn build(&self) -> &BuildMode {
        &self.world.build
    }

    /// Mutable build tools, for menus and buttons.
    pub fn build_mut(&mut self) -> &mut BuildMode {
        &mut self.world.build
    }

    /// Week controller.
    #[must_use]
    pub fn play(&self) -> &PlayMode {
        &self.world.play
    }

    /// In-game date.
    #[must_use]
    pub fn calendar(&self) -> &Calendar {
        self.world.play.calendar()
    }

    /// Weeks simulated so far.
    #[must_use]
    pub const fn weeks_played(&self) -> u32 {
        self.world.weeks_played
    }

    /// Result of the million dollar challenge, once decided.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.world.bulletin.outcome()
    }

    /// Takes every pending notice.
    pub fn drain_notices(&mut self) -> Vec<String> {
        self.world.notices.drain()
    }

    /// Takes every presentation event emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<TownEvent> {
        std::mem::take(&mut self.world.events)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("town", &self.world.town_name)
            .field("phase", &self.phase())
            .field("day", &self.world.play.calendar().day())
            .field("money", &self.world.ledger.money())
            .finish()
    }
}
