#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Play phase: one simulated week of visitors.
//!
//! The week machine plans how many visitors arrive, spawns them at a steady
//! cadence, routes their node entries to exits and businesses, and settles
//! the books once every car has left town.

mod calendar;

use std::{collections::HashSet, time::Duration};

use gateway_town_core::{CarId, Coordinate, Economy, InputSnapshot, TownEvent};
use gateway_town_fsm::{FsmError, StateMachine, StateMachineBuilder};
use gateway_town_system_movement::{CarEvent, CarState};
use gateway_town_system_road_graph::RoadGraph;
use gateway_town_system_spawning::{CarFactory, CarPool, Config as SpawnConfig};
use gateway_town_world::{Map, MapObject, MessageBoard};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub use calendar::{Calendar, DAYS_PER_YEAR};

/// Simulated days per play phase.
pub const DAYS_PER_WEEK: usize = 6;

/// Shortest gap between two spawns.
pub const MIN_SPAWN_INTERVAL: f32 = 0.005;

/// Time multiplier while the speed boost key is held.
pub const SPEED_BOOST: f32 = 5.0;

/// Real seconds a week of spawning lasts unless configured otherwise.
pub const DEFAULT_WEEK_SECONDS: f32 = 30.0;

/// Title of the message posted when a week ends.
pub const WEEK_SUMMARY_TITLE: &str = "Weekly Profit";

/// Phase of a simulated week.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlayState {
    /// Waiting to start.
    Idle,
    /// Visitors arrive and drive through town.
    SpawningWeek,
    /// Books are settled and the summary is on screen.
    WeekSummary,
    /// The summary was dismissed.
    Finished,
}

/// Sum of the popularity of every object on the map.
#[must_use]
pub fn town_rating(map: &Map) -> i64 {
    map.iter().filter_map(MapObject::popularity).sum()
}

/// Time multiplier for the current input.
#[must_use]
pub fn time_scale(input: &InputSnapshot) -> f32 {
    if input.speed_boost_held {
        SPEED_BOOST
    } else {
        1.0
    }
}

/// Visitors expected on each day of a week and the resulting spawn cadence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisitorPlan {
    daily: [u32; DAYS_PER_WEEK],
    interval: f32,
}

impl VisitorPlan {
    /// Draws a plan for a town with the given rating.
    ///
    /// Each day brings `max(10, 2 * rating)` visitors, jittered by up to half
    /// of that in either direction.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, rating: i64, week_seconds: f32) -> Self {
        let mut daily = [0; DAYS_PER_WEEK];
        for day in &mut daily {
            let base = (200 * rating / 100).max(10);
            let half = base / 2;
            let visitors = base + rng.gen_range(-half..half);
            *day = u32::try_from(visitors).unwrap_or(0);
        }
        let total: u32 = daily.iter().sum();
        let interval = (week_seconds / total.max(1) as f32).max(MIN_SPAWN_INTERVAL);
        Self { daily, interval }
    }

    /// Visitors per day.
    #[must_use]
    pub fn daily(&self) -> &[u32] {
        &self.daily
    }

    /// Visitors over the whole week.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.daily.iter().sum()
    }

    /// Seconds between two spawns.
    #[must_use]
    pub const fn interval_seconds(&self) -> f32 {
        self.interval
    }

    fn visitors_through(&self, days: usize) -> u32 {
        self.daily.iter().take(days).sum()
    }
}

/// Books of a finished week.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeekReport {
    /// Visitors spawned.
    pub visitors: u32,
    /// Money earned from visitors.
    pub revenue: i64,
    /// Upkeep charged for every object.
    pub upkeep: i64,
}

impl WeekReport {
    /// Revenue minus upkeep.
    #[must_use]
    pub const fn profit(&self) -> i64 {
        self.revenue - self.upkeep
    }

    /// Body of the weekly summary message.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total Visitors this week: {}\nTotal Revenue made this week: {}\nTotal Upkeep cost this week: {}\nProfit: {}",
            self.visitors,
            self.revenue,
            self.upkeep,
            self.profit()
        )
    }
}

/// Configuration parameters required to construct the play phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    rng_seed: u64,
    week_seconds: f32,
    speed_override: Option<f32>,
}

impl Config {
    /// Creates a configuration.
    #[must_use]
    pub const fn new(rng_seed: u64, week_seconds: f32, speed_override: Option<f32>) -> Self {
        Self {
            rng_seed,
            week_seconds,
            speed_override,
        }
    }
}

/// Town state the play phase operates on.
pub struct PlayScope<'a> {
    /// Map holding the businesses.
    pub map: &'a mut Map,
    /// Road network built for this week.
    pub road: &'a mut RoadGraph,
    /// Ledger credited with revenue and charged with upkeep.
    pub economy: &'a mut dyn Economy,
    /// Board receiving the weekly summary.
    pub messages: &'a mut MessageBoard,
    /// Presentation side effects.
    pub events: &'a mut Vec<TownEvent>,
}

#[derive(Debug)]
struct Week {
    rng: ChaCha8Rng,
    week_seconds: f32,
    rating: i64,
    plan: VisitorPlan,
    timer: f32,
    spawned: u32,
    due: u32,
    days_passed: usize,
    calendar: Calendar,
    revenue: i64,
    complete: bool,
    message_open: bool,
    settle_requested: bool,
}

impl Week {
    fn begin(&mut self) {
        self.plan = VisitorPlan::generate(&mut self.rng, self.rating, self.week_seconds);
        self.timer = 0.0;
        self.spawned = 0;
        self.due = 0;
        self.days_passed = 0;
        self.revenue = 0;
        self.complete = false;
        tracing::info!(
            rating = self.rating,
            visitors = self.plan.total(),
            interval = self.plan.interval_seconds(),
            date = %self.calendar,
            "week started"
        );
    }

    fn schedule(&mut self, dt: Duration) {
        let total = self.plan.total();
        if self.spawned >= total {
            return;
        }
        self.timer += dt.as_secs_f32();
        while self.timer >= self.plan.interval_seconds() && self.spawned < total {
            self.timer -= self.plan.interval_seconds();
            self.spawned += 1;
            self.due += 1;
            while self.days_passed < DAYS_PER_WEEK
                && self.spawned >= self.plan.visitors_through(self.days_passed + 1)
            {
                self.days_passed += 1;
                self.calendar.advance();
            }
        }
    }

    fn request_settlement(&mut self) {
        self.settle_requested = true;
    }
}

fn week_machine() -> Result<StateMachine<PlayState, Week>, FsmError> {
    StateMachineBuilder::<PlayState, Week>::new()
        .with_state(PlayState::Idle)
        .with_transition(PlayState::SpawningWeek, |_| true)
        .with_state(PlayState::SpawningWeek)
        .with_on_enter(Week::begin)
        .with_on_run(Week::schedule)
        .with_transition(PlayState::WeekSummary, |week| week.complete)
        .with_state(PlayState::WeekSummary)
        .with_on_enter(Week::request_settlement)
        .with_transition(PlayState::Finished, |week| !week.message_open)
        .with_state(PlayState::Finished)
        .build()
}

fn earn(
    coordinate: Coordinate,
    amount: i64,
    economy: &mut dyn Economy,
    revenue: &mut i64,
    events: &mut Vec<TownEvent>,
) {
    if amount > 0 {
        economy.add_money(amount);
        *revenue += amount;
        events.push(TownEvent::RevenueEarned { coordinate, amount });
    } else if amount < 0 {
        economy.spend_money(-amount);
    }
}

/// Controller of the play phase.
#[derive(Debug)]
pub struct PlayMode {
    machine: StateMachine<PlayState, Week>,
    week: Week,
    factory: CarFactory,
    pool: CarPool,
    last_report: Option<WeekReport>,
}

impl PlayMode {
    /// Creates the controller.
    pub fn new(config: Config) -> Result<Self, FsmError> {
        Ok(Self {
            machine: week_machine()?,
            week: Week {
                rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
                week_seconds: config.week_seconds,
                rating: 0,
                plan: VisitorPlan::default(),
                timer: 0.0,
                spawned: 0,
                due: 0,
                days_passed: 0,
                calendar: Calendar::new(),
                revenue: 0,
                complete: false,
                message_open: false,
                settle_requested: false,
            },
            factory: CarFactory::new(SpawnConfig::new(
                config.rng_seed.wrapping_add(1),
                config.speed_override,
            ))?,
            pool: CarPool::new(),
            last_report: None,
        })
    }

    /// Prepares a new week: the machine restarts and the rating is recomputed.
    pub fn init(&mut self, map: &Map, economy: &mut dyn Economy) {
        self.machine.reset();
        let rating = town_rating(map);
        economy.set_town_rating(rating);
        self.week.rating = rating;
        self.week.due = 0;
        self.week.settle_requested = false;
    }

    /// Current week state.
    #[must_use]
    pub fn state(&self) -> PlayState {
        self.machine.current().unwrap_or(PlayState::Idle)
    }

    /// Reports whether the week summary was dismissed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.machine.is_in_state(PlayState::Finished)
    }

    /// Cars of the simulation.
    #[must_use]
    pub fn pool(&self) -> &CarPool {
        &self.pool
    }

    /// In-game date.
    #[must_use]
    pub const fn calendar(&self) -> &Calendar {
        &self.week.calendar
    }

    /// Plan of the current or last week.
    #[must_use]
    pub const fn plan(&self) -> &VisitorPlan {
        &self.week.plan
    }

    /// Visitors spawned so far this week.
    #[must_use]
    pub const fn spawned(&self) -> u32 {
        self.week.spawned
    }

    /// Books of the most recently settled week.
    #[must_use]
    pub fn last_report(&self) -> Option<&WeekReport> {
        self.last_report.as_ref()
    }

    /// Advances the week by one tick.
    pub fn update(&mut self, input: &InputSnapshot, dt: Duration, scope: &mut PlayScope<'_>) {
        let dt = dt.mul_f32(time_scale(input));
        self.week.message_open = scope.messages.is_open();
        self.week.complete =
            self.week.spawned >= self.week.plan.total() && self.pool.all_inactive();
        self.machine.run(&mut self.week, dt);

        for _ in 0..std::mem::take(&mut self.week.due) {
            self.spawn(scope);
        }
        if self.pool.active_count() > 0 {
            self.drive(dt, scope);
        }
        if std::mem::take(&mut self.week.settle_requested) {
            self.settle(scope);
        }
    }

    /// Removes every car and clears business visitors.
    pub fn cleanup(&mut self, map: &mut Map) {
        self.pool.exit_all();
        for object in map.iter_mut() {
            object.runtime_mut().reset();
        }
    }

    fn spawn(&mut self, scope: &mut PlayScope<'_>) {
        if scope.road.graph().node_count() < 2 {
            tracing::debug!("visitor counted without a road network");
            return;
        }
        let rating = scope.economy.town_rating();
        if self
            .pool
            .spawn(&mut self.factory, scope.road, rating)
            .is_none()
        {
            tracing::debug!("no entrance available for visitor");
        }
    }

    fn drive(&mut self, dt: Duration, scope: &mut PlayScope<'_>) {
        let mut entered = Vec::new();
        for car in self.pool.iter_mut() {
            car.tick(dt, &mut entered);
        }

        for event in entered {
            let CarEvent::EnteredNode { car, node } = event;
            if scope.road.is_exit(node) {
                if let Some(car) = self.pool.get_mut(car) {
                    car.exit();
                }
                continue;
            }
            if let Some(link) = scope.road.business_at(node) {
                if let Some(object) = scope.map.get_at_mut(link.business) {
                    object.runtime_mut().admit(car);
                }
            }
        }

        self.retire_stranded(scope.map);
        self.serve_customers(dt, scope);
        self.watch_billboards(dt, scope);
    }

    fn retire_stranded(&mut self, map: &Map) {
        let held: HashSet<CarId> = map
            .iter()
            .flat_map(|object| object.runtime().occupants().iter().copied())
            .collect();

        for car in self.pool.iter_mut().filter(|car| car.is_active()) {
            let stranded = match car.state() {
                CarState::Idle => !car.has_route(),
                CarState::Arrived => car.target().is_none() && !held.contains(&car.id()),
                CarState::Moving => false,
            };
            if stranded {
                tracing::warn!(
                    car = car.id().get(),
                    state = ?car.state(),
                    position = ?car.position(),
                    "car has nowhere to go, removing it"
                );
                car.exit();
            }
        }
    }

    fn serve_customers(&mut self, dt: Duration, scope: &mut PlayScope<'_>) {
        let seconds = dt.as_secs_f32();
        for coordinate in scope.map.coordinates() {
            let Some(object) = scope.map.get_at_mut(coordinate) else {
                continue;
            };
            let Some((dwell, price)) = object.as_business().and_then(|business| {
                business
                    .stop()
                    .map(|layout| (layout.dwell_seconds, business.terms.revenue_per_customer))
            }) else {
                continue;
            };
            let released = object.runtime_mut().advance_dwell(seconds, dwell);

            for id in released {
                earn(
                    coordinate,
                    price,
                    scope.economy,
                    &mut self.week.revenue,
                    scope.events,
                );
                let Some(car) = self.pool.get_mut(id) else {
                    continue;
                };
                let leave = scope.road.business_exit(coordinate);
                let exit = scope.road.random_exit(&mut self.week.rng);
                if let (Some(leave), Some(exit)) = (leave, exit) {
                    let _ = car.drive_to(scope.road.graph_mut(), exit, Some(leave));
                }
            }
        }
    }

    fn watch_billboards(&mut self, dt: Duration, scope: &mut PlayScope<'_>) {
        let seconds = dt.as_secs_f32();
        let grid = *scope.map.grid();
        for coordinate in scope.map.coordinates() {
            let Some(object) = scope.map.get_at_mut(coordinate) else {
                continue;
            };
            let Some((layout, price)) = object.as_business().and_then(|business| {
                business
                    .billboard()
                    .map(|layout| (*layout, business.terms.revenue_per_customer))
            }) else {
                continue;
            };

            let center = grid.position_of(coordinate);
            let half = layout.box_cells * grid.cell_size() * 0.5;
            let mut sightings = 0;
            for car in self.pool.iter().filter(|car| car.is_active()) {
                let offset = (car.position() - center).abs();
                if offset.x <= half.x
                    && offset.y <= half.y
                    && object.runtime_mut().register_sighting(car.id())
                {
                    sightings += 1;
                }
            }
            object
                .runtime_mut()
                .advance_cooldown(seconds, layout.cooldown_seconds);

            for _ in 0..sightings {
                earn(
                    coordinate,
                    price,
                    scope.economy,
                    &mut self.week.revenue,
                    scope.events,
                );
            }
        }
    }

    fn settle(&mut self, scope: &mut PlayScope<'_>) {
        let upkeep: i64 = scope.map.iter().filter_map(MapObject::upkeep).sum();
        scope.economy.spend_money(upkeep);
        let report = WeekReport {
            visitors: self.week.spawned,
            revenue: self.week.revenue,
            upkeep,
        };
        tracing::info!(
            visitors = report.visitors,
            revenue = report.revenue,
            upkeep = report.upkeep,
            profit = report.profit(),
            balance = scope.economy.money(),
            date = %self.week.calendar,
            "week settled"
        );
        scope.messages.show(WEEK_SUMMARY_TITLE, report.summary());
        self.last_report = Some(report);
    }
}
