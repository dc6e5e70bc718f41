#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic car factory and the pool that recycles exited cars.
//!
//! Every car starts at a random entrance and heads either for an exit on the
//! far side of town or, with a chance that grows with the town rating, for a
//! business destination.

use gateway_town_core::CarId;
use gateway_town_fsm::FsmError;
use gateway_town_graph::{GraphNode, NodeId};
use gateway_town_system_movement::{Car, CarMachine, DEFAULT_SPEED};
use gateway_town_system_road_graph::RoadGraph;
use glam::Vec2;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Configuration parameters required to construct the factory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    rng_seed: u64,
    speed_override: Option<f32>,
}

impl Config {
    /// Creates a configuration from a seed and an optional fixed car speed.
    #[must_use]
    pub const fn new(rng_seed: u64, speed_override: Option<f32>) -> Self {
        Self {
            rng_seed,
            speed_override,
        }
    }
}

/// Chance out of nine that a visitor detours to a business.
#[must_use]
pub fn detour_chance(rating: i64) -> f32 {
    (rating as f32 / 10.0).clamp(2.0, 8.0)
}

#[derive(Clone, Copy, Debug)]
struct Itinerary {
    start: NodeId,
    goal: NodeId,
    position: Vec2,
    heading: Vec2,
}

/// Builds and reinitialises cars.
#[derive(Debug)]
pub struct CarFactory {
    machine: CarMachine,
    rng: ChaCha8Rng,
    speed_override: Option<f32>,
    next_id: u32,
}

impl CarFactory {
    /// Creates a factory seeded from `config`.
    pub fn new(config: Config) -> Result<Self, FsmError> {
        Ok(Self {
            machine: CarMachine::new()?,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            speed_override: config.speed_override,
            next_id: 0,
        })
    }

    /// Speed given to every new car.
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.speed_override.unwrap_or(DEFAULT_SPEED)
    }

    /// Creates a routed car, or `None` when the network has no entrance or exit.
    pub fn create(&mut self, road: &mut RoadGraph, rating: i64) -> Option<Car> {
        let itinerary = self.plan(road, rating)?;
        let id = CarId::new(self.next_id);
        self.next_id += 1;
        let mut car = Car::new(
            id,
            &self.machine,
            itinerary.position,
            itinerary.heading,
            self.speed(),
        );
        let _ = car.drive_to(road.graph_mut(), itinerary.goal, Some(itinerary.start));
        Some(car)
    }

    /// Reinitialises `car` exactly like a fresh spawn. Returns false when no
    /// route could be planned; the car is left untouched then.
    pub fn reset(&mut self, car: &mut Car, road: &mut RoadGraph, rating: i64) -> bool {
        let Some(itinerary) = self.plan(road, rating) else {
            return false;
        };
        car.reset(itinerary.position, itinerary.heading, self.speed());
        let _ = car.drive_to(road.graph_mut(), itinerary.goal, Some(itinerary.start));
        true
    }

    fn plan(&mut self, road: &RoadGraph, rating: i64) -> Option<Itinerary> {
        let start = road.random_entrance(&mut self.rng)?;

        let far_exits: Vec<NodeId> = road
            .exits()
            .iter()
            .copied()
            .filter(|&exit| !road.same_cell(start, exit))
            .collect();
        let mut goal = if far_exits.is_empty() {
            road.random_exit(&mut self.rng)?
        } else {
            *far_exits.choose(&mut self.rng)?
        };

        let roll = self.rng.gen_range(1..10) as f32;
        if roll <= detour_chance(rating) {
            if let Some(destination) = road.random_destination(&mut self.rng) {
                goal = destination;
            }
        }

        let node = road.graph().node(start)?;
        let position = node.position();
        let heading = node.dir_to_next().unwrap_or(Vec2::X);
        Some(Itinerary {
            start,
            goal,
            position,
            heading,
        })
    }
}

/// Owner of every car ever spawned; exited cars are reused first.
#[derive(Clone, Debug, Default)]
pub struct CarPool {
    cars: Vec<Car>,
}

impl CarPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a car, recycling an exited one when available.
    pub fn spawn(
        &mut self,
        factory: &mut CarFactory,
        road: &mut RoadGraph,
        rating: i64,
    ) -> Option<CarId> {
        if let Some(car) = self.cars.iter_mut().find(|car| car.is_exited()) {
            if factory.reset(car, road, rating) {
                tracing::debug!(car = car.id().get(), "car reused from pool");
                return Some(car.id());
            }
            return None;
        }

        let car = factory.create(road, rating)?;
        let id = car.id();
        tracing::debug!(car = id.get(), pool = self.cars.len() + 1, "car created");
        self.cars.push(car);
        Some(id)
    }

    /// Car with the given identifier.
    #[must_use]
    pub fn get(&self, id: CarId) -> Option<&Car> {
        self.cars.iter().find(|car| car.id() == id)
    }

    /// Mutable car with the given identifier.
    pub fn get_mut(&mut self, id: CarId) -> Option<&mut Car> {
        self.cars.iter_mut().find(|car| car.id() == id)
    }

    /// Every pooled car, active or not.
    pub fn iter(&self) -> impl Iterator<Item = &Car> {
        self.cars.iter()
    }

    /// Every pooled car, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Car> {
        self.cars.iter_mut()
    }

    /// Number of cars still simulating.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.cars.iter().filter(|car| car.is_active()).count()
    }

    /// Reports whether every pooled car has exited.
    #[must_use]
    pub fn all_inactive(&self) -> bool {
        self.cars.iter().all(Car::is_exited)
    }

    /// Number of pooled cars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cars.len()
    }

    /// Reports whether no car was ever spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    /// Exits every car.
    pub fn exit_all(&mut self) {
        for car in &mut self.cars {
            car.exit();
        }
    }
}
