#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Car controller that follows solver paths across the road graph.
//!
//! A car is a three-state machine (idle, moving, arrived) over a private
//! body holding position, heading and the remaining path. Node entries are
//! reported to the caller as [`CarEvent`] values so the caller decides which
//! business or exit reacts to them.

use std::time::Duration;

use gateway_town_core::CarId;
use gateway_town_fsm::{FsmError, StateMachine, StateMachineBuilder};
use gateway_town_graph::{Graph, GraphNode, NodeId};
use glam::Vec2;

/// Travel speed in world units per second used when no override is given.
pub const DEFAULT_SPEED: f32 = 1.5;

/// Controller state of a car.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CarState {
    /// Waiting for a usable path.
    Idle,
    /// Travelling along the path.
    Moving,
    /// Reached the end of the path.
    Arrived,
}

/// Message emitted while a car travels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarEvent {
    /// The car reached a node of its path.
    EnteredNode {
        /// Car that moved.
        car: CarId,
        /// Node that was reached.
        node: NodeId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Waypoint {
    node: NodeId,
    position: Vec2,
}

#[derive(Clone, Debug, PartialEq)]
struct Body {
    position: Vec2,
    heading: Vec2,
    speed: f32,
    path: Vec<Waypoint>,
    next: usize,
    entered: Vec<NodeId>,
}

impl Body {
    fn new(position: Vec2, heading: Vec2, speed: f32) -> Self {
        Self {
            position,
            heading: heading.normalize_or_zero(),
            speed,
            path: Vec::new(),
            next: 0,
            entered: Vec::new(),
        }
    }

    fn target(&self) -> Option<Waypoint> {
        self.path.get(self.next).copied()
    }

    fn can_depart(&self) -> bool {
        self.path.len() > 2
    }

    /// Spends `speed * dt` of travel, passing as many nodes as the budget allows.
    fn advance(&mut self, dt: Duration) {
        let mut budget = self.speed * dt.as_secs_f32();
        while let Some(target) = self.target() {
            let offset = target.position - self.position;
            let distance = offset.length();
            if distance > f32::EPSILON {
                self.heading = offset / distance;
            }

            if budget >= distance {
                self.position = target.position;
                budget -= distance;
                self.entered.push(target.node);
                self.next += 1;
            } else {
                self.position += self.heading * budget;
                budget = 0.0;
            }

            if budget <= 0.0 {
                break;
            }
        }
    }
}

/// Shared controller declaration cloned into every car.
#[derive(Clone, Debug)]
pub struct CarMachine(StateMachine<CarState, Body>);

impl CarMachine {
    /// Assembles the controller.
    pub fn new() -> Result<Self, FsmError> {
        StateMachineBuilder::<CarState, Body>::new()
            .with_state(CarState::Idle)
            .with_transition(CarState::Moving, Body::can_depart)
            .with_state(CarState::Moving)
            .with_on_run(Body::advance)
            .with_transition(CarState::Arrived, |body| body.target().is_none())
            .with_state(CarState::Arrived)
            .with_transition(CarState::Idle, |body| body.target().is_some())
            .build()
            .map(Self)
    }
}

/// Visitor driving through town.
#[derive(Clone, Debug)]
pub struct Car {
    id: CarId,
    body: Body,
    machine: StateMachine<CarState, Body>,
    exited: bool,
}

impl Car {
    /// Creates an idle car at `position`.
    #[must_use]
    pub fn new(id: CarId, machine: &CarMachine, position: Vec2, heading: Vec2, speed: f32) -> Self {
        let mut machine = machine.0.clone();
        machine.reset();
        Self {
            id,
            body: Body::new(position, heading, speed),
            machine,
            exited: false,
        }
    }

    /// Reinitialises the car as if it had just been created.
    pub fn reset(&mut self, position: Vec2, heading: Vec2, speed: f32) {
        self.body = Body::new(position, heading, speed);
        self.machine.reset();
        self.exited = false;
    }

    /// Identifier of the car.
    #[must_use]
    pub const fn id(&self) -> CarId {
        self.id
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.body.position
    }

    /// Unit vector of the last movement.
    #[must_use]
    pub const fn heading(&self) -> Vec2 {
        self.body.heading
    }

    /// Orientation in radians, counter-clockwise from the +X axis.
    #[must_use]
    pub fn rotation(&self) -> f32 {
        self.body.heading.y.atan2(self.body.heading.x)
    }

    /// Travel speed in world units per second.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.body.speed
    }

    /// Changes the travel speed.
    pub fn set_speed(&mut self, speed: f32) {
        self.body.speed = speed;
    }

    /// Controller state. Cars that never ticked report idle.
    #[must_use]
    pub fn state(&self) -> CarState {
        self.machine.current().unwrap_or(CarState::Idle)
    }

    /// Nodes of the current path.
    pub fn path(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.body.path.iter().map(|waypoint| waypoint.node)
    }

    /// Node the car is heading to.
    #[must_use]
    pub fn target(&self) -> Option<NodeId> {
        self.body.target().map(|waypoint| waypoint.node)
    }

    /// Last node of the current path.
    #[must_use]
    pub fn destination(&self) -> Option<NodeId> {
        self.body.path.last().map(|waypoint| waypoint.node)
    }

    /// Reports whether the path is long enough to leave the idle state.
    #[must_use]
    pub fn has_route(&self) -> bool {
        self.body.can_depart()
    }

    /// Removes the car from the simulation until it is reset.
    pub fn exit(&mut self) {
        self.exited = true;
    }

    /// Reports whether the car left the simulation.
    #[must_use]
    pub const fn is_exited(&self) -> bool {
        self.exited
    }

    /// Reports whether the car still simulates.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.exited
    }

    /// Routes the car to `destination`.
    ///
    /// Without `start_at` the path starts at the node closest to the car.
    /// Returns false when no path exists; the car then keeps no target.
    pub fn drive_to<T: GraphNode>(
        &mut self,
        graph: &mut Graph<T>,
        destination: NodeId,
        start_at: Option<NodeId>,
    ) -> bool {
        let start = start_at.or_else(|| graph.closest_node_to_point(self.body.position));
        let nodes = match start {
            Some(start) => graph.get_path(start, destination),
            None => Vec::new(),
        };

        self.body.path = nodes
            .into_iter()
            .filter_map(|node| {
                graph
                    .position(node)
                    .map(|position| Waypoint { node, position })
            })
            .collect();
        self.body.next = 0;

        if self.body.path.is_empty() {
            tracing::debug!(car = self.id.get(), ?destination, "no path to destination");
            return false;
        }
        true
    }

    /// Advances the car by `dt`, reporting every node it reached.
    pub fn tick(&mut self, dt: Duration, out: &mut Vec<CarEvent>) {
        if self.exited {
            return;
        }
        self.machine.run(&mut self.body, dt);
        let car = self.id;
        out.extend(
            self.body
                .entered
                .drain(..)
                .map(|node| CarEvent::EnteredNode { car, node }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_on_line(points: &[f32]) -> Body {
        let mut body = Body::new(Vec2::ZERO, Vec2::X, 1.0);
        body.path = points
            .iter()
            .enumerate()
            .map(|(index, x)| Waypoint {
                node: NodeId::new(index as u32),
                position: Vec2::new(*x, 0.0),
            })
            .collect();
        body
    }

    #[test]
    fn advance_snaps_and_carries_leftover_budget() {
        let mut body = body_on_line(&[0.0, 0.5, 1.0, 3.0]);
        body.advance(Duration::from_millis(1_500));

        assert!((body.position.x - 1.5).abs() < 1e-5);
        assert_eq!(body.entered.len(), 3, "start node and two segment ends");
        assert_eq!(body.next, 3);
    }

    #[test]
    fn zero_budget_still_enters_a_node_underfoot() {
        let mut body = body_on_line(&[0.0, 1.0, 2.0]);
        body.advance(Duration::ZERO);

        assert_eq!(body.entered, vec![NodeId::new(0)]);
        assert_eq!(body.position, Vec2::ZERO);
    }

    #[test]
    fn heading_follows_the_segment() {
        let mut body = Body::new(Vec2::ZERO, Vec2::X, 1.0);
        body.path = vec![Waypoint {
            node: NodeId::new(0),
            position: Vec2::new(0.0, 4.0),
        }];
        body.advance(Duration::from_secs(1));

        assert!(body.heading.abs_diff_eq(Vec2::Y, 1e-6));
        assert!((body.position.y - 1.0).abs() < 1e-5);
    }
}
