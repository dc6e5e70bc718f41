use std::time::Duration;

use gateway_town_core::CarId;
use gateway_town_graph::{Graph, GraphNode, NodeId};
use gateway_town_system_movement::{Car, CarEvent, CarMachine, CarState, DEFAULT_SPEED};
use glam::Vec2;

#[derive(Debug)]
struct Stop {
    position: Vec2,
}

impl GraphNode for Stop {
    fn from_position(position: Vec2) -> Self {
        Self { position }
    }

    fn position(&self) -> Vec2 {
        self.position
    }
}

fn street(length: usize) -> (Graph<Stop>, Vec<NodeId>) {
    let mut graph = Graph::new();
    let nodes: Vec<NodeId> = (0..length)
        .map(|x| graph.get_or_create(Vec2::new(x as f32, 0.0)))
        .collect();
    for pair in nodes.windows(2) {
        graph.add_neighbor(pair[0], pair[1]);
    }
    graph.resize_solver();
    (graph, nodes)
}

fn car_at(position: Vec2, speed: f32) -> Car {
    let machine = CarMachine::new().expect("car machine");
    Car::new(CarId::new(7), &machine, position, Vec2::X, speed)
}

fn entered(events: &[CarEvent]) -> Vec<NodeId> {
    events
        .iter()
        .map(|event| match event {
            CarEvent::EnteredNode { node, .. } => *node,
        })
        .collect()
}

#[test]
fn fast_car_passes_several_nodes_in_one_tick() {
    let (mut graph, nodes) = street(5);
    let mut car = car_at(Vec2::ZERO, 2.5);
    assert!(car.drive_to(&mut graph, nodes[4], None));

    let mut events = Vec::new();
    car.tick(Duration::from_secs(1), &mut events);
    assert_eq!(car.state(), CarState::Moving, "first tick only departs");
    assert!(events.is_empty());

    car.tick(Duration::from_secs(1), &mut events);
    assert!(
        car.position().x >= 2.0 - 1e-5,
        "car must not stall at the first node, ended at {:?}",
        car.position()
    );
    assert_eq!(entered(&events), nodes[..3].to_vec());

    events.clear();
    car.tick(Duration::from_secs(1), &mut events);
    assert!(car.position().abs_diff_eq(Vec2::new(4.0, 0.0), 1e-5));
    assert_eq!(entered(&events), nodes[3..].to_vec());
    assert_eq!(car.state(), CarState::Arrived);
    assert_eq!(car.target(), None);
}

#[test]
fn pathless_car_stays_idle() {
    let mut graph = Graph::<Stop>::new();
    let a = graph.get_or_create(Vec2::ZERO);
    let b = graph.get_or_create(Vec2::new(3.0, 0.0));
    graph.resize_solver();
    let mut car = car_at(Vec2::ZERO, DEFAULT_SPEED);

    assert!(!car.drive_to(&mut graph, b, Some(a)));

    let mut events = Vec::new();
    for _ in 0..10 {
        car.tick(Duration::from_millis(100), &mut events);
    }
    assert_eq!(car.state(), CarState::Idle);
    assert_eq!(car.position(), Vec2::ZERO);
    assert!(events.is_empty());
}

#[test]
fn trivial_path_does_not_depart() {
    let (mut graph, nodes) = street(2);
    let mut car = car_at(Vec2::ZERO, DEFAULT_SPEED);

    assert!(car.drive_to(&mut graph, nodes[1], None));
    assert!(!car.has_route());

    let mut events = Vec::new();
    car.tick(Duration::from_secs(1), &mut events);
    assert_eq!(car.state(), CarState::Idle);
}

#[test]
fn rerouting_after_arrival_resumes_travel() {
    let (mut graph, nodes) = street(4);
    let back = graph.get_or_create(Vec2::new(3.0, 1.0));
    let last = nodes[3];
    graph.add_neighbor(last, back);
    let home = graph.get_or_create(Vec2::new(0.0, 1.0));
    graph.add_neighbor(back, home);
    graph.resize_solver();

    let mut car = car_at(Vec2::ZERO, 10.0);
    let mut events = Vec::new();
    assert!(car.drive_to(&mut graph, last, None));
    for _ in 0..3 {
        car.tick(Duration::from_secs(1), &mut events);
    }
    assert_eq!(car.state(), CarState::Arrived);

    assert!(car.drive_to(&mut graph, home, Some(nodes[2])));
    car.tick(Duration::from_millis(10), &mut events);
    assert_eq!(car.state(), CarState::Idle, "a new target wakes the car");
    car.tick(Duration::from_millis(10), &mut events);
    assert_eq!(car.state(), CarState::Moving);

    for _ in 0..5 {
        car.tick(Duration::from_secs(1), &mut events);
    }
    assert!(car.position().abs_diff_eq(Vec2::new(0.0, 1.0), 1e-5));
    assert_eq!(car.state(), CarState::Arrived);
}

#[test]
fn closest_node_is_used_without_explicit_start() {
    let (mut graph, nodes) = street(4);
    let mut car = car_at(Vec2::new(1.1, 0.2), DEFAULT_SPEED);

    assert!(car.drive_to(&mut graph, nodes[3], None));

    assert_eq!(car.path().collect::<Vec<_>>(), nodes[1..].to_vec());
    assert_eq!(car.destination(), Some(nodes[3]));
}

#[test]
fn exited_car_ignores_ticks_until_reset() {
    let (mut graph, nodes) = street(4);
    let mut car = car_at(Vec2::ZERO, DEFAULT_SPEED);
    assert!(car.drive_to(&mut graph, nodes[3], None));
    car.exit();

    let mut events = Vec::new();
    car.tick(Duration::from_secs(1), &mut events);
    car.tick(Duration::from_secs(1), &mut events);
    assert!(!car.is_active());
    assert_eq!(car.position(), Vec2::ZERO);

    car.reset(Vec2::new(3.0, 0.0), -Vec2::X, 4.0);
    assert!(car.is_active());
    assert_eq!(car.state(), CarState::Idle);
    assert_eq!(car.path().count(), 0, "reset drops the old path");
    assert_eq!(car.speed(), 4.0);
}
