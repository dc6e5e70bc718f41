#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Road-graph builder that turns placed tiles into a navigable directed graph.
//!
//! The graph is rebuilt wholesale from the map with [`RoadGraph::redraw`].
//! Every road-connected object contributes its lanes, endpoints are
//! deduplicated by quantized position and the resulting nodes are classified
//! into entrances, exits and business destinations.

pub mod lanes;

use std::collections::HashMap;

use gateway_town_core::{quantize, Coordinate, GridService, WorldBounds};
use gateway_town_graph::{Graph, GraphNode, NodeId};
use gateway_town_world::{Map, MapObject, ObjectTemplate};
use glam::Vec2;
use rand::{seq::SliceRandom, Rng};

use lanes::{driveway_lanes, road_lanes, turn_samples, Lane};

/// Point on the road network.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadNode {
    position: Vec2,
    starting: bool,
    exit: bool,
    destination: bool,
    dir_to_next: Option<Vec2>,
}

impl GraphNode for RoadNode {
    fn from_position(position: Vec2) -> Self {
        Self {
            position,
            starting: false,
            exit: false,
            destination: false,
            dir_to_next: None,
        }
    }

    fn position(&self) -> Vec2 {
        self.position
    }
}

impl RoadNode {
    /// Cars spawn here.
    #[must_use]
    pub const fn is_starting(&self) -> bool {
        self.starting
    }

    /// Cars leave the simulation here.
    #[must_use]
    pub const fn is_exit(&self) -> bool {
        self.exit
    }

    /// A business admits cars here.
    #[must_use]
    pub const fn is_destination(&self) -> bool {
        self.destination
    }

    /// Heading of the first lane leaving an entrance.
    #[must_use]
    pub const fn dir_to_next(&self) -> Option<Vec2> {
        self.dir_to_next
    }
}

/// Business reached through a destination node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusinessLink {
    /// Cell of the business.
    pub business: Coordinate,
    /// Node where released customers rejoin the road.
    pub exit: NodeId,
}

/// Directed road network derived from the map.
#[derive(Debug)]
pub struct RoadGraph {
    grid: GridService,
    center: Vec2,
    graph: Graph<RoadNode>,
    entrances: Vec<NodeId>,
    exits: Vec<NodeId>,
    destinations: Vec<NodeId>,
    links: HashMap<NodeId, BusinessLink>,
}

impl RoadGraph {
    /// Creates an empty road graph for the provided grid and bounds.
    #[must_use]
    pub fn new(grid: GridService, bounds: WorldBounds) -> Self {
        Self {
            grid,
            center: bounds.center(),
            graph: Graph::new(),
            entrances: Vec::new(),
            exits: Vec::new(),
            destinations: Vec::new(),
            links: HashMap::new(),
        }
    }

    /// Discards the previous network and rebuilds it from the map contents.
    pub fn redraw(&mut self, map: &Map) {
        self.graph = Graph::new();
        self.entrances.clear();
        self.exits.clear();
        self.destinations.clear();
        self.links.clear();

        for object in map.all_objects() {
            if object.is_road_connected() {
                self.connect(&object);
            }
        }

        for (id, node) in self.graph.nodes() {
            if node.starting {
                self.entrances.push(id);
            }
            if node.exit {
                self.exits.push(id);
            }
            if node.destination {
                self.destinations.push(id);
            }
        }
        self.graph.resize_solver();

        let before = self.destinations.len();
        match self.entrances.first().copied() {
            Some(entrance) => {
                let graph = &mut self.graph;
                self.destinations
                    .retain(|&destination| graph.has_path(entrance, destination));
            }
            None => self.destinations.clear(),
        }

        tracing::info!(
            nodes = self.graph.node_count(),
            entrances = self.entrances.len(),
            exits = self.exits.len(),
            destinations = self.destinations.len(),
            pruned = before - self.destinations.len(),
            "road graph rebuilt"
        );
    }

    /// Reports whether every entrance reaches every exit in another cell.
    ///
    /// A network without entrances or exits is never valid.
    pub fn is_map_valid(&mut self) -> bool {
        if self.entrances.is_empty() || self.exits.is_empty() {
            tracing::warn!(
                entrances = self.entrances.len(),
                exits = self.exits.len(),
                "road graph has no entrance or exit"
            );
            return false;
        }

        for &entrance in &self.entrances {
            for &exit in &self.exits {
                if self.same_cell(entrance, exit) {
                    continue;
                }
                if !self.graph.has_path(entrance, exit) {
                    tracing::warn!(?entrance, ?exit, "exit unreachable from entrance");
                    return false;
                }
            }
        }
        true
    }

    /// Returns the node at `position`, creating it when absent.
    pub fn get_or_create(&mut self, position: Vec2) -> NodeId {
        self.graph.get_or_create(position)
    }

    /// Underlying graph.
    #[must_use]
    pub fn graph(&self) -> &Graph<RoadNode> {
        &self.graph
    }

    /// Mutable underlying graph, needed for path queries.
    #[must_use]
    pub fn graph_mut(&mut self) -> &mut Graph<RoadNode> {
        &mut self.graph
    }

    /// Grid the network was built on.
    #[must_use]
    pub const fn grid(&self) -> &GridService {
        &self.grid
    }

    /// Spawn points in node order.
    #[must_use]
    pub fn entrances(&self) -> &[NodeId] {
        &self.entrances
    }

    /// Despawn points in node order.
    #[must_use]
    pub fn exits(&self) -> &[NodeId] {
        &self.exits
    }

    /// Reachable business destinations in node order.
    #[must_use]
    pub fn destinations(&self) -> &[NodeId] {
        &self.destinations
    }

    /// Picks a uniformly random entrance.
    pub fn random_entrance<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<NodeId> {
        self.entrances.choose(rng).copied()
    }

    /// Picks a uniformly random exit.
    pub fn random_exit<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<NodeId> {
        self.exits.choose(rng).copied()
    }

    /// Picks a uniformly random reachable destination.
    pub fn random_destination<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<NodeId> {
        self.destinations.choose(rng).copied()
    }

    /// Business admitting cars at `node`, if any.
    #[must_use]
    pub fn business_at(&self, node: NodeId) -> Option<BusinessLink> {
        self.links.get(&node).copied()
    }

    /// Node where customers of the business at `business` rejoin the road.
    #[must_use]
    pub fn business_exit(&self, business: Coordinate) -> Option<NodeId> {
        self.links
            .values()
            .find(|link| link.business == business)
            .map(|link| link.exit)
    }

    /// Reports whether `node` removes cars from the simulation.
    #[must_use]
    pub fn is_exit(&self, node: NodeId) -> bool {
        self.graph.node(node).is_some_and(RoadNode::is_exit)
    }

    /// Cell containing the node.
    #[must_use]
    pub fn cell_of(&self, node: NodeId) -> Option<Coordinate> {
        self.graph
            .position(node)
            .map(|position| self.grid.coordinate_of(position))
    }

    /// Reports whether two nodes snap to the same cell.
    #[must_use]
    pub fn same_cell(&self, a: NodeId, b: NodeId) -> bool {
        match (self.cell_of(a), self.cell_of(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn connect(&mut self, object: &MapObject) {
        let origin = self.grid.position_of(object.coordinate());
        match object.template() {
            ObjectTemplate::Road(road) => {
                for lane in road_lanes(road.variant()) {
                    self.add_road_lane(origin, &lane, road.is_starter());
                }
            }
            ObjectTemplate::Business(business) => {
                let Some(layout) = business.stop() else {
                    return;
                };
                let (entry, exit) = driveway_lanes(layout.facing);
                let (_, destination) = self.add_straight(origin, &entry);
                let (_, rejoin) = self.add_straight(origin, &exit);
                if let Some(node) = self.graph.node_mut(destination) {
                    node.destination = true;
                }
                let _ = self.links.insert(
                    destination,
                    BusinessLink {
                        business: object.coordinate(),
                        exit: rejoin,
                    },
                );
            }
            ObjectTemplate::Decor(_) => {}
        }
    }

    fn world_point(&self, origin: Vec2, local: Vec2) -> Vec2 {
        quantize(origin + local * self.grid.cell_size())
    }

    fn add_straight(&mut self, origin: Vec2, lane: &Lane) -> (NodeId, NodeId) {
        let start = self.get_or_create(self.world_point(origin, lane.start));
        let end = self.get_or_create(self.world_point(origin, lane.end));
        self.graph.add_neighbor(start, end);
        (start, end)
    }

    fn add_road_lane(&mut self, origin: Vec2, lane: &Lane, starter: bool) {
        if !lane.is_straight() {
            let p0 = self.world_point(origin, lane.start);
            let p4 = self.world_point(origin, lane.end);
            let mut previous = self.get_or_create(p0);
            for sample in turn_samples(p0, p4, lane.receiving, lane.degree) {
                let next = self.get_or_create(sample);
                self.graph.add_neighbor(previous, next);
                previous = next;
            }
            let end = self.get_or_create(p4);
            self.graph.add_neighbor(previous, end);
            return;
        }

        let (start, end) = self.add_straight(origin, lane);
        if !starter {
            return;
        }
        let (Some(from), Some(to)) = (self.graph.position(start), self.graph.position(end)) else {
            return;
        };
        let heading = (to - from).normalize_or_zero();
        let here = from.distance(self.center);
        let stepped = (from + heading).distance(self.center);
        if here > stepped {
            if let Some(node) = self.graph.node_mut(start) {
                node.starting = true;
                node.dir_to_next = Some(heading);
            }
        } else if here < stepped {
            if let Some(node) = self.graph.node_mut(end) {
                node.exit = true;
            }
        }
    }
}
