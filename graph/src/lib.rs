#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Generic directed graph with a breadth-first path solver.
//!
//! Nodes are keyed by their quantized position so that two contributors
//! describing the same physical point share a single node. Lookups also
//! search the neighbouring keys, so points closer than [`MERGE_DISTANCE`]
//! share a node even when they round to different keys. Graphs are
//! rebuilt wholesale rather than edited, so there is no edge removal.

use std::collections::{HashMap, VecDeque};

use gateway_town_core::QuantizedPosition;
use glam::Vec2;

/// Positions closer than this resolve to the same node.
pub const MERGE_DISTANCE: f32 = 0.005;

/// Payload stored in a [`Graph`].
pub trait GraphNode {
    /// Creates a payload located at the provided (already quantized) position.
    fn from_position(position: Vec2) -> Self;

    /// Location of the node in world units.
    fn position(&self) -> Vec2;
}

/// Identifier of a node inside a single [`Graph`] instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a new identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Entry<T> {
    value: T,
    anchor: Vec2,
    neighbors: Vec<NodeId>,
}

/// Directed graph over nodes of type `T`.
#[derive(Debug)]
pub struct Graph<T> {
    entries: Vec<Entry<T>>,
    index: HashMap<QuantizedPosition, NodeId>,
    solver: PathSolver,
}

impl<T> Default for Graph<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            solver: PathSolver::default(),
        }
    }
}

impl<T: GraphNode> Graph<T> {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node, returning the existing identifier when another node
    /// already occupies the same quantized position.
    pub fn register_node(&mut self, node: T) -> NodeId {
        let anchor = node.position();
        match self.find(anchor) {
            Some(existing) => existing,
            None => self.insert(node, anchor),
        }
    }

    /// Returns the node at `position`, creating it when absent.
    ///
    /// Positions closer than [`MERGE_DISTANCE`] to an existing node, or
    /// rounding to its key, resolve to that node.
    pub fn get_or_create(&mut self, position: Vec2) -> NodeId {
        match self.find(position) {
            Some(existing) => existing,
            None => {
                let key = QuantizedPosition::from_position(position);
                self.insert(T::from_position(key.to_position()), position)
            }
        }
    }

    /// Node registered at `position`, if any.
    ///
    /// The closest node within [`MERGE_DISTANCE`] wins, lowest id on ties.
    /// Failing that, a node sharing the quantized key is returned.
    #[must_use]
    pub fn find(&self, position: Vec2) -> Option<NodeId> {
        let key = QuantizedPosition::from_position(position);
        let mut best: Option<(f32, NodeId)> = None;
        for neighbor in key.block() {
            let Some(&id) = self.index.get(&neighbor) else {
                continue;
            };
            let Some(entry) = self.entries.get(id.index()) else {
                continue;
            };
            let distance = entry.anchor.distance(position);
            if distance >= MERGE_DISTANCE {
                continue;
            }
            let closer = match best {
                Some((current, current_id)) => (distance, id) < (current, current_id),
                None => true,
            };
            if closer {
                best = Some((distance, id));
            }
        }
        best.map(|(_, id)| id)
            .or_else(|| self.index.get(&key).copied())
    }

    fn insert(&mut self, node: T, anchor: Vec2) -> NodeId {
        let key = QuantizedPosition::from_position(anchor);
        let id = NodeId::new(self.entries.len() as u32);
        self.entries.push(Entry {
            value: node,
            anchor,
            neighbors: Vec::new(),
        });
        let _ = self.index.insert(key, id);
        id
    }

    /// Adds a directed edge. Repeated edges and unknown nodes are ignored.
    pub fn add_neighbor(&mut self, from: NodeId, to: NodeId) {
        if to.index() >= self.entries.len() {
            return;
        }
        let Some(entry) = self.entries.get_mut(from.index()) else {
            return;
        };
        if !entry.neighbors.contains(&to) {
            entry.neighbors.push(to);
        }
    }

    /// Payload of the node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&T> {
        self.entries.get(id.index()).map(|entry| &entry.value)
    }

    /// Mutable payload of the node.
    #[must_use]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.entries.get_mut(id.index()).map(|entry| &mut entry.value)
    }

    /// Position of the node, if it exists.
    #[must_use]
    pub fn position(&self, id: NodeId) -> Option<Vec2> {
        self.node(id).map(GraphNode::position)
    }

    /// Outgoing neighbours of the node.
    #[must_use]
    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        match self.entries.get(id.index()) {
            Some(entry) => &entry.neighbors,
            None => &[],
        }
    }

    /// Iterates over every node in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (NodeId::new(index as u32), &entry.value))
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.entries.len()
    }

    /// Sizes the solver scratch buffers for the current node count.
    pub fn resize_solver(&mut self) {
        self.solver.resize(self.entries.len());
    }

    /// Shortest path by edge count from `start` to `goal`, both inclusive.
    ///
    /// Returns an empty path when the goal cannot be reached or either node
    /// is unknown.
    pub fn get_path(&mut self, start: NodeId, goal: NodeId) -> Vec<NodeId> {
        if start.index() >= self.entries.len() || goal.index() >= self.entries.len() {
            return Vec::new();
        }
        self.solver.resize(self.entries.len());
        self.solver.solve(&self.entries, start, goal)
    }

    /// Reports whether `goal` is reachable from `start`.
    pub fn has_path(&mut self, start: NodeId, goal: NodeId) -> bool {
        !self.get_path(start, goal).is_empty()
    }

    /// Node nearest to `point` by Euclidean distance.
    #[must_use]
    pub fn closest_node_to_point(&self, point: Vec2) -> Option<NodeId> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (index, entry.value.position().distance_squared(point)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(index, _)| NodeId::new(index as u32))
    }
}

/// Breadth-first scratch space reused across queries.
///
/// Visit marks carry a generation stamp so buffers never need clearing
/// between searches.
#[derive(Debug, Default)]
struct PathSolver {
    stamps: Vec<u32>,
    parents: Vec<u32>,
    generation: u32,
    queue: VecDeque<NodeId>,
}

impl PathSolver {
    fn resize(&mut self, node_count: usize) {
        if self.stamps.len() != node_count {
            self.stamps = vec![0; node_count];
            self.parents = vec![u32::MAX; node_count];
            self.generation = 0;
        }
    }

    fn next_generation(&mut self) -> u32 {
        if self.generation == u32::MAX {
            self.stamps.fill(0);
            self.generation = 0;
        }
        self.generation += 1;
        self.generation
    }

    fn solve<T>(&mut self, entries: &[Entry<T>], start: NodeId, goal: NodeId) -> Vec<NodeId> {
        let generation = self.next_generation();
        self.queue.clear();
        self.stamps[start.index()] = generation;
        self.parents[start.index()] = u32::MAX;
        self.queue.push_back(start);

        let mut found = false;
        while let Some(current) = self.queue.pop_front() {
            if current == goal {
                found = true;
                break;
            }

            for &next in &entries[current.index()].neighbors {
                if self.stamps[next.index()] == generation {
                    continue;
                }
                self.stamps[next.index()] = generation;
                self.parents[next.index()] = current.get();
                self.queue.push_back(next);
            }
        }

        if !found {
            return Vec::new();
        }

        let mut path = vec![goal];
        let mut cursor = goal;
        while cursor != start {
            let parent = self.parents[cursor.index()];
            if parent == u32::MAX {
                return Vec::new();
            }
            cursor = NodeId::new(parent);
            path.push(cursor);
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Point(Vec2);

    impl GraphNode for Point {
        fn from_position(position: Vec2) -> Self {
            Self(position)
        }

        fn position(&self) -> Vec2 {
            self.0
        }
    }

    #[test]
    fn get_or_create_deduplicates_close_positions() {
        let mut graph = Graph::<Point>::new();
        let first = graph.get_or_create(Vec2::new(0.5, 0.25));
        let second = graph.get_or_create(Vec2::new(0.5004, 0.2497));
        assert_eq!(first, second, "sub-quantum drift must reuse the node");
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn positions_straddling_a_rounding_boundary_share_a_node() {
        let mut graph = Graph::<Point>::new();
        let pairs = [
            (Vec2::new(0.004, 0.0), Vec2::new(0.006, 0.0)),
            (Vec2::new(3.0, 0.004), Vec2::new(3.0, 0.006)),
            (Vec2::new(2.004, 2.004), Vec2::new(2.006, 2.006)),
        ];
        for (first, second) in pairs {
            let a = graph.get_or_create(first);
            let b = graph.get_or_create(second);
            assert_eq!(a, b, "{first:?} and {second:?} are closer than the merge distance");
            assert_eq!(graph.find(second), Some(a));
        }
        assert_eq!(graph.node_count(), pairs.len());
    }

    #[test]
    fn positions_beyond_the_merge_distance_stay_apart() {
        let mut graph = Graph::<Point>::new();
        let a = graph.get_or_create(Vec2::new(5.0, 0.0));
        let b = graph.get_or_create(Vec2::new(5.006, 0.0));
        assert_ne!(a, b);
        assert_eq!(graph.find(Vec2::new(5.0021, 0.0)), Some(a), "closest node wins");
        assert_eq!(graph.find(Vec2::new(7.0, 0.0)), None);
    }

    #[test]
    fn add_neighbor_ignores_duplicates() {
        let mut graph = Graph::<Point>::new();
        let a = graph.get_or_create(Vec2::ZERO);
        let b = graph.get_or_create(Vec2::X);
        graph.add_neighbor(a, b);
        graph.add_neighbor(a, b);
        assert_eq!(graph.neighbors(a), &[b]);
        assert!(graph.neighbors(b).is_empty(), "edges are directed");
    }

    #[test]
    fn solver_reuses_buffers_between_queries() {
        let mut graph = Graph::<Point>::new();
        let ids: Vec<_> = (0..5)
            .map(|i| graph.get_or_create(Vec2::new(i as f32, 0.0)))
            .collect();
        for pair in ids.windows(2) {
            graph.add_neighbor(pair[0], pair[1]);
        }
        graph.resize_solver();

        assert_eq!(graph.get_path(ids[0], ids[4]), ids);
        assert_eq!(graph.get_path(ids[1], ids[3]), ids[1..4].to_vec());
        assert!(graph.get_path(ids[4], ids[0]).is_empty());
        assert_eq!(graph.get_path(ids[2], ids[2]), vec![ids[2]]);
    }
}
