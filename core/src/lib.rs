#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Gateway Town simulation.
//!
//! This crate defines the vocabulary every other crate speaks: integer grid
//! [`Coordinate`] values and the [`GridService`] that maps them to continuous
//! positions, cardinal and diagonal neighbourhood helpers used by autotiling,
//! the collaborator contracts the simulation consumes ([`Economy`],
//! [`Notifier`], [`InputSnapshot`]) and the fire-and-forget [`TownEvent`]
//! values that presentation adapters may react to. Nothing in here owns
//! simulation state.

use std::{
    fmt,
    ops::{Add, BitOr, BitOrAssign, Not, Sub},
};

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Title of the message shown when a session starts.
pub const WELCOME_BANNER: &str = "Welcome to Gateway Town Tycoon";

/// Unique identifier assigned to a car when it is first manufactured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarId(u32);

impl CarId {
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
}

/// Integer address of a single grid cell.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Coordinate {
    x: i32,
    y: i32,
}

impl Coordinate {
    /// Creates a new coordinate from its components.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal component, growing towards the east.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical component, growing towards the north.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Computes the Manhattan distance between two coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: Coordinate) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Computes the Chebyshev (king move) distance between two coordinates.
    #[must_use]
    pub fn chebyshev_distance(self, other: Coordinate) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

impl Add for Coordinate {
    type Output = Coordinate;

    fn add(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Coordinate {
    type Output = Coordinate;

    fn sub(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

/// Cardinal directions used for facings and road connection sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards increasing `y`.
    North,
    /// Towards increasing `x`.
    East,
    /// Towards decreasing `y`.
    South,
    /// Towards decreasing `x`.
    West,
}

impl Direction {
    /// Every direction in clockwise order starting at north.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Number of distinct facings a [`Direction`] can take.
    pub const COUNT: usize = 4;

    /// Direction pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// Next direction when turning a quarter clockwise.
    #[must_use]
    pub const fn rotated_clockwise(self) -> Self {
        match self {
            Self::North => Self::East,
            Self::East => Self::South,
            Self::South => Self::West,
            Self::West => Self::North,
        }
    }

    /// Unit vector pointing in this direction.
    #[must_use]
    pub fn unit(self) -> Vec2 {
        match self {
            Self::North => Vec2::new(0.0, 1.0),
            Self::East => Vec2::new(1.0, 0.0),
            Self::South => Vec2::new(0.0, -1.0),
            Self::West => Vec2::new(-1.0, 0.0),
        }
    }

    /// Offset to the orthogonal neighbour in this direction.
    #[must_use]
    pub const fn offset(self) -> Coordinate {
        match self {
            Self::North => Coordinate::new(0, 1),
            Self::East => Coordinate::new(1, 0),
            Self::South => Coordinate::new(0, -1),
            Self::West => Coordinate::new(-1, 0),
        }
    }

    /// Bit this direction occupies within a [`DirectionMask`].
    #[must_use]
    pub const fn mask(self) -> DirectionMask {
        match self {
            Self::North => DirectionMask::NORTH,
            Self::East => DirectionMask::EAST,
            Self::South => DirectionMask::SOUTH,
            Self::West => DirectionMask::WEST,
        }
    }
}

/// One of the eight cells surrounding a coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Neighbor {
    /// Directly above.
    North,
    /// Directly below.
    South,
    /// Directly right.
    East,
    /// Directly left.
    West,
    /// Above and right.
    NorthEast,
    /// Above and left.
    NorthWest,
    /// Below and right.
    SouthEast,
    /// Below and left.
    SouthWest,
}

impl Neighbor {
    /// All eight neighbours in mask bit order.
    pub const ALL: [Neighbor; 8] = [
        Neighbor::North,
        Neighbor::South,
        Neighbor::East,
        Neighbor::West,
        Neighbor::NorthEast,
        Neighbor::NorthWest,
        Neighbor::SouthEast,
        Neighbor::SouthWest,
    ];

    /// Offset from the observed cell to this neighbour.
    #[must_use]
    pub const fn offset(self) -> Coordinate {
        match self {
            Self::North => Coordinate::new(0, 1),
            Self::South => Coordinate::new(0, -1),
            Self::East => Coordinate::new(1, 0),
            Self::West => Coordinate::new(-1, 0),
            Self::NorthEast => Coordinate::new(1, 1),
            Self::NorthWest => Coordinate::new(-1, 1),
            Self::SouthEast => Coordinate::new(1, -1),
            Self::SouthWest => Coordinate::new(-1, -1),
        }
    }

    /// Bit representing this neighbour in a [`DirectionMask`].
    #[must_use]
    pub const fn mask(self) -> DirectionMask {
        match self {
            Self::North => DirectionMask::NORTH,
            Self::South => DirectionMask::SOUTH,
            Self::East => DirectionMask::EAST,
            Self::West => DirectionMask::WEST,
            Self::NorthEast => DirectionMask::NORTH_EAST,
            Self::NorthWest => DirectionMask::NORTH_WEST,
            Self::SouthEast => DirectionMask::SOUTH_EAST,
            Self::SouthWest => DirectionMask::SOUTH_WEST,
        }
    }

    /// Side of the neighbouring cell that faces back towards the observed cell.
    ///
    /// Diagonal neighbours touch only at a corner and therefore have no facing side.
    #[must_use]
    pub const fn facing_back(self) -> Option<Direction> {
        match self {
            Self::North => Some(Direction::South),
            Self::South => Some(Direction::North),
            Self::East => Some(Direction::West),
            Self::West => Some(Direction::East),
            Self::NorthEast | Self::NorthWest | Self::SouthEast | Self::SouthWest => None,
        }
    }
}

/// Eight-neighbour connectivity bitmask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectionMask(u8);

impl DirectionMask {
    /// No neighbour set.
    pub const NONE: Self = Self(0);
    /// North neighbour bit.
    pub const NORTH: Self = Self(1 << 0);
    /// South neighbour bit.
    pub const SOUTH: Self = Self(1 << 1);
    /// East neighbour bit.
    pub const EAST: Self = Self(1 << 2);
    /// West neighbour bit.
    pub const WEST: Self = Self(1 << 3);
    /// North-east neighbour bit.
    pub const NORTH_EAST: Self = Self(1 << 4);
    /// North-west neighbour bit.
    pub const NORTH_WEST: Self = Self(1 << 5);
    /// South-east neighbour bit.
    pub const SOUTH_EAST: Self = Self(1 << 6);
    /// South-west neighbour bit.
    pub const SOUTH_WEST: Self = Self(1 << 7);
    /// The four orthogonal bits.
    pub const CARDINALS: Self = Self(0b0000_1111);

    /// Builds a mask from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Reports whether every bit of `required` is also set in `self`.
    #[must_use]
    pub const fn contains_all(self, required: DirectionMask) -> bool {
        self.0 & required.0 == required.0
    }

    /// Mask with every bit flipped.
    #[must_use]
    pub const fn complement(self) -> Self {
        Self(!self.0)
    }

    /// Reports whether no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Cardinal directions present in the mask, clockwise from north.
    pub fn cardinals(self) -> impl Iterator<Item = Direction> {
        Direction::ALL
            .into_iter()
            .filter(move |direction| self.contains_all(direction.mask()))
    }
}

impl BitOr for DirectionMask {
    type Output = DirectionMask;

    fn bitor(self, rhs: DirectionMask) -> DirectionMask {
        DirectionMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for DirectionMask {
    fn bitor_assign(&mut self, rhs: DirectionMask) {
        self.0 |= rhs.0;
    }
}

impl Not for DirectionMask {
    type Output = DirectionMask;

    fn not(self) -> DirectionMask {
        self.complement()
    }
}

impl FromIterator<Direction> for DirectionMask {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        iter.into_iter()
            .fold(DirectionMask::NONE, |mask, direction| mask | direction.mask())
    }
}

impl FromIterator<Neighbor> for DirectionMask {
    fn from_iter<I: IntoIterator<Item = Neighbor>>(iter: I) -> Self {
        iter.into_iter()
            .fold(DirectionMask::NONE, |mask, neighbor| mask | neighbor.mask())
    }
}

/// Maps continuous positions onto the integer lattice and back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridService {
    cell_size: f32,
}

impl GridService {
    /// Creates a grid with the provided cell size in world units.
    #[must_use]
    pub const fn new(cell_size: f32) -> Self {
        Self { cell_size }
    }

    /// Edge length of a single square cell.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Rounds the position to the nearest cell.
    #[must_use]
    pub fn coordinate_of(&self, position: Vec2) -> Coordinate {
        Coordinate::new(self.axis_to_cell(position.x), self.axis_to_cell(position.y))
    }

    /// Centre of the provided cell.
    #[must_use]
    pub fn position_of(&self, coordinate: Coordinate) -> Vec2 {
        Vec2::new(
            coordinate.x() as f32 * self.cell_size,
            coordinate.y() as f32 * self.cell_size,
        )
    }

    /// Reports whether two positions snap to the same cell.
    #[must_use]
    pub fn same_cell(&self, a: Vec2, b: Vec2) -> bool {
        self.coordinate_of(a) == self.coordinate_of(b)
    }

    fn axis_to_cell(&self, value: f32) -> i32 {
        (value / self.cell_size).round() as i32
    }
}

/// Precision used when quantizing graph positions (two decimals).
pub const QUANTIZE_SCALE: f32 = 100.0;

/// Rounds both components of the position to two decimals.
#[must_use]
pub fn quantize(position: Vec2) -> Vec2 {
    let key = QuantizedPosition::from_position(position);
    key.to_position()
}

/// Hashable key of a position rounded to two decimals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuantizedPosition {
    x: i64,
    y: i64,
}

impl QuantizedPosition {
    /// Quantizes the provided position.
    #[must_use]
    pub fn from_position(position: Vec2) -> Self {
        Self {
            x: (position.x * QUANTIZE_SCALE).round() as i64,
            y: (position.y * QUANTIZE_SCALE).round() as i64,
        }
    }

    /// Position represented by the key.
    #[must_use]
    pub fn to_position(self) -> Vec2 {
        Vec2::new(
            self.x as f32 / QUANTIZE_SCALE,
            self.y as f32 / QUANTIZE_SCALE,
        )
    }

    /// The key itself and its eight neighbours, row by row.
    pub fn block(self) -> impl Iterator<Item = Self> {
        (-1..=1).flat_map(move |dx| {
            (-1..=1).map(move |dy| Self {
                x: self.x + dx,
                y: self.y + dy,
            })
        })
    }
}

/// Axis-aligned rectangle delimiting the playable area.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldBounds {
    min: Vec2,
    max: Vec2,
}

impl WorldBounds {
    /// Creates bounds spanning the two corners, in any order.
    #[must_use]
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates bounds from a centre point and full size.
    #[must_use]
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size.abs() * 0.5;
        Self::new(center - half, center + half)
    }

    /// Lower-left corner.
    #[must_use]
    pub const fn min(&self) -> Vec2 {
        self.min
    }

    /// Upper-right corner.
    #[must_use]
    pub const fn max(&self) -> Vec2 {
        self.max
    }

    /// Midpoint of the bounds.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Reports whether the point lies inside or on the edge of the bounds.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Every cell whose centre lies inside the bounds, in ascending order.
    #[must_use]
    pub fn cells(&self, grid: &GridService) -> Vec<Coordinate> {
        let low = grid.coordinate_of(self.min);
        let high = grid.coordinate_of(self.max);
        let mut cells = Vec::new();
        for x in low.x()..=high.x() {
            for y in low.y()..=high.y() {
                let coordinate = Coordinate::new(x, y);
                if self.contains(grid.position_of(coordinate)) {
                    cells.push(coordinate);
                }
            }
        }
        cells
    }
}

/// Money ledger the simulation charges and credits.
///
/// Implementations are the single source of truth for affordability; callers
/// never cache balances across ticks.
pub trait Economy {
    /// Credits the ledger.
    fn add_money(&mut self, amount: i64);
    /// Debits the ledger. Negative amounts credit it.
    fn spend_money(&mut self, amount: i64);
    /// Reports whether the balance covers `amount`.
    fn has_enough_money(&self, amount: i64) -> bool;
    /// Current balance.
    fn money(&self) -> i64;
    /// Replaces the town rating.
    fn set_town_rating(&mut self, rating: i64);
    /// Current town rating.
    fn town_rating(&self) -> i64;
}

/// Fire-and-forget sink for short user-facing notices.
pub trait Notifier {
    /// Queues a message. Identical in-flight messages are collapsed.
    fn enqueue(&mut self, message: &str);
}

/// Input state polled once per tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputSnapshot {
    /// Pointer position already converted to world units.
    pub pointer: Option<Vec2>,
    /// Primary button went down on this tick.
    pub primary_pressed: bool,
    /// Primary button is currently held.
    pub primary_held: bool,
    /// Secondary button went down on this tick.
    pub secondary_pressed: bool,
    /// Undo key went down on this tick.
    pub undo_pressed: bool,
    /// Escape key went down on this tick.
    pub escape_pressed: bool,
    /// Speed boost key is currently held.
    pub speed_boost_held: bool,
    /// The open message was dismissed on this tick.
    pub dismiss_message: bool,
}

/// Top-level phases of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Waiting for the opening message to close.
    Idle,
    /// Players mutate the map.
    Build,
    /// Cars traverse the road network.
    Play,
    /// Weekly message between play and build.
    TransitionToBuild,
    /// A random town event may fire.
    EventChance,
}

/// Presentation side effects broadcast by the simulation.
///
/// Adapters may play sounds or emit particles in response. The simulation
/// never reads these back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TownEvent {
    /// An object was placed by a player action.
    ObjectPlaced {
        /// Cell that received the object.
        coordinate: Coordinate,
    },
    /// An object was removed by a player action.
    ObjectErased {
        /// Cell that lost its object.
        coordinate: Coordinate,
    },
    /// A business earned money from a visitor.
    RevenueEarned {
        /// Cell of the earning business.
        coordinate: Coordinate,
        /// Amount credited.
        amount: i64,
    },
    /// The session entered a new phase.
    PhaseChanged {
        /// Phase that became active.
        phase: Phase,
    },
}

/// Reasons a player action is refused. Refusals never mutate state.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The ledger cannot cover the cost.
    #[error("Can't afford {what}.")]
    InsufficientFunds {
        /// Human readable name of what was attempted.
        what: &'static str,
    },
    /// The target cell already holds an object.
    #[error("That spot is already taken.")]
    Occupied,
    /// The pointer lies outside the playable area.
    #[error("Attempted to build outside of the playable area. Toggle grid mode for assistance.")]
    OutOfBounds,
    /// Another business sits in a neighbouring cell.
    #[error("Business too close to another. Must be at least 1 tile away in all directions.")]
    TooCloseToBusiness,
    /// The town rating is below the business requirement.
    #[error("Town rating of {required} needed to build this.")]
    RatingTooLow {
        /// Rating required by the business.
        required: i64,
    },
    /// The object is locked in place.
    #[error("That object can't be changed.")]
    Locked,
    /// The cell holds nothing the tool can remove.
    #[error("Nothing to remove there.")]
    NotErasable,
    /// The cell holds no decor to clean.
    #[error("Nothing to clean there.")]
    NothingToClean,
    /// The cell holds nothing that can rotate.
    #[error("That can't be rotated.")]
    NotRotatable,
    /// No business is selected in the catalog.
    #[error("Select a business first.")]
    NoBusinessSelected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_arithmetic_is_componentwise() {
        let a = Coordinate::new(3, -2);
        let b = Coordinate::new(-1, 5);
        assert_eq!(a + b, Coordinate::new(2, 3));
        assert_eq!(a - b, Coordinate::new(4, -7));
        assert_eq!(format!("{a}"), "[3,-2]");
    }

    #[test]
    fn grid_round_trip_stays_within_half_a_cell() {
        let grid = GridService::new(0.64);
        for step in 0..200 {
            let value = step as f32 * 0.173 - 17.0;
            let position = Vec2::new(value, -value * 0.71);
            let snapped = grid.position_of(grid.coordinate_of(position));
            assert!(
                (snapped.x - position.x).abs() <= grid.cell_size() * 0.5 + 1e-4,
                "x drifted more than half a cell for {position:?}"
            );
            assert!(
                (snapped.y - position.y).abs() <= grid.cell_size() * 0.5 + 1e-4,
                "y drifted more than half a cell for {position:?}"
            );
        }
    }

    #[test]
    fn quantize_collapses_float_jitter() {
        let a = QuantizedPosition::from_position(Vec2::new(1.2501, -0.3349));
        let b = QuantizedPosition::from_position(Vec2::new(1.2498, -0.3346));
        assert_eq!(a, b);
        assert_eq!(quantize(Vec2::new(0.123, 4.567)), Vec2::new(0.12, 4.57));
    }

    #[test]
    fn key_block_covers_both_sides_of_a_boundary() {
        let low = QuantizedPosition::from_position(Vec2::new(0.004, 0.004));
        let high = QuantizedPosition::from_position(Vec2::new(0.006, 0.006));
        assert_ne!(low, high, "the pair straddles a rounding boundary");

        let block: Vec<_> = low.block().collect();
        assert_eq!(block.len(), 9);
        assert!(block.contains(&high), "neighbouring key is searched");
        assert!(block.contains(&low));
    }

    #[test]
    fn mask_complement_and_containment() {
        let observed: DirectionMask = [Neighbor::East, Neighbor::West].into_iter().collect();
        assert!(observed.contains_all(DirectionMask::EAST | DirectionMask::WEST));
        assert!(!observed.contains_all(DirectionMask::NORTH));
        assert!((!observed).contains_all(DirectionMask::NORTH | DirectionMask::SOUTH));
        assert_eq!(
            observed.cardinals().collect::<Vec<_>>(),
            vec![Direction::East, Direction::West]
        );
    }

    #[test]
    fn direction_rotation_cycles_through_four_facings() {
        let mut facing = Direction::West;
        for _ in 0..Direction::COUNT {
            facing = facing.rotated_clockwise();
        }
        assert_eq!(facing, Direction::West);
        assert_eq!(Direction::North.opposite(), Direction::South);
    }

    #[test]
    fn bounds_enumerate_cells_with_centres_inside() {
        let grid = GridService::new(1.0);
        let bounds = WorldBounds::new(Vec2::new(-1.2, -0.4), Vec2::new(1.0, 0.6));
        let cells = bounds.cells(&grid);
        assert_eq!(
            cells,
            vec![
                Coordinate::new(-1, 0),
                Coordinate::new(0, 0),
                Coordinate::new(1, 0),
            ]
        );
    }

    #[test]
    fn action_errors_render_user_messages() {
        let error = ActionError::InsufficientFunds { what: "road" };
        assert_eq!(error.to_string(), "Can't afford road.");
    }
}
