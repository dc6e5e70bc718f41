//! Cell-local lane layouts for road tiles and drive-in businesses.
//!
//! Coordinates are expressed in cell units relative to the cell centre, so a
//! side midpoint sits at distance `0.5`. Traffic keeps to the right, which
//! places the inbound and outbound lanes of a side a quarter cell apart.

use gateway_town_core::Direction;
use gateway_town_world::RoadVariant;
use glam::Vec2;

/// Number of segments used to approximate a turning lane.
pub const TURN_DEGREE: u32 = 4;

/// Distance a driveway reaches into a business cell.
pub const DRIVEWAY_DEPTH: f32 = 0.3;

/// Directed connection between two cell-local points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lane {
    /// Cell-local start point.
    pub start: Vec2,
    /// Cell-local end point.
    pub end: Vec2,
    /// Two or fewer means a straight edge; more means a sampled curve.
    pub degree: u32,
    /// Travel direction when the lane is entered.
    pub receiving: Direction,
}

impl Lane {
    /// Reports whether the lane is a single straight edge.
    #[must_use]
    pub const fn is_straight(&self) -> bool {
        self.degree <= 2
    }
}

/// Point where traffic entering through `side` crosses the cell edge.
#[must_use]
pub fn inbound_point(side: Direction) -> Vec2 {
    match side {
        Direction::North => Vec2::new(-0.25, 0.5),
        Direction::East => Vec2::new(0.5, 0.25),
        Direction::South => Vec2::new(0.25, -0.5),
        Direction::West => Vec2::new(-0.5, -0.25),
    }
}

/// Point where traffic leaving through `side` crosses the cell edge.
#[must_use]
pub fn outbound_point(side: Direction) -> Vec2 {
    match side {
        Direction::North => Vec2::new(0.25, 0.5),
        Direction::East => Vec2::new(0.5, -0.25),
        Direction::South => Vec2::new(-0.25, -0.5),
        Direction::West => Vec2::new(-0.5, 0.25),
    }
}

/// Lanes of a road tile joining the sides of `variant`.
///
/// Every joined side feeds every other joined side. A dead end turns traffic
/// around on the spot and an isolated tile has no lanes at all.
#[must_use]
pub fn road_lanes(variant: RoadVariant) -> Vec<Lane> {
    let sides: Vec<Direction> = variant.sides().collect();
    if let [only] = sides.as_slice() {
        return vec![Lane {
            start: inbound_point(*only),
            end: outbound_point(*only),
            degree: 1,
            receiving: only.opposite(),
        }];
    }

    let mut lanes = Vec::new();
    for &from in &sides {
        for &to in &sides {
            if from == to {
                continue;
            }
            let degree = if to == from.opposite() { 1 } else { TURN_DEGREE };
            lanes.push(Lane {
                start: inbound_point(from),
                end: outbound_point(to),
                degree,
                receiving: from.opposite(),
            });
        }
    }
    lanes
}

/// Driveway lanes of a business opening onto `facing`: entry then exit.
///
/// The entry lane ends at the customer destination and the exit lane ends on
/// the cell edge where the neighbouring road picks traffic up again.
#[must_use]
pub fn driveway_lanes(facing: Direction) -> (Lane, Lane) {
    let inward = -facing.unit() * DRIVEWAY_DEPTH;
    let entry = Lane {
        start: inbound_point(facing),
        end: inbound_point(facing) + inward,
        degree: 1,
        receiving: facing.opposite(),
    };
    let exit = Lane {
        start: outbound_point(facing) + inward,
        end: outbound_point(facing),
        degree: 1,
        receiving: facing,
    };
    (entry, exit)
}

/// Evaluates a quadratic Bézier curve at `t`.
#[must_use]
pub fn quadratic_bezier(p0: Vec2, p1: Vec2, p2: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    u * u * p0 + 2.0 * u * t * p1 + t * t * p2
}

/// Intermediate points of a turning lane between world points `p0` and `p4`.
///
/// The corner control point continues the receiving direction until it lines
/// up with the end point. Returns `degree - 1` samples.
#[must_use]
pub fn turn_samples(p0: Vec2, p4: Vec2, receiving: Direction, degree: u32) -> Vec<Vec2> {
    let d0 = receiving.unit();
    let corner = if d0.x.abs() > 0.5 {
        Vec2::new(p4.x, p0.y)
    } else {
        Vec2::new(p0.x, p4.y)
    };
    let near = p0 + (corner - p0) * 0.3;
    let far = p4 + (corner - p4) * 0.3;

    (1..degree)
        .map(|step| quadratic_bezier(near, corner, far, step as f32 / degree as f32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbouring_cells_share_edge_points() {
        for side in Direction::ALL {
            let offset = side.unit();
            let here_out = outbound_point(side);
            let there_in = offset + inbound_point(side.opposite());
            assert!(
                here_out.abs_diff_eq(there_in, 1e-6),
                "outbound {side:?} must meet the neighbour's inbound point"
            );
        }
    }

    #[test]
    fn straight_tile_has_two_opposing_lanes() {
        let lanes = road_lanes(RoadVariant::parse("EW").expect("label"));
        assert_eq!(lanes.len(), 2);
        assert!(lanes.iter().all(Lane::is_straight));
    }

    #[test]
    fn crossing_has_twelve_lanes_with_eight_turns() {
        let lanes = road_lanes(RoadVariant::parse("NESW").expect("label"));
        assert_eq!(lanes.len(), 12);
        assert_eq!(lanes.iter().filter(|lane| !lane.is_straight()).count(), 8);
    }

    #[test]
    fn turn_samples_stay_inside_the_corner_box() {
        let p0 = Vec2::new(-0.5, -0.25);
        let p4 = Vec2::new(0.25, 0.5);
        let samples = turn_samples(p0, p4, Direction::East, TURN_DEGREE);
        assert_eq!(samples.len(), TURN_DEGREE as usize - 1);
        for sample in samples {
            assert!(sample.x >= p0.x && sample.x <= p4.x);
            assert!(sample.y >= p0.y && sample.y <= p4.y);
        }
    }
}
