#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure autotiling system that picks road variants from neighbour connectivity.

use gateway_town_core::{Coordinate, Direction, DirectionMask, Neighbor, TownEvent};
use gateway_town_world::{Map, MapObject, ObjectTemplate, RoadVariant};

/// Authored pairing of neighbourhood requirements with the variant to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoadRule {
    roads: DirectionMask,
    empty: DirectionMask,
    variant: RoadVariant,
}

impl RoadRule {
    /// Creates a rule requiring `roads` to be connected and `empty` to be clear.
    #[must_use]
    pub const fn new(roads: DirectionMask, empty: DirectionMask, variant: RoadVariant) -> Self {
        Self {
            roads,
            empty,
            variant,
        }
    }

    /// Creates a rule joining exactly `sides`, with every other cardinal clear.
    pub fn exact(sides: &[Direction]) -> Self {
        let roads: DirectionMask = sides.iter().copied().collect();
        let empty: DirectionMask = Direction::ALL
            .into_iter()
            .filter(|side| !sides.contains(side))
            .collect();
        Self::new(roads, empty, RoadVariant::from_sides(sides.iter().copied()))
    }

    /// Variant selected when the rule matches.
    #[must_use]
    pub const fn variant(&self) -> RoadVariant {
        self.variant
    }

    /// Reports whether the observed neighbourhood satisfies the rule.
    #[must_use]
    pub const fn matches(&self, observed: DirectionMask) -> bool {
        observed.contains_all(self.roads) && observed.complement().contains_all(self.empty)
    }
}

/// Ordered rule list with a fallback variant. The first matching rule wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoadRuleSet {
    rules: Vec<RoadRule>,
    fallback: RoadVariant,
}

impl Default for RoadRuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl RoadRuleSet {
    /// Creates a rule set from explicit rules.
    #[must_use]
    pub fn new(rules: Vec<RoadRule>, fallback: RoadVariant) -> Self {
        Self { rules, fallback }
    }

    /// Crossing, junctions, corners, straights and dead ends, in that order.
    #[must_use]
    pub fn standard() -> Self {
        use Direction::{East, North, South, West};

        let shapes: [&[Direction]; 15] = [
            &[North, East, South, West],
            &[North, East, South],
            &[East, South, West],
            &[South, West, North],
            &[West, North, East],
            &[North, East],
            &[East, South],
            &[South, West],
            &[West, North],
            &[North, South],
            &[East, West],
            &[North],
            &[East],
            &[South],
            &[West],
        ];
        let rules = shapes.into_iter().map(RoadRule::exact).collect();

        Self::new(rules, RoadVariant::ISOLATED)
    }

    /// Variant chosen for an observed neighbourhood.
    #[must_use]
    pub fn select(&self, observed: DirectionMask) -> RoadVariant {
        self.rules
            .iter()
            .find(|rule| rule.matches(observed))
            .map_or(self.fallback, RoadRule::variant)
    }

    /// Variant chosen for the cell given the current map contents.
    #[must_use]
    pub fn variant_for(&self, map: &Map, coordinate: Coordinate) -> RoadVariant {
        self.select(observe(map, coordinate))
    }
}

/// Builds the 8-neighbour mask of road-connected objects facing `coordinate`.
#[must_use]
pub fn observe(map: &Map, coordinate: Coordinate) -> DirectionMask {
    Neighbor::ALL
        .into_iter()
        .filter(|neighbor| {
            map.get_at(coordinate + neighbor.offset())
                .is_some_and(|object| connects_back(object, *neighbor))
        })
        .collect()
}

fn connects_back(object: &MapObject, neighbor: Neighbor) -> bool {
    object.is_road_connected() && object.accepts_connection(neighbor.facing_back())
}

/// Re-evaluates every non-starter road on the map.
///
/// Tiles are swapped with replace semantics so no placement side effects
/// fire. Lock flags and upkeep survive the swap. Returns the number of tiles
/// whose variant changed.
pub fn retile(map: &mut Map, rules: &RoadRuleSet) -> usize {
    let mut changed = 0;
    let mut scratch: Vec<TownEvent> = Vec::new();

    for coordinate in map.coordinates() {
        let Some(road) = map.get_at(coordinate).and_then(MapObject::as_road).copied() else {
            continue;
        };
        if road.is_starter() {
            continue;
        }
        let variant = rules.variant_for(map, coordinate);
        if variant == road.variant() {
            continue;
        }

        let Some(previous) = map.erase_at(coordinate, true, &mut scratch) else {
            continue;
        };
        let mut updated = MapObject::new(ObjectTemplate::Road(road.with_variant(variant)));
        updated.set_locked(previous.is_locked());
        map.put_at(updated, coordinate, true, &mut scratch);
        changed += 1;
    }

    if changed > 0 {
        tracing::debug!(changed, "roads retiled");
    }
    changed
}
