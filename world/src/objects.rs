//! Placeable map objects, their templates and capability queries.

use std::collections::BTreeSet;

use gateway_town_core::{CarId, Coordinate, Direction, DirectionMask};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Cost of placing a single road tile.
pub const ROAD_BUILD_COST: i64 = 100;
/// Refund granted when a road tile is erased.
pub const ROAD_REFUND: i64 = 50;
/// Weekly upkeep charged for a freshly built road tile.
pub const ROAD_UPKEEP: i64 = 2;
/// Popularity granted by a piece of scenery.
pub const DECOR_POPULARITY: i64 = 2;
/// Cost of cleaning a piece of scenery off the map.
pub const CLEAN_COST: i64 = 500;

/// Cardinal sides a road tile joins, deciding its lanes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RoadVariant(DirectionMask);

impl RoadVariant {
    /// Tile with no connections.
    pub const ISOLATED: Self = Self(DirectionMask::NONE);

    /// Builds a variant joining the provided sides.
    pub fn from_sides(sides: impl IntoIterator<Item = Direction>) -> Self {
        Self(sides.into_iter().collect())
    }

    /// Parses a variant from side initials such as `"NS"` or `"NESW"`.
    ///
    /// An empty string or `"-"` yields [`RoadVariant::ISOLATED`].
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        let mut mask = DirectionMask::NONE;
        for symbol in label.trim().chars() {
            mask |= match symbol.to_ascii_uppercase() {
                'N' => DirectionMask::NORTH,
                'E' => DirectionMask::EAST,
                'S' => DirectionMask::SOUTH,
                'W' => DirectionMask::WEST,
                '-' => DirectionMask::NONE,
                _ => return None,
            };
        }
        Some(Self(mask))
    }

    /// Side initials in clockwise order starting at north.
    #[must_use]
    pub fn label(&self) -> String {
        let label: String = self
            .sides()
            .map(|side| match side {
                Direction::North => 'N',
                Direction::East => 'E',
                Direction::South => 'S',
                Direction::West => 'W',
            })
            .collect();
        if label.is_empty() {
            "-".to_owned()
        } else {
            label
        }
    }

    /// Joined sides in clockwise order starting at north.
    pub fn sides(&self) -> impl Iterator<Item = Direction> {
        self.0.cardinals()
    }

    /// Reports whether the tile joins the given side.
    #[must_use]
    pub fn joins(&self, side: Direction) -> bool {
        self.0.contains_all(side.mask())
    }
}

/// Road tile definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoadTile {
    variant: RoadVariant,
    starter: bool,
    upkeep: i64,
}

impl RoadTile {
    /// Creates an ordinary road tile of the provided variant.
    #[must_use]
    pub const fn new(variant: RoadVariant) -> Self {
        Self {
            variant,
            starter: false,
            upkeep: ROAD_UPKEEP,
        }
    }

    /// Creates a starter road authored at the edge of the world.
    #[must_use]
    pub const fn starter(variant: RoadVariant) -> Self {
        Self {
            variant,
            starter: true,
            upkeep: ROAD_UPKEEP,
        }
    }

    /// Sides joined by the tile.
    #[must_use]
    pub const fn variant(&self) -> RoadVariant {
        self.variant
    }

    /// Returns a copy of the tile with another variant, keeping flags and upkeep.
    #[must_use]
    pub const fn with_variant(mut self, variant: RoadVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Starter roads seed entrances and exits and are never autotiled.
    #[must_use]
    pub const fn is_starter(&self) -> bool {
        self.starter
    }

    /// Weekly upkeep.
    #[must_use]
    pub const fn upkeep(&self) -> i64 {
        self.upkeep
    }

    /// Overrides the weekly upkeep.
    pub fn set_upkeep(&mut self, upkeep: i64) {
        self.upkeep = upkeep;
    }
}

/// Shop-facing economics shared by every business.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessTerms {
    /// Display name, also used as the catalog key.
    pub title: String,
    /// Flavour text.
    #[serde(default)]
    pub description: String,
    /// Build cost.
    pub cost: i64,
    /// Money earned per customer served.
    pub revenue_per_customer: i64,
    /// Weekly upkeep.
    pub weekly_upkeep: i64,
    /// Town rating required before the business can be built.
    #[serde(default)]
    pub rating_requirement: i64,
    /// Contribution to the town rating.
    #[serde(default)]
    pub reputation_impact: i64,
}

/// One-tile business that cars drive into.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopLayout {
    /// Side the driveway opens onto.
    pub facing: Direction,
    /// Seconds customers stay before being released.
    pub dwell_seconds: f32,
    /// Marks casinos, which are exposed to jackpot events.
    #[serde(default)]
    pub casino: bool,
}

/// Roadside billboard earning from passing cars.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BillboardLayout {
    /// Size of the detection box in cells.
    pub box_cells: Vec2,
    /// Seconds before a previously counted car may pay again.
    pub cooldown_seconds: f32,
}

/// Behavioural flavour of a business.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusinessKind {
    /// Cars enter, dwell and pay.
    Stop(StopLayout),
    /// Popularity only.
    Scenery,
    /// Pays when cars pass within its box.
    Billboard(BillboardLayout),
}

/// Business definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusinessTemplate {
    /// Economics of the business.
    #[serde(flatten)]
    pub terms: BusinessTerms,
    /// Behaviour of the business.
    pub kind: BusinessKind,
}

impl BusinessTemplate {
    /// Money returned when the business is sold.
    #[must_use]
    pub fn refund(&self) -> i64 {
        self.terms.cost / 2
    }

    /// Layout when the business serves cars.
    #[must_use]
    pub fn stop(&self) -> Option<&StopLayout> {
        match &self.kind {
            BusinessKind::Stop(layout) => Some(layout),
            BusinessKind::Scenery | BusinessKind::Billboard(_) => None,
        }
    }

    /// Layout when the business is a billboard.
    #[must_use]
    pub fn billboard(&self) -> Option<&BillboardLayout> {
        match &self.kind {
            BusinessKind::Billboard(layout) => Some(layout),
            BusinessKind::Scenery | BusinessKind::Stop(_) => None,
        }
    }

    /// Returns a copy facing the provided side, when the business has a facing.
    #[must_use]
    pub fn facing(mut self, facing: Direction) -> Self {
        if let BusinessKind::Stop(layout) = &mut self.kind {
            layout.facing = facing;
        }
        self
    }
}

/// Scenery definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecorTemplate {
    name: String,
}

impl DecorTemplate {
    /// Creates scenery with the provided name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Crater left behind by a meteor strike.
    #[must_use]
    pub fn meteor_crater() -> Self {
        Self::new("meteor crater")
    }

    /// Name of the scenery.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Definition used to (re)create a map object.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectTemplate {
    /// A road tile.
    Road(RoadTile),
    /// A business.
    Business(BusinessTemplate),
    /// Scenery.
    Decor(DecorTemplate),
}

/// Mutable per-business simulation state. Never part of a template.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BusinessRuntime {
    occupants: Vec<CarId>,
    dwell_elapsed: f32,
    seen: BTreeSet<CarId>,
    cooldown_elapsed: f32,
}

impl BusinessRuntime {
    /// Cars currently inside the business.
    #[must_use]
    pub fn occupants(&self) -> &[CarId] {
        &self.occupants
    }

    /// Admits a car.
    pub fn admit(&mut self, car: CarId) {
        if !self.occupants.contains(&car) {
            self.occupants.push(car);
        }
    }

    /// Advances the dwell timer; returns every occupant once it expires.
    pub fn advance_dwell(&mut self, dt: f32, dwell_seconds: f32) -> Vec<CarId> {
        if self.occupants.is_empty() {
            return Vec::new();
        }
        self.dwell_elapsed += dt;
        if self.dwell_elapsed < dwell_seconds {
            return Vec::new();
        }
        self.dwell_elapsed = 0.0;
        std::mem::take(&mut self.occupants)
    }

    /// Records a car seen by a billboard; true when it was not seen recently.
    pub fn register_sighting(&mut self, car: CarId) -> bool {
        self.seen.insert(car)
    }

    /// Advances the sighting cooldown, forgetting every car once it expires.
    pub fn advance_cooldown(&mut self, dt: f32, cooldown_seconds: f32) {
        self.cooldown_elapsed += dt;
        if self.cooldown_elapsed >= cooldown_seconds {
            self.cooldown_elapsed -= cooldown_seconds;
            self.seen.clear();
        }
    }

    /// Drops every occupant and sighting.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Placed entity owned by the map.
#[derive(Clone, Debug, PartialEq)]
pub struct MapObject {
    coordinate: Coordinate,
    locked: bool,
    template: ObjectTemplate,
    runtime: BusinessRuntime,
}

impl MapObject {
    /// Instantiates an unlocked object from its template.
    #[must_use]
    pub fn new(template: ObjectTemplate) -> Self {
        Self {
            coordinate: Coordinate::default(),
            locked: false,
            template,
            runtime: BusinessRuntime::default(),
        }
    }

    /// Instantiates a locked object from its template.
    #[must_use]
    pub fn locked(template: ObjectTemplate) -> Self {
        Self {
            locked: true,
            ..Self::new(template)
        }
    }

    /// Convenience constructor for an ordinary road.
    #[must_use]
    pub fn road(variant: RoadVariant) -> Self {
        Self::new(ObjectTemplate::Road(RoadTile::new(variant)))
    }

    /// Cell assigned by the map.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub(crate) fn set_coordinate(&mut self, coordinate: Coordinate) {
        self.coordinate = coordinate;
    }

    /// Locked objects survive erasing and shuffling.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// Sets the lock flag.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Definition the object was created from, including later rotations.
    #[must_use]
    pub fn template(&self) -> &ObjectTemplate {
        &self.template
    }

    /// Mutable definition, used by town events that reprice objects.
    #[must_use]
    pub fn template_mut(&mut self) -> &mut ObjectTemplate {
        &mut self.template
    }

    /// Business simulation state.
    #[must_use]
    pub fn runtime(&self) -> &BusinessRuntime {
        &self.runtime
    }

    /// Mutable business simulation state.
    #[must_use]
    pub fn runtime_mut(&mut self) -> &mut BusinessRuntime {
        &mut self.runtime
    }

    /// Road tile definition, if the object is a road.
    #[must_use]
    pub fn as_road(&self) -> Option<&RoadTile> {
        match &self.template {
            ObjectTemplate::Road(road) => Some(road),
            ObjectTemplate::Business(_) | ObjectTemplate::Decor(_) => None,
        }
    }

    /// Business definition, if the object is a business.
    #[must_use]
    pub fn as_business(&self) -> Option<&BusinessTemplate> {
        match &self.template {
            ObjectTemplate::Business(business) => Some(business),
            ObjectTemplate::Road(_) | ObjectTemplate::Decor(_) => None,
        }
    }

    /// Reports whether the object is scenery.
    #[must_use]
    pub fn is_decor(&self) -> bool {
        matches!(self.template, ObjectTemplate::Decor(_))
    }

    /// Cost charged when the object is built by the player.
    #[must_use]
    pub fn build_cost(&self) -> Option<i64> {
        match &self.template {
            ObjectTemplate::Road(_) => Some(ROAD_BUILD_COST),
            ObjectTemplate::Business(business) => Some(business.terms.cost),
            ObjectTemplate::Decor(_) => None,
        }
    }

    /// Money returned when the object is erased.
    #[must_use]
    pub fn refund(&self) -> Option<i64> {
        match &self.template {
            ObjectTemplate::Road(_) => Some(ROAD_REFUND),
            ObjectTemplate::Business(business) => Some(business.refund()),
            ObjectTemplate::Decor(_) => None,
        }
    }

    /// Weekly upkeep charged at the end of a play phase.
    #[must_use]
    pub fn upkeep(&self) -> Option<i64> {
        match &self.template {
            ObjectTemplate::Road(road) => Some(road.upkeep()),
            ObjectTemplate::Business(business) => Some(business.terms.weekly_upkeep),
            ObjectTemplate::Decor(_) => None,
        }
    }

    /// Contribution to the town rating.
    #[must_use]
    pub fn popularity(&self) -> Option<i64> {
        match &self.template {
            ObjectTemplate::Road(_) => None,
            ObjectTemplate::Business(business) => Some(business.terms.reputation_impact),
            ObjectTemplate::Decor(_) => Some(DECOR_POPULARITY),
        }
    }

    /// Number of distinct facings, for objects that rotate.
    #[must_use]
    pub fn orientation_count(&self) -> Option<usize> {
        self.as_business()
            .and_then(BusinessTemplate::stop)
            .map(|_| Direction::COUNT)
    }

    /// Turns the object one step clockwise. Returns false when it cannot rotate.
    pub fn rotate(&mut self) -> bool {
        match &mut self.template {
            ObjectTemplate::Business(BusinessTemplate {
                kind: BusinessKind::Stop(layout),
                ..
            }) => {
                layout.facing = layout.facing.rotated_clockwise();
                true
            }
            ObjectTemplate::Business(_) | ObjectTemplate::Road(_) | ObjectTemplate::Decor(_) => {
                false
            }
        }
    }

    /// Reports whether the object contributes lanes to the road graph.
    #[must_use]
    pub fn is_road_connected(&self) -> bool {
        match &self.template {
            ObjectTemplate::Road(_) => true,
            ObjectTemplate::Business(business) => business.stop().is_some(),
            ObjectTemplate::Decor(_) => false,
        }
    }

    /// Reports whether a road may join this object on `side`.
    ///
    /// `None` stands for a corner contact with a diagonal neighbour.
    #[must_use]
    pub fn accepts_connection(&self, side: Option<Direction>) -> bool {
        match &self.template {
            ObjectTemplate::Road(_) => true,
            ObjectTemplate::Business(business) => match (business.stop(), side) {
                (Some(layout), Some(side)) => layout.facing == side,
                _ => false,
            },
            ObjectTemplate::Decor(_) => false,
        }
    }
}

/// Businesses offered in the build menu.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct BusinessCatalog {
    entries: Vec<BusinessTemplate>,
}

impl BusinessCatalog {
    /// Creates a catalog from explicit entries.
    #[must_use]
    pub fn new(entries: Vec<BusinessTemplate>) -> Self {
        Self { entries }
    }

    /// The stock line-up of roadside businesses.
    #[must_use]
    pub fn standard() -> Self {
        fn terms(
            title: &str,
            description: &str,
            [cost, revenue, upkeep, rating, reputation]: [i64; 5],
        ) -> BusinessTerms {
            BusinessTerms {
                title: title.to_owned(),
                description: description.to_owned(),
                cost,
                revenue_per_customer: revenue,
                weekly_upkeep: upkeep,
                rating_requirement: rating,
                reputation_impact: reputation,
            }
        }

        fn stop(dwell_seconds: f32, casino: bool) -> BusinessKind {
            BusinessKind::Stop(StopLayout {
                facing: Direction::South,
                dwell_seconds,
                casino,
            })
        }

        Self::new(vec![
            BusinessTemplate {
                terms: terms(
                    "Gas Station",
                    "Every traveler needs fuel eventually.",
                    [1_000, 30, 40, 0, 1],
                ),
                kind: stop(0.6, false),
            },
            BusinessTemplate {
                terms: terms(
                    "Diner",
                    "Burgers, pie and bottomless coffee.",
                    [2_500, 75, 90, 5, 3],
                ),
                kind: stop(1.0, false),
            },
            BusinessTemplate {
                terms: terms(
                    "Motel",
                    "A bed for the weary driver.",
                    [6_000, 180, 220, 15, 4],
                ),
                kind: stop(2.0, false),
            },
            BusinessTemplate {
                terms: terms(
                    "Casino",
                    "Fortunes made and lost by the highway.",
                    [20_000, 650, 900, 30, 10],
                ),
                kind: stop(2.5, true),
            },
            BusinessTemplate {
                terms: terms(
                    "Billboard",
                    "Drivers hate them, advertisers love them.",
                    [400, 4, 5, 0, -3],
                ),
                kind: BusinessKind::Billboard(BillboardLayout {
                    box_cells: Vec2::new(2.0, 2.0),
                    cooldown_seconds: 0.5,
                }),
            },
            BusinessTemplate {
                terms: terms("Park", "Somewhere to stretch your legs.", [800, 0, 15, 0, 5]),
                kind: BusinessKind::Scenery,
            },
        ])
    }

    /// Every entry in menu order.
    #[must_use]
    pub fn entries(&self) -> &[BusinessTemplate] {
        &self.entries
    }

    /// Entry with the provided title, compared case-insensitively.
    #[must_use]
    pub fn find(&self, title: &str) -> Option<&BusinessTemplate> {
        self.entries
            .iter()
            .find(|entry| entry.terms.title.eq_ignore_ascii_case(title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_labels_parse_back() {
        let tee = RoadVariant::parse("wse").expect("valid label");
        assert_eq!(tee.label(), "ESW");
        assert!(tee.joins(Direction::West));
        assert!(!tee.joins(Direction::North));
        assert_eq!(RoadVariant::parse("-"), Some(RoadVariant::ISOLATED));
        assert_eq!(RoadVariant::parse("NX"), None);
    }

    #[test]
    fn stop_accepts_roads_only_on_its_facing() {
        let catalog = BusinessCatalog::standard();
        let diner = catalog
            .find("diner")
            .cloned()
            .expect("standard catalog has a diner")
            .facing(Direction::East);
        let object = MapObject::new(ObjectTemplate::Business(diner));

        assert!(object.accepts_connection(Some(Direction::East)));
        assert!(!object.accepts_connection(Some(Direction::West)));
        assert!(!object.accepts_connection(None), "corners never connect");
        assert_eq!(object.orientation_count(), Some(4));
    }

    #[test]
    fn rotation_cycles_clockwise() {
        let gas = BusinessCatalog::standard()
            .find("Gas Station")
            .cloned()
            .expect("standard catalog has a gas station")
            .facing(Direction::North);
        let mut object = MapObject::new(ObjectTemplate::Business(gas));

        assert!(object.rotate());
        let facing = object
            .as_business()
            .and_then(BusinessTemplate::stop)
            .map(|layout| layout.facing);
        assert_eq!(facing, Some(Direction::East));
        assert!(!MapObject::road(RoadVariant::ISOLATED).rotate());
    }

    #[test]
    fn capabilities_follow_object_kind() {
        let road = MapObject::road(RoadVariant::ISOLATED);
        assert_eq!(road.build_cost(), Some(ROAD_BUILD_COST));
        assert_eq!(road.refund(), Some(ROAD_REFUND));
        assert_eq!(road.popularity(), None);

        let tree = MapObject::new(ObjectTemplate::Decor(DecorTemplate::new("tree")));
        assert_eq!(tree.popularity(), Some(DECOR_POPULARITY));
        assert_eq!(tree.refund(), None);
        assert!(!tree.is_road_connected());
    }

    #[test]
    fn dwell_releases_every_occupant_at_once() {
        let mut runtime = BusinessRuntime::default();
        runtime.admit(CarId::new(1));
        runtime.admit(CarId::new(2));
        assert!(runtime.advance_dwell(0.5, 1.0).is_empty());
        assert_eq!(
            runtime.advance_dwell(0.5, 1.0),
            vec![CarId::new(1), CarId::new(2)]
        );
        assert!(runtime.occupants().is_empty());
    }
}
