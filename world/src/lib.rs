#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative town state for Gateway Town.
//!
//! The [`Map`] exclusively owns every placed [`MapObject`] and guarantees at
//! most one object per cell. The ledger types hold the money, rating and
//! message state that phases read and write through the collaborator traits
//! declared in the core crate.

mod ledger;
mod objects;

use std::collections::{HashMap, HashSet};

use gateway_town_core::{Coordinate, GridService, TownEvent, WorldBounds};
use glam::Vec2;
use rand::{seq::SliceRandom, Rng};

pub use ledger::{Message, MessageBoard, NotificationQueue, TownLedger};
pub use objects::{
    BillboardLayout, BusinessCatalog, BusinessKind, BusinessRuntime, BusinessTemplate,
    BusinessTerms, DecorTemplate, MapObject, ObjectTemplate, RoadTile, RoadVariant, StopLayout,
    CLEAN_COST, DECOR_POPULARITY, ROAD_BUILD_COST, ROAD_REFUND, ROAD_UPKEEP,
};

/// Cell-indexed store of placed objects.
#[derive(Clone, Debug)]
pub struct Map {
    grid: GridService,
    bounds: WorldBounds,
    objects: HashMap<Coordinate, MapObject>,
}

impl Map {
    /// Creates an empty map over the provided grid and playable bounds.
    #[must_use]
    pub fn new(grid: GridService, bounds: WorldBounds) -> Self {
        Self {
            grid,
            bounds,
            objects: HashMap::new(),
        }
    }

    /// Grid used to snap positions to cells.
    #[must_use]
    pub const fn grid(&self) -> &GridService {
        &self.grid
    }

    /// Playable area.
    #[must_use]
    pub const fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    /// Reports whether the position lies inside the playable area.
    #[must_use]
    pub fn is_valid_position(&self, position: Vec2) -> bool {
        self.bounds.contains(position)
    }

    /// Reports whether the cell centre lies inside the playable area.
    #[must_use]
    pub fn in_bounds(&self, coordinate: Coordinate) -> bool {
        self.is_valid_position(self.grid.position_of(coordinate))
    }

    /// Places `object` at `coordinate` when the cell is free.
    ///
    /// Occupied cells are left untouched. A placement event is emitted only
    /// when `replace` is false.
    pub fn put_at(
        &mut self,
        mut object: MapObject,
        coordinate: Coordinate,
        replace: bool,
        out: &mut Vec<TownEvent>,
    ) {
        if self.objects.contains_key(&coordinate) {
            tracing::debug!(%coordinate, "placement skipped, cell occupied");
            return;
        }
        object.set_coordinate(coordinate);
        let _ = self.objects.insert(coordinate, object);
        if !replace {
            out.push(TownEvent::ObjectPlaced { coordinate });
        }
    }

    /// Removes the object at `coordinate`, handing it back for disposal.
    ///
    /// An erase event is emitted only when `replace` is false.
    pub fn erase_at(
        &mut self,
        coordinate: Coordinate,
        replace: bool,
        out: &mut Vec<TownEvent>,
    ) -> Option<MapObject> {
        let removed = self.objects.remove(&coordinate)?;
        if !replace {
            out.push(TownEvent::ObjectErased { coordinate });
        }
        Some(removed)
    }

    /// Reports whether the cell is occupied.
    #[must_use]
    pub fn has_at(&self, coordinate: Coordinate) -> bool {
        self.objects.contains_key(&coordinate)
    }

    /// Object stored in the cell.
    #[must_use]
    pub fn get_at(&self, coordinate: Coordinate) -> Option<&MapObject> {
        self.objects.get(&coordinate)
    }

    /// Mutable object stored in the cell.
    #[must_use]
    pub fn get_at_mut(&mut self, coordinate: Coordinate) -> Option<&mut MapObject> {
        self.objects.get_mut(&coordinate)
    }

    /// Occupied cells in ascending order.
    #[must_use]
    pub fn coordinates(&self) -> Vec<Coordinate> {
        let mut coordinates: Vec<_> = self.objects.keys().copied().collect();
        coordinates.sort_unstable();
        coordinates
    }

    /// Copy of every object, ordered by cell, safe to hold while mutating the map.
    #[must_use]
    pub fn all_objects(&self) -> Vec<MapObject> {
        self.coordinates()
            .into_iter()
            .filter_map(|coordinate| self.objects.get(&coordinate).cloned())
            .collect()
    }

    /// Iterates over the objects in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &MapObject> {
        self.objects.values()
    }

    /// Iterates mutably over the objects in unspecified order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MapObject> {
        self.objects.values_mut()
    }

    /// Number of placed objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Reports whether nothing is placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Scatters every unlocked object over random free cells.
    ///
    /// Locked objects keep their cell. Unlocked objects land on distinct cells
    /// inside the bounds that no locked object holds. When the bounds run out
    /// of room the cells vacated by unlocked objects are used as well.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut locked = HashMap::new();
        let mut unlocked = Vec::new();
        for coordinate in self.coordinates() {
            let Some(object) = self.objects.remove(&coordinate) else {
                continue;
            };
            if object.is_locked() {
                let _ = locked.insert(coordinate, object);
            } else {
                unlocked.push(object);
            }
        }

        let mut free: Vec<Coordinate> = self
            .bounds
            .cells(&self.grid)
            .into_iter()
            .filter(|cell| !locked.contains_key(cell))
            .collect();
        if free.len() < unlocked.len() {
            let known: HashSet<Coordinate> = free.iter().copied().collect();
            free.extend(
                unlocked
                    .iter()
                    .map(MapObject::coordinate)
                    .filter(|cell| !known.contains(cell)),
            );
        }
        free.shuffle(rng);

        for (cell, object) in locked {
            let _ = self.objects.insert(cell, object);
        }
        for (mut object, cell) in unlocked.into_iter().zip(free) {
            object.set_coordinate(cell);
            let _ = self.objects.insert(cell, object);
        }
        tracing::debug!(objects = self.objects.len(), "map shuffled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> Map {
        Map::new(
            GridService::new(1.0),
            WorldBounds::new(Vec2::new(-2.0, -2.0), Vec2::new(2.0, 2.0)),
        )
    }

    #[test]
    fn put_at_ignores_occupied_cells() {
        let mut map = map();
        let mut events = Vec::new();
        let cell = Coordinate::new(1, 1);
        map.put_at(MapObject::road(RoadVariant::ISOLATED), cell, false, &mut events);
        map.put_at(
            MapObject::new(ObjectTemplate::Decor(DecorTemplate::new("tree"))),
            cell,
            false,
            &mut events,
        );

        assert_eq!(map.len(), 1);
        assert!(map.get_at(cell).and_then(MapObject::as_road).is_some());
        assert_eq!(events, vec![TownEvent::ObjectPlaced { coordinate: cell }]);
    }

    #[test]
    fn replace_suppresses_side_effects() {
        let mut map = map();
        let mut events = Vec::new();
        let cell = Coordinate::new(0, 0);
        map.put_at(MapObject::road(RoadVariant::ISOLATED), cell, true, &mut events);
        let removed = map.erase_at(cell, true, &mut events);

        assert!(removed.is_some());
        assert!(events.is_empty(), "replace never emits events");
        assert!(map.erase_at(cell, false, &mut events).is_none());
        assert!(events.is_empty(), "erasing an empty cell is a no-op");
    }

    #[test]
    fn snapshot_is_sorted_by_cell() {
        let mut map = map();
        let mut events = Vec::new();
        for cell in [
            Coordinate::new(1, 0),
            Coordinate::new(-1, 2),
            Coordinate::new(0, -1),
        ] {
            map.put_at(MapObject::road(RoadVariant::ISOLATED), cell, true, &mut events);
        }
        let cells: Vec<_> = map.all_objects().iter().map(MapObject::coordinate).collect();
        assert_eq!(
            cells,
            vec![
                Coordinate::new(-1, 2),
                Coordinate::new(0, -1),
                Coordinate::new(1, 0)
            ]
        );
    }
}
