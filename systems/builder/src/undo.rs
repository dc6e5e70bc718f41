//! Reversible record of build actions.

use gateway_town_core::{Coordinate, Economy, TownEvent};
use gateway_town_world::{Map, MapObject};

/// Single reversible build action.
#[derive(Clone, Debug, PartialEq)]
pub enum UndoAction {
    /// An object was placed and `value` was charged for it.
    Place {
        /// Cell that received the object.
        coordinate: Coordinate,
        /// Amount refunded when the placement is undone.
        value: i64,
    },
    /// An object was removed and `value` was credited for it.
    ///
    /// Negative values describe removals that cost money.
    Delete {
        /// Cell the object was removed from.
        coordinate: Coordinate,
        /// Snapshot used to recreate the object.
        object: MapObject,
        /// Amount charged back when the removal is undone.
        value: i64,
    },
    /// An object turned one step clockwise.
    Rotate {
        /// Cell of the rotated object.
        coordinate: Coordinate,
    },
}

/// LIFO stack of build actions scoped to one build session.
#[derive(Clone, Debug, Default)]
pub struct UndoSystem {
    stack: Vec<UndoAction>,
}

impl UndoSystem {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an action.
    pub fn enqueue(&mut self, action: UndoAction) {
        self.stack.push(action);
    }

    /// Reverses the most recent action. Returns false when nothing was recorded.
    pub fn undo_one(
        &mut self,
        map: &mut Map,
        economy: &mut dyn Economy,
        out: &mut Vec<TownEvent>,
    ) -> bool {
        let Some(action) = self.stack.pop() else {
            return false;
        };
        tracing::debug!(?action, remaining = self.stack.len(), "undo");

        match action {
            UndoAction::Place { coordinate, value } => {
                let _ = map.erase_at(coordinate, false, out);
                economy.add_money(value);
            }
            UndoAction::Delete {
                coordinate,
                object,
                value,
            } => {
                map.put_at(object, coordinate, false, out);
                economy.spend_money(value);
            }
            UndoAction::Rotate { coordinate } => {
                if let Some(object) = map.get_at_mut(coordinate) {
                    let turns = object.orientation_count().unwrap_or(1).saturating_sub(1);
                    for _ in 0..turns {
                        let _ = object.rotate();
                    }
                }
            }
        }
        true
    }

    /// Forgets every recorded action.
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Number of recorded actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Reports whether nothing can be undone.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_town_core::{Direction, GridService, WorldBounds};
    use gateway_town_world::{BusinessCatalog, ObjectTemplate, RoadVariant, TownLedger};
    use glam::Vec2;

    fn map() -> Map {
        Map::new(
            GridService::new(1.0),
            WorldBounds::new(Vec2::splat(-4.0), Vec2::splat(4.0)),
        )
    }

    #[test]
    fn empty_stack_is_a_no_op() {
        let mut undo = UndoSystem::new();
        let mut map = map();
        let mut ledger = TownLedger::new(10, 0);
        let mut events = Vec::new();

        assert!(!undo.undo_one(&mut map, &mut ledger, &mut events));
        assert_eq!(ledger.money(), 10);
        assert!(events.is_empty());
    }

    #[test]
    fn rotate_reverses_a_single_step() {
        let mut undo = UndoSystem::new();
        let mut map = map();
        let mut ledger = TownLedger::new(0, 0);
        let mut events = Vec::new();
        let diner = BusinessCatalog::standard()
            .find("Diner")
            .cloned()
            .expect("diner")
            .facing(Direction::South);
        let cell = Coordinate::new(1, 1);
        map.put_at(
            MapObject::new(ObjectTemplate::Business(diner)),
            cell,
            true,
            &mut events,
        );

        let rotated = map.get_at_mut(cell).is_some_and(MapObject::rotate);
        assert!(rotated);
        undo.enqueue(UndoAction::Rotate { coordinate: cell });
        assert!(undo.undo_one(&mut map, &mut ledger, &mut events));

        let facing = map
            .get_at(cell)
            .and_then(MapObject::as_business)
            .and_then(|business| business.stop())
            .map(|layout| layout.facing);
        assert_eq!(facing, Some(Direction::South), "facing restored after undo");
    }

    #[test]
    fn actions_unwind_in_reverse_order() {
        let mut undo = UndoSystem::new();
        let mut map = map();
        let mut ledger = TownLedger::new(500, 0);
        let mut events = Vec::new();
        let cell = Coordinate::new(0, 0);
        let road = MapObject::road(RoadVariant::ISOLATED);

        map.put_at(road, cell, false, &mut events);
        ledger.spend_money(100);
        undo.enqueue(UndoAction::Place {
            coordinate: cell,
            value: 100,
        });
        let removed = map.erase_at(cell, false, &mut events).expect("road placed");
        ledger.add_money(50);
        undo.enqueue(UndoAction::Delete {
            coordinate: cell,
            object: removed,
            value: 50,
        });

        assert!(undo.undo_one(&mut map, &mut ledger, &mut events));
        assert!(map.has_at(cell), "delete undone first");
        assert_eq!(ledger.money(), 400);

        assert!(undo.undo_one(&mut map, &mut ledger, &mut events));
        assert!(!map.has_at(cell), "then the placement");
        assert_eq!(ledger.money(), 500);
        assert!(undo.is_empty());
    }
}
