#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Build-phase tools: road drawing, business placement, erasing, cleaning and
//! rotating, backed by a single-session undo history.
//!
//! The active tool is a state machine that turns polled input into tool
//! requests. Requests are applied against the borrowed town state; refused
//! requests leave the town untouched and surface their message through the
//! injected [`Notifier`].

mod undo;

use std::time::Duration;

use gateway_town_core::{
    ActionError, Coordinate, Economy, InputSnapshot, Neighbor, Notifier, TownEvent,
};
use gateway_town_fsm::{FsmError, StateMachine, StateMachineBuilder};
use gateway_town_system_autotile::{retile, RoadRuleSet};
use gateway_town_world::{
    BusinessCatalog, BusinessTemplate, Map, MapObject, ObjectTemplate, RoadVariant, CLEAN_COST,
    ROAD_BUILD_COST,
};
use glam::Vec2;

pub use undo::{UndoAction, UndoSystem};

/// Build tool currently held by the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tool {
    /// No tool; clicks do nothing.
    None,
    /// Paints roads while the pointer is held.
    DrawRoads,
    /// Places the selected business on click.
    PlaceBusiness,
    /// Removes scenery for a fee while the pointer is held.
    Clean,
    /// Removes player-built objects for a refund while the pointer is held.
    Erase,
    /// Turns a business one step clockwise on click.
    Rotate,
}

/// Town state a build action operates on.
pub struct BuildScope<'a> {
    /// Map receiving the mutations.
    pub map: &'a mut Map,
    /// Ledger charged and credited by the tools.
    pub economy: &'a mut dyn Economy,
    /// Sink for refusal messages.
    pub notifier: &'a mut dyn Notifier,
    /// Presentation side effects.
    pub events: &'a mut Vec<TownEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ToolRequest {
    DrawRoad(Vec2),
    PlaceBusiness(Vec2),
    Clean(Vec2),
    Erase(Vec2),
    Rotate(Vec2),
}

#[derive(Debug, Default)]
struct ToolFrame {
    input: InputSnapshot,
    requests: Vec<ToolRequest>,
}

impl ToolFrame {
    fn request_while_held(&mut self, make: fn(Vec2) -> ToolRequest) {
        if self.input.primary_held {
            if let Some(pointer) = self.input.pointer {
                self.requests.push(make(pointer));
            }
        }
    }

    fn request_on_click(&mut self, make: fn(Vec2) -> ToolRequest) {
        if self.input.primary_pressed {
            if let Some(pointer) = self.input.pointer {
                self.requests.push(make(pointer));
            }
        }
    }
}

fn cancelled(frame: &ToolFrame) -> bool {
    frame.input.secondary_pressed
}

fn tool_machine() -> Result<StateMachine<Tool, ToolFrame>, FsmError> {
    StateMachineBuilder::<Tool, ToolFrame>::new()
        .with_state(Tool::None)
        .with_state(Tool::DrawRoads)
        .with_on_run(|frame, _| frame.request_while_held(ToolRequest::DrawRoad))
        .with_transition(Tool::None, cancelled)
        .with_state(Tool::PlaceBusiness)
        .with_on_run(|frame, _| frame.request_on_click(ToolRequest::PlaceBusiness))
        .with_transition(Tool::None, cancelled)
        .with_state(Tool::Clean)
        .with_on_run(|frame, _| frame.request_while_held(ToolRequest::Clean))
        .with_transition(Tool::None, cancelled)
        .with_state(Tool::Erase)
        .with_on_run(|frame, _| frame.request_while_held(ToolRequest::Erase))
        .with_transition(Tool::None, cancelled)
        .with_state(Tool::Rotate)
        .with_on_run(|frame, _| frame.request_on_click(ToolRequest::Rotate))
        .with_transition(Tool::None, cancelled)
        .build()
}

enum Response {
    Silent,
    Notify,
    NotifyAndCancel,
}

fn response(request: ToolRequest, error: &ActionError) -> Response {
    match (request, error) {
        (_, ActionError::Occupied)
        | (_, ActionError::Locked)
        | (_, ActionError::NotErasable)
        | (_, ActionError::NothingToClean)
        | (_, ActionError::NotRotatable)
        | (ToolRequest::Clean(_), ActionError::OutOfBounds) => Response::Silent,
        (ToolRequest::PlaceBusiness(_), _) | (ToolRequest::Clean(_), _) => {
            Response::NotifyAndCancel
        }
        (ToolRequest::DrawRoad(_), ActionError::InsufficientFunds { .. }) => Response::Notify,
        (ToolRequest::DrawRoad(_), _) | (ToolRequest::Erase(_), _) | (ToolRequest::Rotate(_), _) => {
            Response::Silent
        }
    }
}

/// Build-phase controller owning the tool machine and undo history.
#[derive(Debug)]
pub struct BuildMode {
    tools: StateMachine<Tool, ToolFrame>,
    frame: ToolFrame,
    undo: UndoSystem,
    rules: RoadRuleSet,
    catalog: BusinessCatalog,
    selected: Option<usize>,
    grid_visible: bool,
}

impl BuildMode {
    /// Creates the controller with no tool selected.
    pub fn new(catalog: BusinessCatalog, rules: RoadRuleSet) -> Result<Self, FsmError> {
        let mut frame = ToolFrame::default();
        let mut tools = tool_machine()?;
        tools.start(&mut frame);
        Ok(Self {
            tools,
            frame,
            undo: UndoSystem::new(),
            rules,
            catalog,
            selected: None,
            grid_visible: false,
        })
    }

    /// Tool currently held.
    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tools.current().unwrap_or(Tool::None)
    }

    /// Picks up `tool`, or puts it down when it is already held.
    pub fn toggle_tool(&mut self, tool: Tool) {
        let next = if self.tool() == tool { Tool::None } else { tool };
        self.tools.set_state(&mut self.frame, next, true);
    }

    /// Selects a catalog business by title and picks up the placement tool.
    ///
    /// Returns false when the catalog has no such entry.
    pub fn select_business(&mut self, title: &str) -> bool {
        let Some(index) = self
            .catalog
            .entries()
            .iter()
            .position(|entry| entry.terms.title.eq_ignore_ascii_case(title))
        else {
            return false;
        };
        self.selected = Some(index);
        self.tools
            .set_state(&mut self.frame, Tool::PlaceBusiness, true);
        true
    }

    /// Business that the placement tool would build.
    #[must_use]
    pub fn selected_business(&self) -> Option<&BusinessTemplate> {
        self.selected
            .and_then(|index| self.catalog.entries().get(index))
    }

    /// Puts every tool down and forgets the selected business.
    pub fn clear_mode(&mut self) {
        self.selected = None;
        self.tools.set_state(&mut self.frame, Tool::None, false);
    }

    /// Flips the grid overlay flag.
    pub fn toggle_grid(&mut self) {
        self.grid_visible = !self.grid_visible;
    }

    /// Reports whether the grid overlay is on.
    #[must_use]
    pub const fn grid_visible(&self) -> bool {
        self.grid_visible
    }

    /// Catalog offered by the placement tool.
    #[must_use]
    pub fn catalog(&self) -> &BusinessCatalog {
        &self.catalog
    }

    /// Undo history of the current build session.
    #[must_use]
    pub fn history(&self) -> &UndoSystem {
        &self.undo
    }

    /// Processes one tick of input.
    pub fn update(&mut self, input: &InputSnapshot, dt: Duration, scope: &mut BuildScope<'_>) {
        self.frame.input = *input;
        self.frame.requests.clear();

        if input.escape_pressed {
            self.clear_mode();
        }
        if input.undo_pressed {
            let _ = self.undo_one(scope);
        }

        self.tools.run(&mut self.frame, dt);

        let requests = std::mem::take(&mut self.frame.requests);
        let mut changed = false;
        for request in requests {
            match self.apply(request, scope) {
                Ok(()) => changed = true,
                Err(error) => self.refuse(request, &error, scope.notifier),
            }
        }
        if changed {
            self.retile(scope.map);
        }
    }

    /// Reverses the most recent build action and retiles.
    pub fn undo_one(&mut self, scope: &mut BuildScope<'_>) -> bool {
        let undone = self
            .undo
            .undo_one(scope.map, scope.economy, scope.events);
        if undone {
            self.retile(scope.map);
        }
        undone
    }

    /// Re-evaluates every non-starter road tile.
    pub fn retile(&self, map: &mut Map) {
        let _ = retile(map, &self.rules);
    }

    /// Ends the build session: history and grid overlay are dropped.
    pub fn cleanup(&mut self) {
        self.undo.clear();
        self.grid_visible = false;
        self.clear_mode();
    }

    /// Paints a road at `position`.
    pub fn draw_road(&mut self, position: Vec2, scope: &mut BuildScope<'_>) -> Result<(), ActionError> {
        let coordinate = Self::free_cell(position, scope.map)?;
        if !scope.economy.has_enough_money(ROAD_BUILD_COST) {
            return Err(ActionError::InsufficientFunds { what: "road" });
        }

        scope.economy.spend_money(ROAD_BUILD_COST);
        self.undo.enqueue(UndoAction::Place {
            coordinate,
            value: ROAD_BUILD_COST,
        });
        scope.map.put_at(
            MapObject::road(RoadVariant::ISOLATED),
            coordinate,
            false,
            scope.events,
        );
        Ok(())
    }

    /// Builds the selected business at `position`.
    pub fn place_business(
        &mut self,
        position: Vec2,
        scope: &mut BuildScope<'_>,
    ) -> Result<(), ActionError> {
        let template = self
            .selected_business()
            .cloned()
            .ok_or(ActionError::NoBusinessSelected)?;
        let coordinate = Self::free_cell(position, scope.map)?;

        let crowded = Neighbor::ALL.iter().any(|neighbor| {
            scope
                .map
                .get_at(coordinate + neighbor.offset())
                .is_some_and(|object| object.as_business().is_some())
        });
        if crowded {
            return Err(ActionError::TooCloseToBusiness);
        }

        let terms = &template.terms;
        if scope.economy.town_rating() < terms.rating_requirement {
            return Err(ActionError::RatingTooLow {
                required: terms.rating_requirement,
            });
        }
        if !scope.economy.has_enough_money(terms.cost) {
            return Err(ActionError::InsufficientFunds { what: "business" });
        }

        let cost = terms.cost;
        scope.economy.spend_money(cost);
        self.undo.enqueue(UndoAction::Place {
            coordinate,
            value: cost,
        });
        scope.map.put_at(
            MapObject::new(ObjectTemplate::Business(template)),
            coordinate,
            false,
            scope.events,
        );
        Ok(())
    }

    /// Removes a player-built object at `position` for its refund.
    pub fn erase(&mut self, position: Vec2, scope: &mut BuildScope<'_>) -> Result<(), ActionError> {
        let coordinate = Self::occupied_cell(position, scope.map)?;
        let Some(object) = scope.map.get_at(coordinate) else {
            return Err(ActionError::NotErasable);
        };
        if object.is_decor() {
            return Err(ActionError::NotErasable);
        }
        if object.is_locked() {
            return Err(ActionError::Locked);
        }
        let Some(refund) = object.refund() else {
            return Err(ActionError::NotErasable);
        };
        let snapshot = object.clone();

        scope.economy.add_money(refund);
        self.undo.enqueue(UndoAction::Delete {
            coordinate,
            object: snapshot,
            value: refund,
        });
        let _ = scope.map.erase_at(coordinate, false, scope.events);
        Ok(())
    }

    /// Removes scenery at `position` for a fee.
    pub fn clean(&mut self, position: Vec2, scope: &mut BuildScope<'_>) -> Result<(), ActionError> {
        let coordinate = Self::occupied_cell(position, scope.map)?;
        let Some(object) = scope.map.get_at(coordinate).filter(|object| object.is_decor()) else {
            return Err(ActionError::NothingToClean);
        };
        if object.is_locked() {
            return Err(ActionError::Locked);
        }
        if !scope.economy.has_enough_money(CLEAN_COST) {
            return Err(ActionError::InsufficientFunds { what: "to remove" });
        }
        let snapshot = object.clone();

        scope.economy.spend_money(CLEAN_COST);
        self.undo.enqueue(UndoAction::Delete {
            coordinate,
            object: snapshot,
            value: -CLEAN_COST,
        });
        let _ = scope.map.erase_at(coordinate, false, scope.events);
        Ok(())
    }

    /// Turns the business at `position` one step clockwise.
    pub fn rotate(&mut self, position: Vec2, scope: &mut BuildScope<'_>) -> Result<(), ActionError> {
        let coordinate = Self::occupied_cell(position, scope.map)?;
        let Some(object) = scope.map.get_at_mut(coordinate) else {
            return Err(ActionError::NotRotatable);
        };
        if object.is_locked() {
            return Err(ActionError::Locked);
        }
        if !object.rotate() {
            return Err(ActionError::NotRotatable);
        }
        self.undo.enqueue(UndoAction::Rotate { coordinate });
        Ok(())
    }

    fn apply(&mut self, request: ToolRequest, scope: &mut BuildScope<'_>) -> Result<(), ActionError> {
        match request {
            ToolRequest::DrawRoad(position) => self.draw_road(position, scope),
            ToolRequest::PlaceBusiness(position) => self.place_business(position, scope),
            ToolRequest::Clean(position) => self.clean(position, scope),
            ToolRequest::Erase(position) => self.erase(position, scope),
            ToolRequest::Rotate(position) => self.rotate(position, scope),
        }
    }

    fn refuse(&mut self, request: ToolRequest, error: &ActionError, notifier: &mut dyn Notifier) {
        tracing::debug!(?request, %error, "build action refused");
        match response(request, error) {
            Response::Silent => {}
            Response::Notify => notifier.enqueue(&error.to_string()),
            Response::NotifyAndCancel => {
                notifier.enqueue(&error.to_string());
                self.tools.set_state(&mut self.frame, Tool::None, false);
            }
        }
    }

    fn playable_cell(position: Vec2, map: &Map) -> Result<Coordinate, ActionError> {
        let coordinate = map.grid().coordinate_of(position);
        if !map.is_valid_position(position) || !map.in_bounds(coordinate) {
            return Err(ActionError::OutOfBounds);
        }
        Ok(coordinate)
    }

    fn free_cell(position: Vec2, map: &Map) -> Result<Coordinate, ActionError> {
        let coordinate = Self::playable_cell(position, map)?;
        if map.has_at(coordinate) {
            return Err(ActionError::Occupied);
        }
        Ok(coordinate)
    }

    fn occupied_cell(position: Vec2, map: &Map) -> Result<Coordinate, ActionError> {
        let coordinate = Self::playable_cell(position, map)?;
        if !map.has_at(coordinate) {
            return Err(ActionError::NotErasable);
        }
        Ok(coordinate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_responses_follow_the_tool() {
        let broke = ActionError::InsufficientFunds { what: "road" };
        assert!(matches!(
            response(ToolRequest::DrawRoad(Vec2::ZERO), &broke),
            Response::Notify
        ));
        assert!(matches!(
            response(ToolRequest::PlaceBusiness(Vec2::ZERO), &ActionError::TooCloseToBusiness),
            Response::NotifyAndCancel
        ));
        assert!(matches!(
            response(ToolRequest::PlaceBusiness(Vec2::ZERO), &ActionError::Occupied),
            Response::Silent
        ));
        assert!(matches!(
            response(ToolRequest::Erase(Vec2::ZERO), &ActionError::OutOfBounds),
            Response::Silent
        ));
    }

    #[test]
    fn tool_machine_cancels_on_secondary_click() {
        let mut frame = ToolFrame::default();
        let mut tools = tool_machine().expect("valid machine");
        tools.start(&mut frame);
        tools.set_state(&mut frame, Tool::DrawRoads, true);

        frame.input = InputSnapshot {
            secondary_pressed: true,
            ..InputSnapshot::default()
        };
        tools.run(&mut frame, Duration::ZERO);

        assert!(tools.is_in_state(Tool::None));
        assert!(frame.requests.is_empty());
    }
}
