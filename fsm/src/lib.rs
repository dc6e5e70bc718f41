#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Builder-assembled finite-state machine shared by every phase of play.
//!
//! A machine is generic over its state label `S` and over the context `C`
//! its callbacks operate on. The machine never owns the context: owners keep
//! the machine and the context in separate fields and lend the context to
//! [`StateMachine::run`] every tick, which keeps callbacks free of aliasing.
//!
//! Each tick runs the on-run callbacks of the current state and then checks
//! the transitions of that state once, in declaration order. At most one
//! transition fires per tick.

use std::{collections::HashMap, fmt::Debug, hash::Hash, rc::Rc, time::Duration};

/// Callback invoked when a state is entered or exited.
pub type Action<C> = Box<dyn Fn(&mut C)>;

/// Callback invoked every tick while a state is active.
pub type RunAction<C> = Box<dyn Fn(&mut C, Duration)>;

/// Predicate guarding a transition.
pub type Guard<C> = Box<dyn Fn(&C) -> bool>;

/// Errors raised while assembling a machine.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FsmError {
    /// The builder did not declare any state.
    #[error("state machine declares no states")]
    NoStates,
    /// The same state was declared twice.
    #[error("state {state} declared more than once")]
    DuplicateState {
        /// Debug rendering of the duplicated state.
        state: String,
    },
    /// A transition targets a state that was never declared.
    #[error("transition from {from} targets undeclared state {to}")]
    UnknownTarget {
        /// State owning the transition.
        from: String,
        /// Undeclared target.
        to: String,
    },
    /// A callback or transition was attached before any state was declared.
    #[error("{what} registered before any state was declared")]
    AmbiguousAction {
        /// Kind of item that could not be attached.
        what: &'static str,
    },
}

struct StateEntry<S, C> {
    on_enter: Vec<Action<C>>,
    on_run: Vec<RunAction<C>>,
    on_exit: Vec<Action<C>>,
    transitions: Vec<(S, Guard<C>)>,
}

impl<S, C> Default for StateEntry<S, C> {
    fn default() -> Self {
        Self {
            on_enter: Vec::new(),
            on_run: Vec::new(),
            on_exit: Vec::new(),
            transitions: Vec::new(),
        }
    }
}

/// Fluent builder that assembles a [`StateMachine`].
///
/// Callbacks and transitions attach to the most recently declared state.
/// Misuse is recorded and reported by [`StateMachineBuilder::build`].
pub struct StateMachineBuilder<S, C> {
    order: Vec<S>,
    states: HashMap<S, StateEntry<S, C>>,
    cursor: Option<S>,
    error: Option<FsmError>,
}

impl<S, C> Default for StateMachineBuilder<S, C>
where
    S: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, C> StateMachineBuilder<S, C>
where
    S: Copy + Eq + Hash + Debug,
{
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            states: HashMap::new(),
            cursor: None,
            error: None,
        }
    }

    /// Declares a new state and makes it the target of subsequent calls.
    ///
    /// The first declared state is the initial state.
    #[must_use]
    pub fn with_state(mut self, state: S) -> Self {
        if self.states.contains_key(&state) {
            self.record(FsmError::DuplicateState {
                state: format!("{state:?}"),
            });
        } else {
            self.order.push(state);
            let _ = self.states.insert(state, StateEntry::default());
        }
        self.cursor = Some(state);
        self
    }

    /// Adds a callback run when the current state is entered.
    #[must_use]
    pub fn with_on_enter(mut self, action: impl Fn(&mut C) + 'static) -> Self {
        if let Some(entry) = self.cursor_entry("on-enter callback") {
            entry.on_enter.push(Box::new(action));
        }
        self
    }

    /// Adds a callback run every tick while the current state is active.
    #[must_use]
    pub fn with_on_run(mut self, action: impl Fn(&mut C, Duration) + 'static) -> Self {
        if let Some(entry) = self.cursor_entry("on-run callback") {
            entry.on_run.push(Box::new(action));
        }
        self
    }

    /// Adds a callback run when the current state is exited.
    #[must_use]
    pub fn with_on_exit(mut self, action: impl Fn(&mut C) + 'static) -> Self {
        if let Some(entry) = self.cursor_entry("on-exit callback") {
            entry.on_exit.push(Box::new(action));
        }
        self
    }

    /// Adds a guarded transition from the current state to `target`.
    #[must_use]
    pub fn with_transition(mut self, target: S, guard: impl Fn(&C) -> bool + 'static) -> Self {
        if let Some(entry) = self.cursor_entry("transition") {
            entry.transitions.push((target, Box::new(guard)));
        }
        self
    }

    /// Validates the declarations and produces the machine.
    pub fn build(self) -> Result<StateMachine<S, C>, FsmError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let Some(initial) = self.order.first().copied() else {
            return Err(FsmError::NoStates);
        };

        for state in &self.order {
            let Some(entry) = self.states.get(state) else {
                continue;
            };
            for (target, _) in &entry.transitions {
                if !self.states.contains_key(target) {
                    return Err(FsmError::UnknownTarget {
                        from: format!("{state:?}"),
                        to: format!("{target:?}"),
                    });
                }
            }
        }

        Ok(StateMachine {
            states: Rc::new(self.states),
            initial,
            current: None,
        })
    }

    fn cursor_entry(&mut self, what: &'static str) -> Option<&mut StateEntry<S, C>> {
        match self.cursor {
            Some(state) => self.states.get_mut(&state),
            None => {
                self.record(FsmError::AmbiguousAction { what });
                None
            }
        }
    }

    fn record(&mut self, error: FsmError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// Tick-driven finite-state machine over states `S` and context `C`.
///
/// Cloning is cheap: clones share the declarations and track their own
/// current state, so one built machine can drive many agents.
pub struct StateMachine<S, C> {
    states: Rc<HashMap<S, StateEntry<S, C>>>,
    initial: S,
    current: Option<S>,
}

impl<S: Copy, C> Clone for StateMachine<S, C> {
    fn clone(&self) -> Self {
        Self {
            states: Rc::clone(&self.states),
            initial: self.initial,
            current: self.current,
        }
    }
}

impl<S, C> StateMachine<S, C>
where
    S: Copy + Eq + Hash + Debug,
{
    /// Enters the initial state if the machine has not started yet.
    pub fn start(&mut self, context: &mut C) {
        if self.current.is_none() {
            self.enter(context, self.initial);
        }
    }

    /// Advances the machine by one tick.
    ///
    /// Starts the machine first when needed, runs the on-run callbacks of the
    /// current state and then fires the first transition whose guard passes.
    pub fn run(&mut self, context: &mut C, dt: Duration) {
        self.start(context);
        let Some(current) = self.current else {
            return;
        };
        let Some(entry) = self.states.get(&current) else {
            return;
        };

        for action in &entry.on_run {
            action(context, dt);
        }

        let target = entry
            .transitions
            .iter()
            .find(|(_, guard)| guard(context))
            .map(|(target, _)| *target);

        if let Some(target) = target {
            self.switch(context, target);
        }
    }

    /// Moves to `state` outside of guard evaluation.
    ///
    /// Without `force` the call is skipped when `state` is already active.
    /// With `force` the exit and enter callbacks always run.
    pub fn set_state(&mut self, context: &mut C, state: S, force: bool) {
        if !self.states.contains_key(&state) {
            return;
        }
        if !force && self.current == Some(state) {
            return;
        }
        self.switch(context, state);
    }

    /// Forgets the active state without running exit callbacks.
    ///
    /// The next [`StateMachine::run`] enters the initial state again.
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Reports whether `state` is the active state.
    #[must_use]
    pub fn is_in_state(&self, state: S) -> bool {
        self.current == Some(state)
    }

    /// Active state, if the machine has started.
    #[must_use]
    pub fn current(&self) -> Option<S> {
        self.current
    }

    fn switch(&mut self, context: &mut C, target: S) {
        tracing::debug!(from = ?self.current, to = ?target, "state switch");
        if let Some(entry) = self.current.and_then(|current| self.states.get(&current)) {
            for action in &entry.on_exit {
                action(context);
            }
        }
        self.enter(context, target);
    }

    fn enter(&mut self, context: &mut C, target: S) {
        self.current = Some(target);
        if let Some(entry) = self.states.get(&target) {
            for action in &entry.on_enter {
                action(context);
            }
        }
    }
}

impl<S: Debug, C> Debug for StateMachine<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("initial", &self.initial)
            .field("current", &self.current)
            .field("states", &self.states.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    enum Light {
        Red,
        Green,
        Amber,
    }

    #[derive(Default)]
    struct Log {
        entries: Vec<String>,
        elapsed: Duration,
        go: bool,
    }

    fn traffic_light() -> StateMachine<Light, Log> {
        StateMachineBuilder::new()
            .with_state(Light::Red)
            .with_on_enter(|log: &mut Log| log.entries.push("enter red".into()))
            .with_on_exit(|log: &mut Log| log.entries.push("exit red".into()))
            .with_transition(Light::Green, |log: &Log| log.go)
            .with_state(Light::Green)
            .with_on_enter(|log: &mut Log| log.entries.push("enter green".into()))
            .with_on_run(|log: &mut Log, dt| log.elapsed += dt)
            .with_transition(Light::Amber, |log: &Log| log.elapsed >= Duration::from_secs(2))
            .with_transition(Light::Red, |_: &Log| true)
            .with_state(Light::Amber)
            .with_transition(Light::Red, |_: &Log| true)
            .build()
            .expect("valid machine")
    }

    #[test]
    fn first_run_enters_initial_state() {
        let mut machine = traffic_light();
        let mut log = Log::default();
        assert_eq!(machine.current(), None);

        machine.run(&mut log, Duration::from_millis(16));

        assert!(machine.is_in_state(Light::Red), "machine should start red");
        assert_eq!(log.entries, vec!["enter red".to_string()]);
    }

    #[test]
    fn transitions_fire_once_per_tick_in_declaration_order() {
        let mut machine = traffic_light();
        let mut log = Log::default();
        log.go = true;

        machine.run(&mut log, Duration::from_secs(1));
        assert!(machine.is_in_state(Light::Green), "no cascade past green");

        machine.run(&mut log, Duration::from_secs(2));
        assert!(
            machine.is_in_state(Light::Amber),
            "first passing guard wins over later ones"
        );
        assert_eq!(log.elapsed, Duration::from_secs(2));
    }

    #[test]
    fn set_state_respects_force_flag() {
        let mut machine = traffic_light();
        let mut log = Log::default();
        machine.start(&mut log);

        machine.set_state(&mut log, Light::Red, false);
        assert_eq!(log.entries.len(), 1, "non-forced re-entry is skipped");

        machine.set_state(&mut log, Light::Red, true);
        assert_eq!(
            log.entries,
            vec![
                "enter red".to_string(),
                "exit red".to_string(),
                "enter red".to_string()
            ]
        );
    }

    #[test]
    fn clones_share_declarations_but_not_state() {
        let mut first = traffic_light();
        let mut log = Log::default();
        log.go = true;
        first.run(&mut log, Duration::ZERO);

        let mut second = first.clone();
        second.reset();
        second.start(&mut log);

        assert!(first.is_in_state(Light::Green));
        assert!(second.is_in_state(Light::Red), "reset clone restarts at the initial state");
    }

    #[test]
    fn build_rejects_misuse() {
        let empty = StateMachineBuilder::<Light, Log>::new().build();
        assert_eq!(empty.err(), Some(FsmError::NoStates));

        let duplicate = StateMachineBuilder::<Light, Log>::new()
            .with_state(Light::Red)
            .with_state(Light::Red)
            .build();
        assert!(matches!(duplicate, Err(FsmError::DuplicateState { .. })));

        let dangling = StateMachineBuilder::<Light, Log>::new()
            .with_state(Light::Red)
            .with_transition(Light::Green, |_| true)
            .build();
        assert!(matches!(dangling, Err(FsmError::UnknownTarget { .. })));

        let orphan = StateMachineBuilder::<Light, Log>::new()
            .with_on_enter(|_| {})
            .with_state(Light::Red)
            .build();
        assert!(matches!(orphan, Err(FsmError::AmbiguousAction { .. })));
    }
}
