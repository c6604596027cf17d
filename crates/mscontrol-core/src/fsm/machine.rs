use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use super::{State, Transition};

/// A transition was requested that is not in the legal set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition<S> {
    pub from: S,
    pub to: S,
}

impl<S: fmt::Display> fmt::Display for IllegalTransition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal transition from {} to {}", self.from, self.to)
    }
}

impl<S: fmt::Debug + fmt::Display> std::error::Error for IllegalTransition<S> {}

/// Finite state machine with a fixed transition set.
///
/// `S` identifies states, `C` is the owner's context handed to entry actions
/// and `E` is the event that triggered a transition.
pub struct FiniteStateMachine<S, C, E> {
    current: S,
    states: HashMap<S, State<S, C, E>>,
    transitions: HashSet<Transition<S>>,
}

impl<S, C, E> FiniteStateMachine<S, C, E>
where
    S: Copy + Eq + Hash + fmt::Debug,
{
    /// Build a machine positioned at `initial`.
    ///
    /// The initial state's entry action is not executed. The transition set is
    /// frozen here and cannot be changed afterwards.
    pub fn new(
        initial: S,
        states: impl IntoIterator<Item = State<S, C, E>>,
        transitions: impl IntoIterator<Item = Transition<S>>,
    ) -> Self {
        let states = states
            .into_iter()
            .map(|state| (*state.id(), state))
            .collect();
        Self {
            current: initial,
            states,
            transitions: transitions.into_iter().collect(),
        }
    }

    /// Current state
    pub fn state(&self) -> S {
        self.current
    }

    pub fn is(&self, state: S) -> bool {
        self.current == state
    }

    /// Whether `(current, target)` is a legal transition
    pub fn can_transition(&self, target: S) -> bool {
        self.transitions
            .contains(&Transition::new(self.current, target))
    }

    /// Move to `target`, then run the target's entry action with `event`.
    ///
    /// Rejected transitions leave the machine untouched and run nothing.
    pub async fn transition(
        &mut self,
        ctx: &mut C,
        event: &E,
        target: S,
    ) -> Result<(), IllegalTransition<S>> {
        if !self.can_transition(target) {
            return Err(IllegalTransition {
                from: self.current,
                to: target,
            });
        }

        tracing::trace!("FSM transition {:?} -> {:?}", self.current, target);
        self.current = target;

        if let Some(entry) = self.states.get(&target).and_then(State::entry) {
            entry(ctx, event).await;
        }
        Ok(())
    }
}

impl<S: fmt::Debug, C, E> fmt::Debug for FiniteStateMachine<S, C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiniteStateMachine")
            .field("current", &self.current)
            .field("transitions", &self.transitions.len())
            .finish()
    }
}
