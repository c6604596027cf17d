use futures::future::BoxFuture;
use std::fmt;

/// Action executed once, when the machine enters a state.
///
/// Written as a plain function pointer so it closes over nothing: all of the
/// owner's state flows in through `ctx`.
pub type EntryAction<C, E> = for<'a> fn(ctx: &'a mut C, event: &'a E) -> BoxFuture<'a, ()>;

/// A state known to a [`FiniteStateMachine`](super::FiniteStateMachine)
pub struct State<S, C, E> {
    id: S,
    entry: Option<EntryAction<C, E>>,
}

impl<S, C, E> State<S, C, E> {
    /// A state without an entry action
    pub fn new(id: S) -> Self {
        Self { id, entry: None }
    }

    /// A state that runs `entry` every time it is entered
    pub fn with_entry(id: S, entry: EntryAction<C, E>) -> Self {
        Self {
            id,
            entry: Some(entry),
        }
    }

    pub fn id(&self) -> &S {
        &self.id
    }

    pub fn entry(&self) -> Option<EntryAction<C, E>> {
        self.entry
    }
}

impl<S: fmt::Debug, C, E> fmt::Debug for State<S, C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id)
            .field("has_entry", &self.entry.is_some())
            .finish()
    }
}
