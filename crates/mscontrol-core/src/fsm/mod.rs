//! Generic finite state machine
//!
//! A deliberately small state machine primitive: a fixed set of legal
//! transitions, a current state, and optional entry actions that run when a
//! state is entered. It knows nothing about media sessions.
//!
//! Entry actions receive the owner's context explicitly (`&mut C`) together
//! with the event that caused the transition (`&E`). They never get access to
//! the machine itself, so an entry action cannot request a nested transition;
//! it can only schedule follow-up work through whatever the context exposes
//! (for example a message to its own inbox).

pub mod machine;
pub mod state;
pub mod transition;

pub use machine::{FiniteStateMachine, IllegalTransition};
pub use state::{EntryAction, State};
pub use transition::Transition;
