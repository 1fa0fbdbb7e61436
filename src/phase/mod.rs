//! Phase barrier synchronization.
//!
//! A phase is run as a barrier over the mission's participants: the
//! [`BarrierEngine`] dispatches the phase-entry messages, then uses the
//! [`Multiplexer`] to wait on every incomplete participant at once until
//! each one has produced a message matching the phase's [`Completion`].

pub mod completion;
pub mod engine;
pub mod multiplexer;
pub mod state;

pub use completion::{Completion, Dispatch, FailurePolicy, PhaseRequest};
pub use engine::{BarrierEngine, PhaseFailure, PhaseOutcome, PhaseReport};
pub use multiplexer::{MultiplexError, Multiplexer};
pub use state::{BarrierState, MissionState, Phase};
