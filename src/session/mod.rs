//! Session lifecycle
//!
//! The session state machine and its coordinator: the one component allowed
//! to drive Idle -> Starting -> Recording -> Stopping -> Finalized (with
//! Failed reachable from any active state).

pub mod coordinator;
pub mod state;

pub use coordinator::SessionCoordinator;
pub use state::{
    Degradation, SessionEvent, SessionReport, SessionState, SourceSnapshot, StatusSnapshot,
};
