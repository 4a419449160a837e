//! Session state machine types
//!
//! State definitions, transition validation, and the snapshot/report types
//! the front end reads. Only the coordinator mutates state.

use crate::record::SourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Lifecycle state of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session in progress
    Idle,
    /// Anchor established, adapters attaching, sinks opening
    Starting,
    /// Steady state; the multiplexer drains continuously
    Recording,
    /// Adapters stopped, queues draining, sinks closing
    Stopping,
    /// All sinks closed successfully
    Finalized,
    /// Torn down after an error; partial artifacts may remain
    Failed,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl SessionState {
    /// Whether a transition to `next` is part of the lifecycle graph.
    pub fn can_transition(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Finalized, Starting)
                | (Failed, Starting)
                | (Starting, Recording)
                | (Starting, Failed)
                | (Recording, Stopping)
                | (Recording, Failed)
                | (Starting, Stopping)
                | (Stopping, Finalized)
                | (Stopping, Failed)
        )
    }

    /// Whether a session is underway (start has begun, stop has not ended).
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Starting | SessionState::Recording | SessionState::Stopping
        )
    }
}

/// A stream that was skipped or lost without failing the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Degradation {
    pub kind: SourceKind,
    pub reason: String,
}

/// Events emitted during a session (broadcast to the front end).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Recording reached steady state
    Started,
    /// Session finalized cleanly
    Stopped,
    /// An optional stream was skipped or died; the session continues
    Degraded { kind: SourceKind, reason: String },
    /// An output sink stopped accepting writes
    SinkFailed { sink: &'static str },
    /// The session failed
    Failed { reason: String },
}

/// Per-source counters in a status snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSnapshot {
    pub kind: SourceKind,
    pub attached: bool,
    pub produced: u64,
    pub dropped: u64,
    pub violations: u64,
    pub failure: Option<String>,
}

/// Narrow read-only view for the front end.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub state: SessionState,
    pub session_name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: f64,
    pub sources: Vec<SourceSnapshot>,
    pub degradations: Vec<Degradation>,
}

impl StatusSnapshot {
    pub fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            session_name: None,
            started_at: None,
            duration_ms: 0.0,
            sources: Vec::new(),
            degradations: Vec::new(),
        }
    }
}

/// Result of a completed (or failed) session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    /// `Finalized` or `Failed`
    pub outcome: SessionState,
    pub failure: Option<String>,
    pub session_dir: Option<PathBuf>,
    /// Artifacts of healthy streams; degraded streams' partial files are
    /// excluded here and listed via `degradations`.
    pub artifacts: Vec<PathBuf>,
    pub records_written: HashMap<SourceKind, u64>,
    pub records_produced: HashMap<SourceKind, u64>,
    pub records_dropped: HashMap<SourceKind, u64>,
    pub degradations: Vec<Degradation>,
    pub duration_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        use SessionState::*;
        assert!(Idle.can_transition(Starting));
        assert!(Starting.can_transition(Recording));
        assert!(Recording.can_transition(Stopping));
        assert!(Stopping.can_transition(Finalized));
        assert!(Finalized.can_transition(Starting));
    }

    #[test]
    fn test_failed_reachable_from_active_states() {
        use SessionState::*;
        assert!(Starting.can_transition(Failed));
        assert!(Recording.can_transition(Failed));
        assert!(Stopping.can_transition(Failed));
        assert!(!Idle.can_transition(Failed));
    }

    #[test]
    fn test_no_shortcut_to_recording() {
        use SessionState::*;
        assert!(!Idle.can_transition(Recording));
        assert!(!Failed.can_transition(Recording));
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionState::Recording).unwrap(),
            "\"recording\""
        );
    }
}
