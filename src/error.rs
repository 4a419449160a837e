//! Error types and handling
//!
//! Common error types used across the recording engine.

use crate::record::SourceKind;
use thiserror::Error;

/// Producer attach failure, reported by a source adapter on `start`.
#[derive(Error, Debug, Clone)]
#[error("source unavailable: {reason}")]
pub struct AttachError {
    pub reason: String,
}

impl AttachError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Output sink failure (open, write, or finalize).
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("sink already finalized")]
    Finalized,
}

/// Session-level error taxonomy
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("source unavailable ({kind}): {reason}")]
    SourceUnavailable { kind: SourceKind, reason: String },

    #[error("source failed mid-session ({kind}): {reason}")]
    SourceFailedMidSession { kind: SourceKind, reason: String },

    #[error("sink write failure ({sink}): {source}")]
    SinkWriteFailure {
        sink: &'static str,
        #[source]
        source: SinkError,
    },

    #[error("finalize timeout: {0}")]
    FinalizeTimeout(String),

    #[error("session is already active")]
    AlreadyRecording,

    #[error("no session in progress")]
    NotRecording,

    #[error("sleep prevention failed: {0}")]
    SleepPrevention(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using SessionError
pub type SessionResult<T> = Result<T, SessionError>;
