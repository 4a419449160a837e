//! sessioncap - Desktop session recorder that keeps every stream on one clock.
//!
//! Records a desktop session as multiple concurrently-running signal streams
//! (screen video, system audio, microphone, Bluetooth RSSI) and produces
//! artifacts whose timestamps share a single monotonic time base. The
//! capture producers themselves live behind narrow contracts in
//! `source::producer`; this crate is the synchronization engine between
//! them and the output sinks.

pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod mux;
pub mod queue;
pub mod record;
pub mod session;
pub mod sink;
pub mod source;
pub mod utils;

pub use clock::ClockAnchor;
pub use config::RecordingConfig;
pub use error::{SessionError, SessionResult};
pub use record::{SourceKind, TimestampedRecord};
pub use session::{SessionCoordinator, SessionEvent, SessionReport, SessionState, StatusSnapshot};

#[cfg(test)]
pub(crate) mod test_support;
