//! Session coordinator
//!
//! Orchestrates the full lifecycle: establishes the clock anchor, engages
//! the sleep guard, attaches source adapters, opens sinks, spawns the
//! multiplexer, watches adapter health while recording, and tears everything
//! down so that no buffered record is lost and every sink is finalized on
//! every exit path.

use super::state::{
    Degradation, SessionEvent, SessionReport, SessionState, SourceSnapshot, StatusSnapshot,
};
use crate::clock::ClockAnchor;
use crate::config::RecordingConfig;
use crate::error::{SessionError, SessionResult, SinkError};
use crate::guard::SleepGuard;
use crate::mux::{self, MuxReport};
use crate::queue::{ingest_queue, QueueHandle, QueueReader};
use crate::record::SourceKind;
use crate::sink::{AudioFileSink, ContainerOptions, ContainerSink, EventSink, SinkFactory, SinkSet};
use crate::source::SourceAdapter;
use crate::utils::fs::create_session_dir;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

/// Factory for the stay-awake primitive, invoked once per session.
pub type AwakeFactory = Box<dyn FnMut() -> Box<dyn crate::guard::StayAwake> + Send>;

struct ArtifactEntry {
    sink: &'static str,
    kinds: Vec<SourceKind>,
    path: PathBuf,
}

struct ActiveSession {
    name: String,
    config: RecordingConfig,
    anchor: ClockAnchor,
    guard: Option<SleepGuard>,
    session_dir: PathBuf,
    artifacts: Vec<ArtifactEntry>,
    /// `(adapter index, kind)` of every adapter that attached.
    started: Vec<(usize, SourceKind)>,
    queues: Vec<(SourceKind, QueueHandle)>,
    degraded: Vec<Degradation>,
    /// Sinks held between open and multiplexer spawn.
    open_container: Option<Box<dyn ContainerSink>>,
    open_microphone: Option<Box<dyn AudioFileSink>>,
    open_events: Option<Box<dyn EventSink>>,
    mux: Option<JoinHandle<MuxReport>>,
    monitor: Option<JoinHandle<()>>,
}

struct Inner {
    adapters: Vec<Box<dyn SourceAdapter>>,
    sink_factory: Box<dyn SinkFactory>,
    awake_factory: AwakeFactory,
    active: Option<ActiveSession>,
    last_report: Option<SessionReport>,
}

/// Manages one recording session at a time. Cheap to clone; all clones share
/// the same session.
#[derive(Clone)]
pub struct SessionCoordinator {
    state: Arc<RwLock<SessionState>>,
    inner: Arc<Mutex<Inner>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionCoordinator {
    pub fn new(sink_factory: Box<dyn SinkFactory>, awake_factory: AwakeFactory) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(SessionState::Idle)),
            inner: Arc::new(Mutex::new(Inner {
                adapters: Vec::new(),
                sink_factory,
                awake_factory,
                active: None,
                last_report: None,
            })),
            event_tx,
        }
    }

    /// Coordinator with the filesystem sinks and the platform stay-awake
    /// primitive.
    pub fn with_defaults() -> Self {
        Self::new(
            Box::new(crate::sink::FsSinkFactory),
            Box::new(crate::guard::platform_awake),
        )
    }

    /// Register a source adapter. Whether it runs in a given session is
    /// decided by that session's configuration.
    pub async fn add_source(&self, adapter: Box<dyn SourceAdapter>) {
        let mut inner = self.inner.lock().await;
        tracing::info!("Adding source: {}", adapter.kind());
        inner.adapters.push(adapter);
    }

    /// Current state of the state machine.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.write();
        debug_assert!(
            state.can_transition(next),
            "invalid transition {:?} -> {:?}",
            *state,
            next
        );
        tracing::info!("session state: {:?} -> {:?}", *state, next);
        *state = next;
    }

    /// Read-only snapshot for the front end. Never blocks: while a
    /// transition is in flight only the state itself is reported.
    pub fn status(&self) -> StatusSnapshot {
        let state = *self.state.read();
        let Ok(inner) = self.inner.try_lock() else {
            return StatusSnapshot {
                state,
                ..StatusSnapshot::idle()
            };
        };
        let Some(active) = inner.active.as_ref() else {
            return StatusSnapshot {
                state,
                ..StatusSnapshot::idle()
            };
        };

        let sources = active
            .started
            .iter()
            .map(|&(idx, kind)| {
                let status = inner.adapters[idx].status();
                let stats = active
                    .queues
                    .iter()
                    .find(|(k, _)| *k == kind)
                    .map(|(_, handle)| (handle.stats().produced(), handle.stats().dropped()))
                    .unwrap_or((0, 0));
                SourceSnapshot {
                    kind,
                    attached: status.attached,
                    produced: stats.0,
                    dropped: stats.1,
                    violations: status.violations,
                    failure: status.failure,
                }
            })
            .collect();

        StatusSnapshot {
            state,
            session_name: Some(active.name.clone()),
            started_at: Some(active.anchor.wall_time()),
            duration_ms: active.anchor.elapsed_ns() as f64 / 1_000_000.0,
            sources,
            degradations: active.degraded.clone(),
        }
    }

    /// Start a session.
    ///
    /// Establishes the clock anchor, engages sleep prevention, attaches
    /// every enabled adapter, opens sinks, spawns the multiplexer, and waits
    /// for the required streams to deliver their first record (bounded by
    /// the startup timeout) before declaring `Recording`.
    pub async fn start(&self, name: &str, config: RecordingConfig) -> SessionResult<()> {
        let mut inner = self.inner.lock().await;
        if self.state().is_active() {
            return Err(SessionError::AlreadyRecording);
        }
        tracing::info!("Starting session {:?}", name);
        self.set_state(SessionState::Starting);

        let anchor = ClockAnchor::establish();

        let guard = if config.prevent_sleep {
            match SleepGuard::engage((inner.awake_factory)()) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    self.fail_start(&mut inner, e.to_string());
                    return Err(e);
                }
            }
        } else {
            None
        };

        let mut active = ActiveSession {
            name: name.to_string(),
            config: config.clone(),
            anchor,
            guard,
            session_dir: PathBuf::new(),
            artifacts: Vec::new(),
            started: Vec::new(),
            queues: Vec::new(),
            degraded: Vec::new(),
            open_container: None,
            open_microphone: None,
            open_events: None,
            mux: None,
            monitor: None,
        };

        // Attach adapters before creating any file on disk: a required
        // stream that cannot attach must leave no output behind.
        let mut readers: Vec<(SourceKind, QueueReader)> = Vec::new();
        for idx in 0..inner.adapters.len() {
            let kind = inner.adapters[idx].kind();
            if !config.stream_enabled(kind) {
                continue;
            }
            let (writer, reader) = ingest_queue(
                kind,
                config.engine.queue_capacity(kind),
                config.engine.overflow_policy(kind),
            );
            let handle = writer.handle();
            match inner.adapters[idx].start(anchor, writer).await {
                Ok(()) => {
                    active.started.push((idx, kind));
                    active.queues.push((kind, handle));
                    readers.push((kind, reader));
                }
                Err(e) if config.is_required(kind) => {
                    let reason = e.reason.clone();
                    self.stop_started_adapters(&mut inner, &active).await;
                    active.guard.take();
                    self.fail_start(&mut inner, format!("{}: {}", kind, reason));
                    return Err(SessionError::SourceUnavailable { kind, reason });
                }
                Err(e) => {
                    tracing::warn!("{} unavailable, stream skipped: {}", kind, e.reason);
                    let _ = self.event_tx.send(SessionEvent::Degraded {
                        kind,
                        reason: e.reason.clone(),
                    });
                    active.degraded.push(Degradation {
                        kind,
                        reason: e.reason,
                    });
                }
            }
        }

        if active.started.is_empty() {
            active.guard.take();
            self.fail_start(&mut inner, "no capture source available".to_string());
            return Err(SessionError::SourceUnavailable {
                kind: SourceKind::Screen,
                reason: "no capture source available".to_string(),
            });
        }

        // Open sinks for the streams that actually attached.
        match create_session_dir(&config.output.directory, name) {
            Ok(dir) => active.session_dir = dir,
            Err(e) => {
                self.stop_started_adapters(&mut inner, &active).await;
                active.guard.take();
                self.fail_start(&mut inner, format!("session directory: {}", e));
                return Err(SessionError::Io(e));
            }
        }
        if let Err(e) = self
            .open_sinks(&mut inner, &mut active, &mut readers)
            .await
        {
            self.stop_started_adapters(&mut inner, &active).await;
            active.guard.take();
            self.fail_start(&mut inner, e.to_string());
            return Err(e);
        }

        // From here on records flow: spawn the drain before declaring
        // Recording so nothing backs up during the startup wait.
        let sinks = SinkSet {
            container: active.open_container.take(),
            microphone: active.open_microphone.take(),
            events: active.open_events.take(),
        };
        active.mux = Some(mux::spawn(
            readers.into_iter().map(|(_, reader)| reader).collect(),
            sinks,
            anchor,
            config.engine.reorder_window(),
            self.event_tx.clone(),
        ));

        // Starting -> Recording once every required stream has produced its
        // first record, or the startup timeout elapses with the required
        // streams still attached.
        if let Some((kind, reason)) = self.wait_for_first_records(&inner, &active, &config).await {
            let report = self
                .teardown(&mut inner, active, Some(format!("{}: {}", kind, reason)))
                .await;
            inner.last_report = Some(report);
            return Err(SessionError::SourceFailedMidSession { kind, reason });
        }

        active.monitor = Some(self.spawn_monitor(config.engine.health_poll()));
        inner.active = Some(active);
        self.set_state(SessionState::Recording);
        let _ = self.event_tx.send(SessionEvent::Started);
        tracing::info!("Recording started");
        Ok(())
    }

    /// Stop the session and finalize every artifact.
    ///
    /// Calling `stop` again after the session reached `Finalized` or
    /// `Failed` is a no-op returning the previous report.
    pub async fn stop(&self) -> SessionResult<SessionReport> {
        self.stop_with(None).await
    }

    async fn stop_with(&self, cause: Option<(SourceKind, String)>) -> SessionResult<SessionReport> {
        let mut inner = self.inner.lock().await;
        let state = self.state();
        match state {
            SessionState::Idle => return Err(SessionError::NotRecording),
            SessionState::Finalized | SessionState::Failed => {
                let report = inner
                    .last_report
                    .clone()
                    .unwrap_or_else(|| empty_report(state));
                return Ok(report);
            }
            _ => {}
        }

        let Some(active) = inner.active.take() else {
            // A start is mid-flight on another clone; nothing to stop yet.
            return Err(SessionError::NotRecording);
        };

        tracing::info!("Stopping session {:?}", active.name);
        self.set_state(SessionState::Stopping);
        let failure = cause.map(|(kind, reason)| format!("required stream {} failed: {}", kind, reason));
        let report = self.teardown(&mut inner, active, failure).await;
        inner.last_report = Some(report.clone());
        Ok(report)
    }

    /// Shared teardown for clean stop, required-stream failure, and startup
    /// failure after sinks were opened. Ordering: adapters stop (bounded
    /// grace), queues drain to empty (flush timeout), sinks close with the
    /// container finalized last, sleep guard released.
    async fn teardown(
        &self,
        inner: &mut Inner,
        mut active: ActiveSession,
        mut failure: Option<String>,
    ) -> SessionReport {
        let engine = active.config.engine.clone();

        if let Some(monitor) = active.monitor.take() {
            monitor.abort();
        }

        for &(idx, kind) in &active.started {
            let stop = inner.adapters[idx].stop();
            if tokio::time::timeout(engine.stop_grace(), stop).await.is_err() {
                tracing::warn!("{} adapter exceeded stop grace, forcing detach", kind);
                if let Some((_, handle)) = active.queues.iter().find(|(k, _)| *k == kind) {
                    handle.close();
                }
            }
        }

        // Drain every queue to empty so no buffered record is lost.
        let mut flush_timed_out = false;
        let mux_report = match active.mux.take() {
            Some(mut handle) => match tokio::time::timeout(engine.flush_timeout(), &mut handle).await
            {
                Ok(Ok(report)) => Some(report),
                Ok(Err(e)) => {
                    tracing::error!("multiplexer task failed: {}", e);
                    failure.get_or_insert_with(|| format!("multiplexer task failed: {}", e));
                    None
                }
                Err(_) => {
                    tracing::warn!(
                        "queue drain exceeded flush timeout ({:?}), abandoning buffered records",
                        engine.flush_timeout()
                    );
                    handle.abort();
                    flush_timed_out = true;
                    None
                }
            },
            None => None,
        };

        let mut written = HashMap::new();
        let mut failed_sinks: Vec<&'static str> = Vec::new();
        let mut closed_ok: HashSet<&'static str> = HashSet::new();

        if let Some(mut report) = mux_report {
            written = report.written;
            failed_sinks = report.failed_sinks.clone();
            if report.late_events > 0 {
                tracing::warn!("{} event(s) written beyond the reorder window", report.late_events);
            }

            // Event log and audio file first; the container is finalized
            // last so its remux pass runs after everything else settled.
            let closes: Vec<(&'static str, Option<Result<(), SessionError>>)> = vec![
                (
                    "events",
                    match report.sinks.events.take() {
                        Some(mut sink) => Some(
                            close_with_timeout("events", engine.sink_close_timeout(), move || {
                                sink.finalize()
                            })
                            .await,
                        ),
                        None => None,
                    },
                ),
                (
                    "microphone",
                    match report.sinks.microphone.take() {
                        Some(mut sink) => Some(
                            close_with_timeout("microphone", engine.sink_close_timeout(), move || {
                                sink.finalize()
                            })
                            .await,
                        ),
                        None => None,
                    },
                ),
                (
                    "container",
                    match report.sinks.container.take() {
                        Some(mut sink) => Some(
                            close_with_timeout("container", engine.sink_close_timeout(), move || {
                                sink.finalize()
                            })
                            .await,
                        ),
                        None => None,
                    },
                ),
            ];

            for (name, result) in closes {
                match result {
                    None => {}
                    Some(Ok(())) => {
                        closed_ok.insert(name);
                    }
                    Some(Err(e)) => {
                        tracing::error!("{} sink close failed: {}", name, e);
                        failure.get_or_insert_with(|| e.to_string());
                        if !failed_sinks.contains(&name) {
                            failed_sinks.push(name);
                        }
                    }
                }
            }
        } else if flush_timed_out {
            // The aborted multiplexer dropped the sinks; their drop
            // implementations finished what could be finished.
            tracing::warn!("sinks finalized best-effort after abandoned drain");
        }

        if let Some(mut guard) = active.guard.take() {
            guard.release();
        }

        let mut records_produced = HashMap::new();
        let mut records_dropped = HashMap::new();
        for (kind, handle) in &active.queues {
            records_produced.insert(*kind, handle.stats().produced());
            records_dropped.insert(*kind, handle.stats().dropped());
        }

        let degraded_kinds: HashSet<SourceKind> =
            active.degraded.iter().map(|d| d.kind).collect();
        let started_kinds: HashSet<SourceKind> =
            active.started.iter().map(|&(_, kind)| kind).collect();
        let artifacts = active
            .artifacts
            .iter()
            .filter(|entry| {
                closed_ok.contains(entry.sink)
                    && !failed_sinks.contains(&entry.sink)
                    && entry.kinds.iter().any(|kind| {
                        started_kinds.contains(kind) && !degraded_kinds.contains(kind)
                    })
            })
            .map(|entry| entry.path.clone())
            .collect();

        let outcome = if failure.is_some() {
            SessionState::Failed
        } else {
            SessionState::Finalized
        };
        let report = SessionReport {
            outcome,
            failure: failure.clone(),
            session_dir: Some(active.session_dir.clone()),
            artifacts,
            records_written: written,
            records_produced,
            records_dropped,
            degradations: active.degraded.clone(),
            duration_ms: active.anchor.elapsed_ns() as f64 / 1_000_000.0,
        };

        self.set_state(outcome);
        match failure {
            Some(reason) => {
                let _ = self.event_tx.send(SessionEvent::Failed { reason });
            }
            None => {
                let _ = self.event_tx.send(SessionEvent::Stopped);
            }
        }
        tracing::info!(
            "Session ended: {:?}, duration {:.0}ms",
            report.outcome,
            report.duration_ms
        );
        report
    }

    /// Open the sinks matching the attached streams. A sink that cannot
    /// open fails the session when one of its streams is required; with
    /// only optional streams behind it, those streams are skipped instead.
    async fn open_sinks(
        &self,
        inner: &mut Inner,
        active: &mut ActiveSession,
        readers: &mut Vec<(SourceKind, QueueReader)>,
    ) -> SessionResult<()> {
        let config = active.config.clone();
        let dir = active.session_dir.clone();

        let container_kinds: Vec<SourceKind> = [SourceKind::Screen, SourceKind::SystemAudio]
            .into_iter()
            .filter(|kind| active.started.iter().any(|&(_, k)| k == *kind))
            .collect();
        if !container_kinds.is_empty() {
            let path = dir.join(format!("capture.{}", config.output.format.extension()));
            let options = ContainerOptions {
                fps: config.fps,
                quality: config.quality,
                format: config.output.format,
            };
            match inner.sink_factory.open_container(&path, &options) {
                Ok(sink) => {
                    active.artifacts.push(ArtifactEntry {
                        sink: "container",
                        kinds: container_kinds,
                        path,
                    });
                    active.open_container = Some(sink);
                }
                Err(e) => {
                    self.degrade_or_fail(inner, active, readers, &container_kinds, "container", e)
                        .await?;
                }
            }
        }

        if active.started.iter().any(|&(_, k)| k == SourceKind::Microphone) {
            let path = dir.join("mic.wav");
            match inner
                .sink_factory
                .open_audio_file(&path, config.sample_rate, 1)
            {
                Ok(sink) => {
                    active.artifacts.push(ArtifactEntry {
                        sink: "microphone",
                        kinds: vec![SourceKind::Microphone],
                        path,
                    });
                    active.open_microphone = Some(sink);
                }
                Err(e) => {
                    self.degrade_or_fail(
                        inner,
                        active,
                        readers,
                        &[SourceKind::Microphone],
                        "microphone",
                        e,
                    )
                    .await?;
                }
            }
        }

        if active.started.iter().any(|&(_, k)| k == SourceKind::Bluetooth) {
            let path = dir.join("events.jsonl");
            match inner.sink_factory.open_event_log(&path) {
                Ok(sink) => {
                    active.artifacts.push(ArtifactEntry {
                        sink: "events",
                        kinds: vec![SourceKind::Bluetooth],
                        path,
                    });
                    active.open_events = Some(sink);
                }
                Err(e) => {
                    self.degrade_or_fail(
                        inner,
                        active,
                        readers,
                        &[SourceKind::Bluetooth],
                        "events",
                        e,
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }

    /// Handle a sink that failed to open: fatal when any of its streams is
    /// required, otherwise those streams are stopped and skipped.
    async fn degrade_or_fail(
        &self,
        inner: &mut Inner,
        active: &mut ActiveSession,
        readers: &mut Vec<(SourceKind, QueueReader)>,
        kinds: &[SourceKind],
        sink: &'static str,
        error: SinkError,
    ) -> SessionResult<()> {
        if kinds.iter().any(|&kind| active.config.is_required(kind)) {
            return Err(SessionError::SinkWriteFailure {
                sink,
                source: error,
            });
        }
        let reason = format!("{} sink unavailable: {}", sink, error);
        tracing::warn!("{}", reason);
        for &kind in kinds {
            if let Some(pos) = active.started.iter().position(|&(_, k)| k == kind) {
                let (idx, _) = active.started.remove(pos);
                inner.adapters[idx].stop().await;
            }
            active.queues.retain(|(k, _)| *k != kind);
            readers.retain(|(k, _)| *k != kind);
            let _ = self.event_tx.send(SessionEvent::Degraded {
                kind,
                reason: reason.clone(),
            });
            active.degraded.push(Degradation {
                kind,
                reason: reason.clone(),
            });
        }
        Ok(())
    }

    /// Poll until every required stream delivered a first record, the
    /// startup timeout elapses, or a required adapter reports a fault.
    async fn wait_for_first_records(
        &self,
        inner: &Inner,
        active: &ActiveSession,
        config: &RecordingConfig,
    ) -> Option<(SourceKind, String)> {
        let deadline = tokio::time::Instant::now() + config.engine.startup_timeout();
        loop {
            let mut all_ready = true;
            for &(idx, kind) in &active.started {
                if !config.is_required(kind) {
                    continue;
                }
                let status = inner.adapters[idx].status();
                if let Some(reason) = status.failure {
                    return Some((kind, reason));
                }
                let produced = active
                    .queues
                    .iter()
                    .find(|(k, _)| *k == kind)
                    .map(|(_, handle)| handle.stats().produced())
                    .unwrap_or(0);
                if produced == 0 {
                    all_ready = false;
                }
            }
            if all_ready {
                return None;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!("startup timeout elapsed before every required stream produced");
                return None;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn fail_start(&self, inner: &mut Inner, reason: String) {
        tracing::error!("session start failed: {}", reason);
        self.set_state(SessionState::Failed);
        let _ = self.event_tx.send(SessionEvent::Failed {
            reason: reason.clone(),
        });
        inner.last_report = Some(SessionReport {
            failure: Some(reason),
            ..empty_report(SessionState::Failed)
        });
    }

    async fn stop_started_adapters(&self, inner: &mut Inner, active: &ActiveSession) {
        for &(idx, _) in &active.started {
            inner.adapters[idx].stop().await;
        }
    }

    /// Watch adapter health while recording. Optional-stream faults degrade
    /// the session; a required-stream fault drives the same teardown as a
    /// stop command, with a `Failed` outcome.
    fn spawn_monitor(&self, poll: Duration) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut handled: HashSet<SourceKind> = HashSet::new();
            loop {
                tokio::time::sleep(poll).await;
                if coordinator.state() != SessionState::Recording {
                    break;
                }
                let mut fatal: Option<(SourceKind, String)> = None;
                {
                    let Ok(mut guard) = coordinator.inner.try_lock() else {
                        continue;
                    };
                    let inner = &mut *guard;
                    let Inner {
                        adapters, active, ..
                    } = inner;
                    let Some(active) = active.as_mut() else {
                        continue;
                    };

                    let mut to_degrade: Vec<(usize, SourceKind, String)> = Vec::new();
                    for &(idx, kind) in &active.started {
                        if handled.contains(&kind) {
                            continue;
                        }
                        if let Some(reason) = adapters[idx].status().failure {
                            handled.insert(kind);
                            if active.config.is_required(kind) {
                                fatal = Some((kind, reason));
                                break;
                            }
                            to_degrade.push((idx, kind, reason));
                        }
                    }

                    if fatal.is_none() {
                        for (idx, kind, reason) in to_degrade {
                            tracing::warn!("{} stream died mid-session: {}", kind, reason);
                            adapters[idx].stop().await;
                            let _ = coordinator.event_tx.send(SessionEvent::Degraded {
                                kind,
                                reason: reason.clone(),
                            });
                            active.degraded.push(Degradation { kind, reason });
                        }
                    }
                }
                if let Some((kind, reason)) = fatal {
                    tracing::error!("required stream {} died mid-session: {}", kind, reason);
                    let coordinator = coordinator.clone();
                    tokio::spawn(async move {
                        let _ = coordinator.stop_with(Some((kind, reason))).await;
                    });
                    break;
                }
            }
        })
    }
}

/// Run a blocking sink finalize under the close timeout.
async fn close_with_timeout(
    name: &'static str,
    timeout: Duration,
    finalize: impl FnOnce() -> Result<(), SinkError> + Send + 'static,
) -> Result<(), SessionError> {
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(finalize)).await {
        Err(_) => Err(SessionError::FinalizeTimeout(format!(
            "{} sink close exceeded {:?}",
            name, timeout
        ))),
        Ok(Err(join)) => Err(SessionError::SinkWriteFailure {
            sink: name,
            source: SinkError::Encoder(format!("close task panicked: {}", join)),
        }),
        Ok(Ok(Err(e))) => Err(SessionError::SinkWriteFailure {
            sink: name,
            source: e,
        }),
        Ok(Ok(Ok(()))) => Ok(()),
    }
}

fn empty_report(outcome: SessionState) -> SessionReport {
    SessionReport {
        outcome,
        failure: None,
        session_dir: None,
        artifacts: Vec::new(),
        records_written: HashMap::new(),
        records_produced: HashMap::new(),
        records_dropped: HashMap::new(),
        degradations: Vec::new(),
        duration_ms: 0.0,
    }
}
