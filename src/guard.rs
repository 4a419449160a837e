//! Sleep-prevention guard
//!
//! Scoped acquisition of a system stay-awake lock for the duration of a
//! session. Acquire and release are paired exactly once on every exit path;
//! the guard releases explicitly during teardown and falls back to `Drop`.

use crate::error::SessionError;
#[cfg(target_os = "macos")]
use std::process::{Child, Command, Stdio};

/// The OS stay-awake primitive, reduced to a paired acquire/release.
pub trait StayAwake: Send {
    fn acquire(&mut self) -> Result<(), String>;
    fn release(&mut self);
}

/// Keeps the machine awake by holding a `caffeinate -dims` child process,
/// the same assertion the system grants interactive recorders.
#[cfg(target_os = "macos")]
pub struct CaffeinateAwake {
    child: Option<Child>,
}

#[cfg(target_os = "macos")]
impl CaffeinateAwake {
    pub fn new() -> Self {
        Self { child: None }
    }
}

#[cfg(target_os = "macos")]
impl Default for CaffeinateAwake {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "macos")]
impl StayAwake for CaffeinateAwake {
    fn acquire(&mut self) -> Result<(), String> {
        let child = Command::new("caffeinate")
            .arg("-dims")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("failed to start caffeinate: {}", e))?;
        self.child = Some(child);
        tracing::info!("Sleep prevention started (caffeinate)");
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::info!("Sleep prevention stopped");
        }
    }
}

/// Stand-in for platforms without a wired primitive, and for sessions with
/// sleep prevention disabled.
pub struct NoopAwake;

impl StayAwake for NoopAwake {
    fn acquire(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn release(&mut self) {}
}

/// Platform default stay-awake implementation.
pub fn platform_awake() -> Box<dyn StayAwake> {
    #[cfg(target_os = "macos")]
    {
        Box::new(CaffeinateAwake::new())
    }

    #[cfg(not(target_os = "macos"))]
    {
        Box::new(NoopAwake)
    }
}

/// RAII wrapper pairing one `acquire` with exactly one `release`.
pub struct SleepGuard {
    inner: Box<dyn StayAwake>,
    held: bool,
}

impl SleepGuard {
    /// Acquire the lock. The returned guard releases on `release()` or, as
    /// a backstop, on drop.
    pub fn engage(mut inner: Box<dyn StayAwake>) -> Result<Self, SessionError> {
        inner
            .acquire()
            .map_err(SessionError::SleepPrevention)?;
        Ok(Self { inner, held: true })
    }

    /// Release the lock. Idempotent.
    pub fn release(&mut self) {
        if self.held {
            self.held = false;
            self.inner.release();
        }
    }
}

impl Drop for SleepGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    pub struct CountingAwake {
        pub acquires: Arc<AtomicU64>,
        pub releases: Arc<AtomicU64>,
        pub fail_acquire: bool,
    }

    impl StayAwake for CountingAwake {
        fn acquire(&mut self) -> Result<(), String> {
            if self.fail_acquire {
                return Err("denied".into());
            }
            self.acquires.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_release_called_exactly_once() {
        let acquires = Arc::new(AtomicU64::new(0));
        let releases = Arc::new(AtomicU64::new(0));
        let mut guard = SleepGuard::engage(Box::new(CountingAwake {
            acquires: acquires.clone(),
            releases: releases.clone(),
            fail_acquire: false,
        }))
        .unwrap();

        guard.release();
        guard.release();
        drop(guard);

        assert_eq!(acquires.load(Ordering::SeqCst), 1);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_without_explicit_call() {
        let acquires = Arc::new(AtomicU64::new(0));
        let releases = Arc::new(AtomicU64::new(0));
        {
            let _guard = SleepGuard::engage(Box::new(CountingAwake {
                acquires: acquires.clone(),
                releases: releases.clone(),
                fail_acquire: false,
            }))
            .unwrap();
        }
        assert_eq!(acquires.load(Ordering::SeqCst), 1);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_acquire_never_releases() {
        let acquires = Arc::new(AtomicU64::new(0));
        let releases = Arc::new(AtomicU64::new(0));
        let result = SleepGuard::engage(Box::new(CountingAwake {
            acquires: acquires.clone(),
            releases: releases.clone(),
            fail_acquire: true,
        }));
        assert!(result.is_err());
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }
}
